use std::collections::{BTreeMap, BTreeSet};

pub(crate) const FILL_PROPERTY: &str = "--fill";
pub(crate) const PRESSED_ATTRIBUTE: &str = "aria-pressed";
pub(crate) const FILLED_CLASS: &str = "filled";

/// What changed on the element. Style writes and attribute writes are told
/// apart so an observer can filter on `style` only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Mutation {
    Style,
    Attribute(String),
}

/// In-memory stand-in for the bottle's presentation element.
///
/// Holds the style properties the renderer reads, the attributes assistive
/// tooling would read, the class list, and the vertical offset the liquid is
/// currently drawn at. Every write appends a [`Mutation`] record; whoever
/// observes the element drains them with [`BottleElement::take_mutations`].
#[derive(Clone, Debug, Default)]
pub(crate) struct BottleElement {
    style: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    liquid_offset: f32,
    mutations: Vec<Mutation>,
}

impl BottleElement {
    pub(crate) fn new() -> Self {
        Self {
            liquid_offset: 100.0,
            ..Self::default()
        }
    }

    pub(crate) fn style_property(&self, name: &str) -> Option<&str> {
        self.style.get(name).map(String::as_str)
    }

    pub(crate) fn set_style_property(&mut self, name: &str, value: &str) {
        self.style.insert(name.to_string(), value.to_string());
        self.mutations.push(Mutation::Style);
    }

    pub(crate) fn remove_style_property(&mut self, name: &str) {
        self.style.remove(name);
        self.mutations.push(Mutation::Style);
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
        self.mutations.push(Mutation::Attribute(name.to_string()));
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub(crate) fn set_class(&mut self, class: &str, on: bool) {
        let changed = if on {
            self.classes.insert(class.to_string())
        } else {
            self.classes.remove(class)
        };
        if changed {
            self.mutations.push(Mutation::Attribute("class".to_string()));
        }
    }

    /// `aria-pressed` read back as a bool. Anything but "true"/"false" is `None`.
    pub(crate) fn pressed(&self) -> Option<bool> {
        match self.attribute(PRESSED_ATTRIBUTE)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Vertical offset of the liquid, percent of the bottle height from the top.
    pub(crate) fn liquid_offset(&self) -> f32 {
        self.liquid_offset
    }

    /// Writing the rendered offset is not a style mutation; observers never see it.
    pub(crate) fn set_liquid_offset(&mut self, pct: f32) {
        self.liquid_offset = pct;
    }

    pub(crate) fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_recorded_in_order() {
        let mut el = BottleElement::new();
        el.set_style_property(FILL_PROPERTY, "0%");
        el.set_attribute(PRESSED_ATTRIBUTE, "true");
        el.set_class(FILLED_CLASS, true);

        assert_eq!(
            el.take_mutations(),
            vec![
                Mutation::Style,
                Mutation::Attribute(PRESSED_ATTRIBUTE.to_string()),
                Mutation::Attribute("class".to_string()),
            ]
        );
        assert!(el.take_mutations().is_empty());
    }

    #[test]
    fn class_toggle_only_records_real_changes() {
        let mut el = BottleElement::new();
        el.set_class(FILLED_CLASS, false);
        assert!(el.take_mutations().is_empty());
        el.set_class(FILLED_CLASS, true);
        el.set_class(FILLED_CLASS, true);
        assert_eq!(el.take_mutations().len(), 1);
        assert!(el.has_class(FILLED_CLASS));
    }

    #[test]
    fn pressed_reads_only_exact_strings() {
        let mut el = BottleElement::new();
        assert_eq!(el.pressed(), None);
        el.set_attribute(PRESSED_ATTRIBUTE, "true");
        assert_eq!(el.pressed(), Some(true));
        el.set_attribute(PRESSED_ATTRIBUTE, "mixed");
        assert_eq!(el.pressed(), None);
    }

    #[test]
    fn offset_write_is_silent() {
        let mut el = BottleElement::new();
        assert_eq!(el.liquid_offset(), 100.0);
        el.set_liquid_offset(40.0);
        assert!(el.take_mutations().is_empty());
        el.remove_style_property(FILL_PROPERTY);
        assert_eq!(el.take_mutations(), vec![Mutation::Style]);
        assert_eq!(el.style_property(FILL_PROPERTY), None);
    }
}
