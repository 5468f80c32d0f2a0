use crate::bubbles::{BubbleEmitter, EmitterTask};
use crate::element::{BottleElement, Mutation, FILLED_CLASS, FILL_PROPERTY, PRESSED_ATTRIBUTE};
use crate::timer::{Millis, TimerQueue};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum FillState {
    #[default]
    Empty,
    Filling,
}

impl FillState {
    pub(crate) fn is_filling(self) -> bool {
        matches!(self, FillState::Filling)
    }

    /// The only place a fill level comes from.
    pub(crate) fn level(self) -> FillLevel {
        match self {
            FillState::Empty => FillLevel::EMPTY,
            FillState::Filling => FillLevel::FULL,
        }
    }
}

impl From<bool> for FillState {
    fn from(filling: bool) -> Self {
        if filling {
            FillState::Filling
        } else {
            FillState::Empty
        }
    }
}

/// Percent of the bottle left unfilled, measured from the top.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FillLevel(u8);

impl FillLevel {
    pub(crate) const FULL: FillLevel = FillLevel(0);
    pub(crate) const EMPTY: FillLevel = FillLevel(100);

    pub(crate) fn percent(self) -> u8 {
        self.0
    }

    pub(crate) fn css_value(self) -> String {
        format!("{}%", self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum LevelParseError {
    #[error("fill value {0:?} is not a number")]
    NotANumber(String),
    #[error("fill value {0:?} is not finite")]
    NotFinite(String),
}

/// Parses a `--fill` value such as `"35%"`. Unset or blank means `100%`.
pub(crate) fn parse_level(raw: Option<&str>) -> Result<f32, LevelParseError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("100%");
    let number = raw.strip_suffix('%').unwrap_or(raw).trim();
    let pct: f32 = number
        .parse()
        .map_err(|_| LevelParseError::NotANumber(raw.to_string()))?;
    if !pct.is_finite() {
        return Err(LevelParseError::NotFinite(raw.to_string()));
    }
    Ok(pct)
}

/// Loose truthiness for host values that are not typed as booleans.
pub(crate) fn truthy(raw: &str) -> bool {
    let v = raw.trim();
    !(v.is_empty()
        || v == "0"
        || v.eq_ignore_ascii_case("false")
        || v.eq_ignore_ascii_case("off")
        || v.eq_ignore_ascii_case("no"))
}

/// Owns the fill state and everything that hangs off it: the bottle element,
/// the bubble emitter and the timer queue both of them run on.
pub(crate) struct FillController {
    state: FillState,
    element: BottleElement,
    emitter: BubbleEmitter,
    timers: TimerQueue<EmitterTask>,
}

impl FillController {
    pub(crate) fn new(seed: u64) -> Self {
        let mut c = Self {
            state: FillState::Empty,
            element: BottleElement::new(),
            emitter: BubbleEmitter::new(seed),
            timers: TimerQueue::new(),
        };
        c.set_filled(false);
        info!(seed, "fill controller ready");
        c
    }

    pub(crate) fn state(&self) -> FillState {
        self.state
    }

    pub(crate) fn level(&self) -> FillLevel {
        self.state.level()
    }

    pub(crate) fn element(&self) -> &BottleElement {
        &self.element
    }

    pub(crate) fn emitter(&self) -> &BubbleEmitter {
        &self.emitter
    }

    pub(crate) fn set_filled(&mut self, desired: bool) {
        let next = FillState::from(desired);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, at = self.timers.now(), "fill state");
        }
        self.state = next;

        let filling = next.is_filling();
        self.element.set_class(FILLED_CLASS, filling);
        self.element
            .set_style_property(FILL_PROPERTY, &next.level().css_value());
        self.element
            .set_attribute(PRESSED_ATTRIBUTE, if filling { "true" } else { "false" });

        if filling {
            self.emitter.start(&mut self.timers);
        } else {
            self.emitter.stop(&mut self.timers);
        }

        self.apply_presentation_level();
        self.observe();
    }

    pub(crate) fn set_filled_from(&mut self, raw: &str) {
        self.set_filled(truthy(raw));
    }

    /// Re-derives the drawn liquid offset from whatever `--fill` currently holds.
    pub(crate) fn apply_presentation_level(&mut self) -> f32 {
        let raw = self.element.style_property(FILL_PROPERTY);
        let pct = match parse_level(raw) {
            Ok(pct) => pct,
            Err(err) => {
                debug!(%err, "falling back to an empty bottle");
                FillLevel::EMPTY.percent() as f32
            }
        };
        self.element.set_liquid_offset(pct);
        pct
    }

    /// Lets an outside agent edit the element. Style edits are picked up right after.
    pub(crate) fn with_element<F: FnOnce(&mut BottleElement)>(&mut self, f: F) {
        f(&mut self.element);
        self.observe();
    }

    /// Runs every timer due up to `now`, in order.
    pub(crate) fn advance(&mut self, now: Millis) {
        while let Some(task) = self.timers.pop_due(now) {
            self.emitter.handle(task, &mut self.timers);
            self.observe();
        }
        self.timers.settle(now);
    }

    // Style observer: one resync per style record, attribute writes are filtered out.
    fn observe(&mut self) {
        for m in self.element.take_mutations() {
            if m == Mutation::Style {
                self.apply_presentation_level();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(c: &FillController) -> Option<&str> {
        c.element().attribute(PRESSED_ATTRIBUTE)
    }

    #[test]
    fn starts_empty() {
        let c = FillController::new(1);
        assert_eq!(c.state(), FillState::Empty);
        assert_eq!(c.level(), FillLevel::EMPTY);
        assert_eq!(c.element().style_property(FILL_PROPERTY), Some("100%"));
        assert_eq!(c.element().liquid_offset(), 100.0);
        assert_eq!(pressed(&c), Some("false"));
        assert!(!c.element().has_class(FILLED_CLASS));
    }

    #[test]
    fn filling_twice_matches_filling_once() {
        let mut c = FillController::new(1);
        c.set_filled(true);
        let once = (c.state(), c.level(), c.element().liquid_offset());
        c.set_filled(true);
        assert_eq!((c.state(), c.level(), c.element().liquid_offset()), once);
        assert_eq!(c.level().percent(), 0);
        assert_eq!(pressed(&c), Some("true"));
        assert!(c.emitter().is_running());
    }

    #[test]
    fn fill_then_empty_restores_everything() {
        let mut c = FillController::new(1);
        c.set_filled(true);
        c.set_filled(false);
        assert_eq!(c.level().percent(), 100);
        assert_eq!(c.element().liquid_offset(), 100.0);
        assert_eq!(pressed(&c), Some("false"));
        assert!(!c.element().has_class(FILLED_CLASS));
        assert!(!c.emitter().is_running());
    }

    #[test]
    fn level_tracks_state() {
        let mut c = FillController::new(2);
        for desired in [true, false, false, true, true, false] {
            c.set_filled(desired);
            match c.state() {
                FillState::Filling => assert_eq!(c.level().percent(), 0),
                FillState::Empty => assert_eq!(c.level().percent(), 100),
            }
            assert_eq!(
                c.element().style_property(FILL_PROPERTY),
                Some(c.level().css_value().as_str())
            );
        }
    }

    #[test]
    fn hover_scenario() {
        let mut c = FillController::new(42);

        c.set_filled(true);
        assert_eq!(c.level().percent(), 0);
        assert_eq!(pressed(&c), Some("true"));

        c.advance(300);
        assert!(c.emitter().len() >= 1);

        c.advance(1000);
        c.set_filled(false);
        assert_eq!(c.level().percent(), 100);
        assert_eq!(pressed(&c), Some("false"));

        c.advance(1400);
        assert!(c.emitter().is_empty());
        assert_eq!(c.emitter().stats().ticks, 3);
    }

    #[test]
    fn external_fill_writes_are_observed() {
        let mut c = FillController::new(3);
        c.with_element(|el| el.set_style_property(FILL_PROPERTY, " 35% "));
        assert_eq!(c.element().liquid_offset(), 35.0);
        assert_eq!(c.state(), FillState::Empty);

        c.with_element(|el| el.set_style_property(FILL_PROPERTY, "lots"));
        assert_eq!(c.element().liquid_offset(), 100.0);

        c.with_element(|el| el.set_style_property(FILL_PROPERTY, "12"));
        assert_eq!(c.element().liquid_offset(), 12.0);

        c.with_element(|el| el.remove_style_property(FILL_PROPERTY));
        assert_eq!(c.element().liquid_offset(), 100.0);
    }

    #[test]
    fn attribute_writes_do_not_resync() {
        let mut c = FillController::new(3);
        c.with_element(|el| {
            el.set_liquid_offset(55.0);
            el.set_attribute(PRESSED_ATTRIBUTE, "true");
        });
        assert_eq!(c.element().liquid_offset(), 55.0);
        assert_eq!(c.apply_presentation_level(), 100.0);
    }

    #[test]
    fn loose_values_coerce_by_truthiness() {
        let mut c = FillController::new(4);
        c.set_filled_from("yes");
        assert!(c.state().is_filling());
        c.set_filled_from(" OFF ");
        assert!(!c.state().is_filling());
        c.set_filled_from("1");
        assert!(c.state().is_filling());
        c.set_filled_from("");
        assert!(!c.state().is_filling());
    }

    #[test]
    fn parse_level_cases() {
        assert_eq!(parse_level(None), Ok(100.0));
        assert_eq!(parse_level(Some("   ")), Ok(100.0));
        assert_eq!(parse_level(Some("0%")), Ok(0.0));
        assert_eq!(parse_level(Some("62.5 %")), Ok(62.5));
        assert!(matches!(parse_level(Some("abc%")), Err(LevelParseError::NotANumber(_))));
        assert!(matches!(parse_level(Some("inf%")), Err(LevelParseError::NotFinite(_))));
        assert!(matches!(parse_level(Some("NaN")), Err(LevelParseError::NotFinite(_))));
    }

    #[test]
    fn rapid_toggle_keeps_fresh_bubbles() {
        let mut c = FillController::new(8);
        c.set_filled(true);
        c.advance(900);
        c.set_filled(false);
        c.advance(1000);
        c.set_filled(true);
        c.advance(1300);
        let fresh = c.emitter().bubbles().filter(|b| b.born_at == 1300).count();
        assert!(fresh >= 1);
        assert!(c.emitter().bubbles().all(|b| b.born_at >= 1300));
    }
}
