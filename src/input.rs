use crate::timer::Millis;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Key {
    Space,
    Enter,
    Other,
}

/// Gestures as the bottle sees them, independent of the terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HostEvent {
    PointerEnter,
    PointerLeave,
    TouchStart,
    TouchEnd,
    TouchCancel,
    KeyDown(Key),
    KeyUp(Key),
}

/// What a gesture asks of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Dispatch {
    pub(crate) fill: bool,
    pub(crate) prevent_default: bool,
}

pub(crate) fn route(ev: HostEvent) -> Option<Dispatch> {
    let (fill, prevent_default) = match ev {
        HostEvent::PointerEnter => (true, false),
        HostEvent::PointerLeave => (false, false),
        HostEvent::TouchStart => (true, true),
        HostEvent::TouchEnd | HostEvent::TouchCancel => (false, false),
        HostEvent::KeyDown(Key::Space | Key::Enter) => (true, true),
        HostEvent::KeyUp(Key::Space | Key::Enter) => (false, true),
        HostEvent::KeyDown(Key::Other) | HostEvent::KeyUp(Key::Other) => return None,
    };
    Some(Dispatch {
        fill,
        prevent_default,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Quit,
    ToggleHelp,
    ToggleHud,
    CycleTheme,
    Redraw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Host(HostEvent),
    Command(Command),
}

/// Screen rectangle in terminal cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Rect {
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) w: u16,
    pub(crate) h: u16,
}

impl Rect {
    pub(crate) fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && row >= self.y && col - self.x < self.w && row - self.y < self.h
    }
}

/// Turns raw terminal events into bottle gestures.
///
/// Hover is edge-triggered off mouse motion. A click only counts as a touch
/// when the pointer is not already hovering, which covers terminals that do
/// not report motion. If the pointer ends up hovering before the button comes
/// back up, hover keeps the fill and the touch end is swallowed. Terminals
/// that cannot report key releases get a synthetic key-up once a held key
/// stops repeating for `release_after` ms.
pub(crate) struct Gestures {
    hovering: bool,
    touching: bool,
    held: Option<(Key, Millis)>,
    release_after: Option<Millis>,
    pointer: Option<(u16, u16)>,
}

impl Gestures {
    /// `release_after` is `None` when the terminal reports real key releases.
    pub(crate) fn new(release_after: Option<Millis>) -> Self {
        Self {
            hovering: false,
            touching: false,
            held: None,
            release_after,
            pointer: None,
        }
    }

    pub(crate) fn hovering(&self) -> bool {
        self.hovering
    }

    pub(crate) fn translate(&mut self, ev: &Event, target: Rect, now: Millis) -> Vec<Action> {
        let mut out = Vec::new();
        match ev {
            Event::Mouse(m) => {
                self.pointer = Some((m.column, m.row));
                let inside = target.contains(m.column, m.row);
                match m.kind {
                    MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                        self.hover_to(inside, &mut out);
                    }
                    MouseEventKind::Down(MouseButton::Left) => {
                        if inside && !self.hovering && !self.touching {
                            self.touching = true;
                            out.push(Action::Host(HostEvent::TouchStart));
                        }
                    }
                    MouseEventKind::Up(MouseButton::Left) => {
                        if std::mem::take(&mut self.touching) && !self.hovering {
                            out.push(Action::Host(HostEvent::TouchEnd));
                        }
                    }
                    _ => {}
                }
            }
            Event::FocusLost => {
                // releases go to whichever window has focus now
                self.hovering = false;
                self.touching = false;
                self.held = None;
                self.pointer = None;
                out.push(Action::Host(HostEvent::TouchCancel));
            }
            Event::Key(k) => self.key(k, now, &mut out),
            _ => {}
        }
        if !out.is_empty() {
            trace!(?out, "gestures");
        }
        out
    }

    /// Re-checks hover after the bottle moved under a pointer that did not.
    pub(crate) fn retarget(&mut self, target: Rect) -> Vec<Action> {
        let inside = self
            .pointer
            .is_some_and(|(col, row)| target.contains(col, row));
        let mut out = Vec::new();
        self.hover_to(inside, &mut out);
        out
    }

    fn hover_to(&mut self, inside: bool, out: &mut Vec<Action>) {
        if inside == self.hovering {
            return;
        }
        self.hovering = inside;
        out.push(Action::Host(if inside {
            HostEvent::PointerEnter
        } else {
            HostEvent::PointerLeave
        }));
    }

    fn key(&mut self, k: &KeyEvent, now: Millis, out: &mut Vec<Action>) {
        let key = match k.code {
            KeyCode::Char(' ') => Key::Space,
            KeyCode::Enter => Key::Enter,
            _ => Key::Other,
        };

        if key != Key::Other {
            match k.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    self.held = Some((key, now));
                    out.push(Action::Host(HostEvent::KeyDown(key)));
                }
                KeyEventKind::Release => {
                    self.held = None;
                    out.push(Action::Host(HostEvent::KeyUp(key)));
                }
            }
            return;
        }

        if k.kind != KeyEventKind::Press {
            return;
        }
        let cmd = match k.code {
            KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
            KeyCode::Char('l') if k.modifiers.contains(KeyModifiers::CONTROL) => Command::Redraw,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Command::Quit,
            KeyCode::Char('?') => Command::ToggleHelp,
            KeyCode::Char('h') | KeyCode::Char('H') => Command::ToggleHud,
            KeyCode::Char('c') | KeyCode::Char('C') => Command::CycleTheme,
            _ => return,
        };
        out.push(Action::Command(cmd));
    }

    /// Synthetic key-up for terminals without release events.
    pub(crate) fn poll_held(&mut self, now: Millis) -> Option<Action> {
        let after = self.release_after?;
        let (key, at) = self.held?;
        if now.saturating_sub(at) < after {
            return None;
        }
        self.held = None;
        Some(Action::Host(HostEvent::KeyUp(key)))
    }
}
