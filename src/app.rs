use crate::config::{self, Args, Settings};
use crate::controller::FillController;
use crate::element::FILL_PROPERTY;
use crate::input::{route, Action, Command, Gestures, Rect};
use crate::logging;
use crate::render::{self, BottleLayout, Frame, HudInfo, Renderer};
use crate::timer::Millis;
use anyhow::Context;
use clap::Parser;
use crossterm::{
    cursor,
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    style::ResetColor,
    terminal::{self, DisableLineWrap, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const HUD_ROWS: u16 = 2;
// Time constant of the displayed liquid line chasing the real offset.
const EASE_SECS: f32 = 0.2;

pub(crate) struct App {
    settings: Settings,
    controller: FillController,
    gestures: Gestures,
    renderer: Renderer,
    out: Stdout,
    theme_ix: usize,
    show_hud: bool,
    show_help: bool,
    shown_offset: f32,
    started: Instant,
    should_quit: bool,
    // dropped last so the terminal is restored after everything else
    _term: TerminalGuard,
}

impl App {
    fn init(settings: Settings) -> anyhow::Result<Self> {
        let seed = settings.seed.unwrap_or_else(clock_seed);
        let (term, releases) = TerminalGuard::enter()?;
        let (cols, rows) = terminal::size().context("could not read terminal size")?;

        let theme_ix = render::theme_index(&settings.theme);
        let bg_theme = render::theme(theme_ix, settings.enable_color);
        let release_after = if releases {
            None
        } else {
            Some(settings.key_release_ms)
        };
        info!(cols, rows, seed, releases, theme = bg_theme.name, "starting");

        let controller = FillController::new(seed);
        let shown_offset = controller.element().liquid_offset();
        Ok(Self {
            show_hud: settings.show_hud,
            settings,
            controller,
            gestures: Gestures::new(release_after),
            renderer: Renderer::new(cols, rows, bg_theme.background()),
            out: io::stdout(),
            theme_ix,
            show_help: false,
            shown_offset,
            started: Instant::now(),
            should_quit: false,
            _term: term,
        })
    }

    fn now_ms(&self) -> Millis {
        self.started.elapsed().as_millis() as Millis
    }

    fn layout(&self) -> Option<BottleLayout> {
        let top = if self.show_hud { HUD_ROWS } else { 0 };
        BottleLayout::fit(self.renderer.w, self.renderer.h, top)
    }

    fn target(&self) -> Rect {
        self.layout().map(|l| l.outer).unwrap_or_default()
    }

    // The bottle moved, the pointer may not have.
    fn rehover(&mut self) {
        let target = self.target();
        for action in self.gestures.retarget(target) {
            self.apply(action);
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let frame_dt = Duration::from_secs_f32(1.0 / self.settings.fps_cap as f32);
        let mut last = Instant::now();
        let mut fps_acc = 0.0f32;
        let mut fps_frames = 0u32;
        let mut fps_est = 0.0f32;

        while !self.should_quit {
            let frame_start = Instant::now();
            let now = self.now_ms();

            // timers first so anything input schedules is relative to now
            self.controller.advance(now);

            while event::poll(Duration::ZERO)? {
                let ev = event::read()?;
                if let Event::Resize(w, h) = ev {
                    let th = render::theme(self.theme_ix, self.settings.enable_color);
                    self.renderer.resize(w, h, th.background());
                    debug!(w, h, "resize");
                    self.rehover();
                    continue;
                }
                let target = self.target();
                for action in self.gestures.translate(&ev, target, now) {
                    self.apply(action);
                }
            }
            if let Some(action) = self.gestures.poll_held(now) {
                self.apply(action);
            }

            // Timing
            let dt = frame_start.duration_since(last).as_secs_f32().min(0.1);
            last = frame_start;
            fps_acc += dt;
            fps_frames += 1;
            if fps_acc >= 0.5 {
                fps_est = fps_frames as f32 / fps_acc;
                fps_acc = 0.0;
                fps_frames = 0;
            }

            let target = self.controller.element().liquid_offset();
            let k = 1.0 - (-dt / EASE_SECS).exp();
            self.shown_offset += (target - self.shown_offset) * k;

            self.render_frame(fps_est)?;

            let spent = frame_start.elapsed();
            if spent < frame_dt {
                std::thread::sleep(frame_dt - spent);
            }
        }

        let stats = self.controller.emitter().stats();
        info!(
            spawned = stats.spawned,
            expired = stats.expired,
            swept = stats.swept,
            ticks = stats.ticks,
            "bye"
        );
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Host(ev) => {
                if let Some(d) = route(ev) {
                    debug!(?ev, fill = d.fill, prevent_default = d.prevent_default, "gesture");
                    self.controller.set_filled(d.fill);
                }
            }
            Action::Command(cmd) => match cmd {
                Command::Quit => self.should_quit = true,
                Command::ToggleHelp => self.show_help = !self.show_help,
                Command::ToggleHud => {
                    self.show_hud = !self.show_hud;
                    self.renderer.full_redraw = true;
                    self.rehover();
                }
                Command::CycleTheme => {
                    self.theme_ix = (self.theme_ix + 1) % render::THEMES.len();
                    self.renderer.full_redraw = true;
                }
                Command::Redraw => self.renderer.full_redraw = true,
            },
        }
    }

    fn render_frame(&mut self, fps: f32) -> io::Result<()> {
        let el = self.controller.element();
        let hud = HudInfo {
            state: self.controller.state(),
            fill_property: el.style_property(FILL_PROPERTY).unwrap_or("unset").to_string(),
            pressed: el.pressed().map_or("?".to_string(), |p| p.to_string()),
            bubbles: self.controller.emitter().len(),
            emitting: self.controller.emitter().is_running(),
            ticks: self.controller.emitter().stats().ticks,
            fps,
            hovering: self.gestures.hovering(),
        };
        let frame = Frame {
            theme: render::theme(self.theme_ix, self.settings.enable_color),
            layout: self.layout(),
            offset: self.shown_offset,
            bubbles: self.controller.emitter().bubbles(),
            now_ms: self.started.elapsed().as_secs_f32() * 1000.0,
            hud: self.show_hud.then_some(&hud),
            help: self.show_help,
        };
        render::draw(&mut self.renderer, frame);
        self.renderer.flush(&mut self.out)
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x50DA_B0B)
        ^ 0xB0B8_1E5
}

/// Owns the terminal modes. Restores them on drop, so panics and early returns are covered.
struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    /// Also reports whether the terminal will send key release events.
    fn enter() -> anyhow::Result<(Self, bool)> {
        let mut out = io::stdout();
        terminal::enable_raw_mode().context("could not enable raw mode")?;
        let mut guard = Self { enhanced: false };
        execute!(
            out,
            EnterAlternateScreen,
            DisableLineWrap,
            cursor::Hide,
            EnableMouseCapture,
            EnableFocusChange
        )?;
        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                out,
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )?;
            guard.enhanced = true;
        }
        let enhanced = guard.enhanced;
        Ok((guard, enhanced))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut out = io::stdout();
        if self.enhanced {
            let _ = execute!(out, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(
            out,
            DisableFocusChange,
            DisableMouseCapture,
            ResetColor,
            cursor::Show,
            EnableLineWrap,
            LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

pub(crate) fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.log.as_deref(), &args.log_level)?;
    let settings = config::resolve(&args);
    debug!(?settings, "settings");

    let mut app = App::init(settings)?;
    app.run()
}
