use crate::bubbles::Bubble;
use crate::controller::FillState;
use crate::input::Rect;
use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{BeginSynchronizedUpdate, EndSynchronizedUpdate},
};
use std::io::{self, Write};

// Braille: each terminal cell is 2x4 subpixels.
const SUB_X: usize = 2;
const SUB_Y: usize = 4;

// Bubble size units per braille subpixel of radius.
const SIZE_PER_SUBPX: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Cell {
    fn blank(bg: Color) -> Self {
        Self {
            ch: ' ',
            fg: Color::Reset,
            bg,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Theme {
    pub(crate) name: &'static str,
    bg: Color,
    glass: Color,
    liquid: Color,
    foam: Color,
    bubble: Color,
    hud: Color,
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

pub(crate) const THEMES: [Theme; 5] = [
    Theme {
        name: "cola",
        bg: rgb(8, 6, 6),
        glass: rgb(170, 200, 210),
        liquid: rgb(92, 40, 22),
        foam: rgb(214, 170, 120),
        bubble: rgb(235, 215, 190),
        hud: rgb(230, 200, 170),
    },
    Theme {
        name: "lime",
        bg: rgb(4, 8, 5),
        glass: rgb(170, 215, 190),
        liquid: rgb(60, 150, 60),
        foam: rgb(190, 240, 150),
        bubble: rgb(225, 255, 210),
        hud: rgb(190, 240, 170),
    },
    Theme {
        name: "orange",
        bg: rgb(10, 6, 3),
        glass: rgb(210, 200, 180),
        liquid: rgb(230, 120, 20),
        foam: rgb(255, 200, 120),
        bubble: rgb(255, 235, 200),
        hud: rgb(255, 200, 140),
    },
    Theme {
        name: "grape",
        bg: rgb(8, 4, 12),
        glass: rgb(190, 180, 220),
        liquid: rgb(95, 40, 140),
        foam: rgb(190, 140, 230),
        bubble: rgb(230, 210, 255),
        hud: rgb(210, 180, 255),
    },
    Theme {
        name: "mono",
        bg: rgb(0, 0, 0),
        glass: rgb(200, 200, 200),
        liquid: rgb(90, 90, 90),
        foam: rgb(170, 170, 170),
        bubble: rgb(240, 240, 240),
        hud: rgb(220, 220, 220),
    },
];

// For terminals without truecolor.
const PLAIN: Theme = Theme {
    name: "plain",
    bg: Color::Black,
    glass: Color::White,
    liquid: Color::DarkYellow,
    foam: Color::Yellow,
    bubble: Color::White,
    hud: Color::Grey,
};

impl Theme {
    pub(crate) fn background(&self) -> Color {
        self.bg
    }
}

pub(crate) fn theme_index(name: &str) -> usize {
    THEMES
        .iter()
        .position(|t| t.name.eq_ignore_ascii_case(name))
        .unwrap_or(0)
}

pub(crate) fn theme(ix: usize, color: bool) -> Theme {
    if color {
        THEMES[ix % THEMES.len()]
    } else {
        PLAIN
    }
}

pub(crate) struct Renderer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    front: Vec<Cell>,
    back: Vec<Cell>,
    pub(crate) full_redraw: bool,
    last_fg: Color,
    last_bg: Color,
}

impl Renderer {
    pub(crate) fn new(w: u16, h: u16, bg: Color) -> Self {
        let n = (w as usize) * (h as usize);
        Self {
            w,
            h,
            front: vec![Cell::blank(bg); n],
            back: vec![Cell::blank(bg); n],
            full_redraw: true,
            last_fg: Color::Reset,
            last_bg: Color::Reset,
        }
    }

    pub(crate) fn resize(&mut self, w: u16, h: u16, bg: Color) {
        *self = Self::new(w, h, bg);
    }

    #[inline]
    fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    fn clear_back(&mut self, bg: Color) {
        self.back.fill(Cell::blank(bg));
    }

    fn put(&mut self, x: u16, y: u16, cell: Cell) {
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        self.back[i] = cell;
    }

    fn get(&self, x: u16, y: u16) -> Option<Cell> {
        if x >= self.w || y >= self.h {
            return None;
        }
        Some(self.back[self.idx(x, y)])
    }

    fn text(&mut self, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.put(x.saturating_add(i as u16), y, Cell { ch, fg, bg });
        }
    }

    pub(crate) fn flush(&mut self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, BeginSynchronizedUpdate)?;

        let w = self.w as usize;
        for i in 0..self.back.len() {
            let b = self.back[i];
            if !self.full_redraw && b == self.front[i] {
                continue;
            }
            if b.bg != self.last_bg {
                queue!(out, SetBackgroundColor(b.bg))?;
                self.last_bg = b.bg;
            }
            if b.fg != self.last_fg {
                queue!(out, SetForegroundColor(b.fg))?;
                self.last_fg = b.fg;
            }
            queue!(
                out,
                cursor::MoveTo((i % w) as u16, (i / w) as u16),
                Print(b.ch)
            )?;
            self.front[i] = b;
        }

        self.full_redraw = false;
        queue!(out, ResetColor, EndSynchronizedUpdate)?;
        self.last_fg = Color::Reset;
        self.last_bg = Color::Reset;
        out.flush()
    }
}

/// Where the bottle sits on screen. `body` is the glass interior the liquid fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BottleLayout {
    pub(crate) outer: Rect,
    pub(crate) body: Rect,
    neck: Rect,
}

impl BottleLayout {
    pub(crate) fn fit(cols: u16, rows: u16, top: u16) -> Option<Self> {
        let avail = rows.saturating_sub(top + 1);
        let h = avail.min(28);
        let w = (cols / 3).clamp(12, 26);
        if h < 10 || cols < w + 2 {
            return None;
        }
        let x = (cols - w) / 2;
        let y = top + (avail - h) / 2;

        let neck_h = (h / 5).max(2);
        let neck_w = (w / 3).max(4);
        let neck = Rect {
            x: x + (w - neck_w) / 2,
            y,
            w: neck_w,
            h: neck_h,
        };
        let body = Rect {
            x: x + 1,
            y: y + neck_h + 1,
            w: w - 2,
            h: h - neck_h - 2,
        };
        Some(Self {
            outer: Rect { x, y, w, h },
            body,
            neck,
        })
    }
}

/// Just enough of a braille subpixel canvas to draw round bubbles.
struct Dots {
    sw: usize,
    sh: usize,
    on: Vec<bool>,
}

impl Dots {
    fn new(cells_w: usize, cells_h: usize) -> Self {
        let (sw, sh) = (cells_w * SUB_X, cells_h * SUB_Y);
        Self {
            sw,
            sh,
            on: vec![false; sw * sh],
        }
    }

    fn set(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x as usize >= self.sw || y as usize >= self.sh {
            return;
        }
        self.on[y as usize * self.sw + x as usize] = true;
    }

    /// Hollow ring for big bubbles, solid dot for small ones.
    fn ring(&mut self, cx: f32, cy: f32, r: f32) {
        let reach = r.ceil() as i32 + 1;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let px = cx + dx as f32;
                let py = cy + dy as f32;
                let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
                let hit = if r < 1.5 { d <= r } else { (d - r).abs() <= 0.6 };
                if hit {
                    self.set(px.round() as i32, py.round() as i32);
                }
            }
        }
    }

    fn cell_mask(&self, tx: usize, ty: usize) -> u8 {
        // (x=0,y=0..3) -> dots 1,2,3,7 ; (x=1,y=0..3) -> dots 4,5,6,8
        const BITS: [[u8; SUB_Y]; SUB_X] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];
        let mut mask = 0u8;
        for (ox, col) in BITS.iter().enumerate() {
            for (oy, bit) in col.iter().enumerate() {
                if self.on[(ty * SUB_Y + oy) * self.sw + tx * SUB_X + ox] {
                    mask |= bit;
                }
            }
        }
        mask
    }
}

pub(crate) struct HudInfo {
    pub(crate) state: FillState,
    pub(crate) fill_property: String,
    pub(crate) pressed: String,
    pub(crate) bubbles: usize,
    pub(crate) emitting: bool,
    pub(crate) ticks: u64,
    pub(crate) fps: f32,
    pub(crate) hovering: bool,
}

pub(crate) struct Frame<'a, B> {
    pub(crate) theme: Theme,
    pub(crate) layout: Option<BottleLayout>,
    /// Displayed liquid offset, percent from the top of the body.
    pub(crate) offset: f32,
    pub(crate) bubbles: B,
    pub(crate) now_ms: f32,
    pub(crate) hud: Option<&'a HudInfo>,
    pub(crate) help: bool,
}

pub(crate) fn draw<'a, 'b, B>(r: &mut Renderer, frame: Frame<'a, B>)
where
    B: Iterator<Item = &'b Bubble>,
{
    let th = frame.theme;
    r.clear_back(th.bg);

    match frame.layout {
        Some(layout) => {
            draw_glass(r, &layout, th);
            draw_liquid(r, &layout, frame.offset, th);
            draw_bubbles(r, &layout, frame.bubbles, frame.now_ms, th);
        }
        None => r.text(0, r.h.saturating_sub(1), "Terminal too small for the bottle.", th.hud, th.bg),
    }

    if let Some(info) = frame.hud {
        draw_hud(r, info, th);
    }
    if frame.help {
        draw_help(r, th);
    }
}

fn draw_glass(r: &mut Renderer, l: &BottleLayout, th: Theme) {
    let o = l.outer;
    let n = l.neck;
    let shoulder = n.y + n.h;
    let bottom = o.y + o.h - 1;
    let right = o.x + o.w - 1;
    let glass = |ch| Cell {
        ch,
        fg: th.glass,
        bg: th.bg,
    };

    // cap and neck
    for x in n.x..n.x + n.w {
        r.put(x, n.y, glass('▄'));
    }
    for y in n.y + 1..shoulder {
        r.put(n.x, y, glass('│'));
        r.put(n.x + n.w - 1, y, glass('│'));
    }

    // shoulders
    r.put(o.x, shoulder, glass('╭'));
    r.put(right, shoulder, glass('╮'));
    for x in o.x + 1..right {
        if x <= n.x || x >= n.x + n.w - 1 {
            r.put(x, shoulder, glass('─'));
        }
    }
    r.put(n.x, shoulder, glass('╯'));
    r.put(n.x + n.w - 1, shoulder, glass('╰'));

    // body and base
    for y in shoulder + 1..bottom {
        r.put(o.x, y, glass('│'));
        r.put(right, y, glass('│'));
    }
    r.put(o.x, bottom, glass('╰'));
    r.put(right, bottom, glass('╯'));
    for x in o.x + 1..right {
        r.put(x, bottom, glass('─'));
    }
}

fn draw_liquid(r: &mut Renderer, l: &BottleLayout, offset: f32, th: Theme) {
    const EIGHTHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

    let b = l.body;
    let top = b.h as f32 * offset.clamp(0.0, 100.0) / 100.0;
    for row in 0..b.h {
        let y = b.y + row;
        let rf = row as f32;
        let cell = if rf >= top {
            Cell {
                ch: ' ',
                fg: th.foam,
                bg: th.liquid,
            }
        } else if rf + 1.0 > top {
            // surface row: foam line drawn as partial blocks
            let covered = ((rf + 1.0 - top) * 8.0).round() as usize;
            Cell {
                ch: EIGHTHS[covered.min(8)],
                fg: th.foam,
                bg: th.bg,
            }
        } else {
            continue;
        };
        for x in b.x..b.x + b.w {
            r.put(x, y, cell);
        }
    }
}

fn draw_bubbles<'b>(
    r: &mut Renderer,
    l: &BottleLayout,
    bubbles: impl Iterator<Item = &'b Bubble>,
    now_ms: f32,
    th: Theme,
) {
    let b = l.body;
    let mut dots = Dots::new(b.w as usize, b.h as usize);
    let (sw, sh) = (dots.sw as f32, dots.sh as f32);

    let mut any = false;
    for bubble in bubbles {
        let p = bubble.progress(now_ms);
        if p >= 1.0 {
            continue;
        }
        let radius = bubble.shape.size / SIZE_PER_SUBPX;
        let cx = bubble.shape.left_pct / 100.0 * sw;
        // rises from the base to just past the surface of a full bottle
        let cy = (sh - radius) - p * (sh + radius);
        dots.ring(cx, cy, radius);
        any = true;
    }
    if !any {
        return;
    }

    for ty in 0..b.h as usize {
        for tx in 0..b.w as usize {
            let mask = dots.cell_mask(tx, ty);
            if mask == 0 {
                continue;
            }
            let (x, y) = (b.x + tx as u16, b.y + ty as u16);
            let bg = r.get(x, y).map(|c| c.bg).unwrap_or(th.bg);
            let ch = char::from_u32(0x2800 + mask as u32).unwrap_or(' ');
            r.put(
                x,
                y,
                Cell {
                    ch,
                    fg: th.bubble,
                    bg,
                },
            );
        }
    }
}

fn draw_hud(r: &mut Renderer, info: &HudInfo, th: Theme) {
    let line = format!(
        "  Soda  | {}  | --fill: {}  | aria-pressed: {}  | bubbles: {}{}  | ticks: {}  | theme: {}  | {:.0} fps ",
        match info.state {
            FillState::Filling => "filling",
            FillState::Empty => "empty  ",
        },
        info.fill_property,
        info.pressed,
        info.bubbles,
        if info.emitting { " +" } else { "" },
        info.ticks,
        th.name,
        info.fps
    );
    let hint = if info.hovering {
        "  move the pointer off the bottle to let it drain  "
    } else {
        "  hover / click / hold Space or Enter to fill  |  C theme  H hud  ? help  Q quit  "
    };
    let w = r.w as usize;
    r.text(0, 0, &line.chars().take(w).collect::<String>(), th.hud, th.bg);
    if r.h > 1 {
        r.text(0, 1, &hint.chars().take(w).collect::<String>(), th.hud, th.bg);
    }
}

fn draw_help(r: &mut Renderer, th: Theme) {
    let lines = [
        "Soda bottle",
        "",
        "Hover the bottle: fill",
        "Click (no hover): fill while held",
        "Space / Enter held: fill",
        "Let go: drains, bubbles clear",
        "",
        "C: cycle theme    H: toggle HUD",
        "?: this help      Q / Esc: quit",
    ];
    let w = r.w as i32;
    let h = r.h as i32;
    let box_w = 40.min(w - 2);
    let box_h = (lines.len() as i32 + 2).min(h - 2);
    if box_w < 10 || box_h < 4 {
        return;
    }
    let x0 = ((w - box_w) / 2) as u16;
    let y0 = ((h - box_h) / 2) as u16;
    let (bw, bh) = (box_w as u16, box_h as u16);

    for y in 0..bh {
        for x in 0..bw {
            let edge_x = x == 0 || x == bw - 1;
            let edge_y = y == 0 || y == bh - 1;
            let ch = match (edge_x, edge_y) {
                (true, true) => match (x == 0, y == 0) {
                    (true, true) => '┌',
                    (false, true) => '┐',
                    (true, false) => '└',
                    (false, false) => '┘',
                },
                (false, true) => '─',
                (true, false) => '│',
                (false, false) => ' ',
            };
            r.put(
                x0 + x,
                y0 + y,
                Cell {
                    ch,
                    fg: th.hud,
                    bg: th.bg,
                },
            );
        }
    }
    for (i, s) in lines.iter().enumerate().take((bh - 2) as usize) {
        let s: String = s.chars().take((bw - 4) as usize).collect();
        r.text(x0 + 2, y0 + 1 + i as u16, &s, th.hud, th.bg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_fits_inside_the_screen() {
        let l = BottleLayout::fit(80, 30, 2).unwrap();
        assert!(l.outer.x + l.outer.w <= 80);
        assert!(l.outer.y >= 2);
        assert!(l.outer.y + l.outer.h <= 30);
        assert!(l.outer.contains(l.body.x, l.body.y));
        assert!(l.outer.contains(l.body.x + l.body.w - 1, l.body.y + l.body.h - 1));
        assert!(l.body.h >= 5);
    }

    #[test]
    fn tiny_terminal_has_no_layout() {
        assert!(BottleLayout::fit(80, 8, 2).is_none());
        assert!(BottleLayout::fit(10, 40, 2).is_none());
    }

    #[test]
    fn liquid_covers_body_by_offset() {
        let l = BottleLayout::fit(80, 30, 2).unwrap();
        let th = THEMES[0];
        let b = l.body;

        let mut r = Renderer::new(80, 30, th.bg);
        draw_liquid(&mut r, &l, 0.0, th);
        assert_eq!(r.get(b.x, b.y).unwrap().bg, th.liquid);

        let mut r = Renderer::new(80, 30, th.bg);
        draw_liquid(&mut r, &l, 100.0, th);
        assert_eq!(r.get(b.x, b.y + b.h - 1).unwrap().bg, th.bg);

        let mut r = Renderer::new(80, 30, th.bg);
        draw_liquid(&mut r, &l, 50.0, th);
        assert_eq!(r.get(b.x, b.y).unwrap().bg, th.bg);
        assert_eq!(r.get(b.x, b.y + b.h - 1).unwrap().bg, th.liquid);
    }

    #[test]
    fn small_ring_is_a_dot() {
        let mut d = Dots::new(1, 1);
        d.ring(0.0, 0.0, 0.75);
        assert_eq!(d.cell_mask(0, 0), 0x01);
    }

    #[test]
    fn colors_reset_after_every_frame() {
        let fizz = Color::Rgb { r: 1, g: 2, b: 3 };
        let cell = |ch| Cell {
            ch,
            fg: fizz,
            bg: Color::Black,
        };
        let mut r = Renderer::new(4, 1, Color::Black);

        r.put(0, 0, cell('o'));
        let mut out = Vec::new();
        r.flush(&mut out).unwrap();
        let first = String::from_utf8(out).unwrap();
        assert!(first.contains("38;2;1;2;3"));
        assert!(first.contains("\x1b[0m"));

        // same colours again: must be re-sent since the frame ended with a reset
        r.put(1, 0, cell('O'));
        let mut out = Vec::new();
        r.flush(&mut out).unwrap();
        let second = String::from_utf8(out).unwrap();
        assert!(second.contains("38;2;1;2;3"));
        assert!(second.find("38;2;1;2;3") < second.find('O'));
    }

    #[test]
    fn theme_lookup() {
        assert_eq!(THEMES[theme_index("GRAPE")].name, "grape");
        assert_eq!(theme_index("no-such-theme"), 0);
        assert_eq!(theme(7, true).name, THEMES[2].name);
        assert_eq!(theme(0, false).name, "plain");
    }
}
