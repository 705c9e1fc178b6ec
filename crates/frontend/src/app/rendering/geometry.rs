pub const CONTENT_WIDTH: i32 = 240;
pub const CONTENT_HEIGHT: i32 = 136;
pub const BORDER_LEFT: i32 = 8;
pub const BORDER_TOP: i32 = 4;
pub const FULL_WIDTH: i32 = CONTENT_WIDTH + 2 * BORDER_LEFT;
pub const FULL_HEIGHT: i32 = CONTENT_HEIGHT + 2 * BORDER_TOP;

/// Output surface size in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn clamped(self) -> (i32, i32) {
        let width = self.width.clamp(1, i32::MAX as u32) as i32;
        let height = self.height.clamp(1, i32::MAX as u32) as i32;
        (width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Plain,
    Crt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlitRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BlitRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Where the framebuffer lands on the output surface.
pub type GeometryRect = BlitRect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderBlit {
    pub src: BlitRect,
    pub dst: BlitRect,
}

pub fn compute_geometry(viewport: Viewport, mode: DisplayMode) -> GeometryRect {
    match mode {
        DisplayMode::Plain => plain_geometry(viewport),
        DisplayMode::Crt => crt_geometry(viewport),
    }
}

fn plain_geometry(viewport: Viewport) -> GeometryRect {
    let (window_w, window_h) = viewport.clamped();

    if (window_w as i64) * (CONTENT_HEIGHT as i64) < (window_h as i64) * (CONTENT_WIDTH as i64) {
        let width = snap_down(window_w, CONTENT_WIDTH);
        let height = scale(width, CONTENT_HEIGHT, CONTENT_WIDTH);
        let y = if window_w > window_h {
            (window_h - height) / 2
        } else {
            scale(width, BORDER_TOP, CONTENT_WIDTH).min(window_h - height)
        };
        BlitRect::new((window_w - width) / 2, y.max(0), width, height)
    } else {
        let height = snap_down(window_h, CONTENT_HEIGHT);
        let width = scale(height, CONTENT_WIDTH, CONTENT_HEIGHT);
        BlitRect::new((window_w - width) / 2, (window_h - height) / 2, width, height)
    }
}

fn crt_geometry(viewport: Viewport) -> GeometryRect {
    let (window_w, window_h) = viewport.clamped();

    if (window_w as i64) * (FULL_HEIGHT as i64) < (window_h as i64) * (FULL_WIDTH as i64) {
        let height = scale(window_w, FULL_HEIGHT, FULL_WIDTH);
        BlitRect::new(0, 0, window_w, height)
    } else {
        let width = scale(window_h, FULL_WIDTH, FULL_HEIGHT);
        BlitRect::new((window_w - width) / 2, 0, width, window_h)
    }
}

/// Rounds `size` down to a multiple of `unit`, falling back to the raw size
/// when the window is smaller than one unit.
fn snap_down(size: i32, unit: i32) -> i32 {
    let snapped = size - size % unit;
    if snapped == 0 {
        size
    } else {
        snapped
    }
}

fn scale(value: i32, numerator: i32, denominator: i32) -> i32 {
    ((value as i64 * numerator as i64) / denominator as i64).max(1) as i32
}

/// Maps a window-space pointer position into logical content coordinates.
/// The result is not clamped.
pub fn pointer_to_logical(x: i32, y: i32, rect: GeometryRect, mode: DisplayMode) -> (i32, i32) {
    if rect.width <= 0 || rect.height <= 0 {
        return (0, 0);
    }

    let local_x = (x - rect.x) as i64;
    let local_y = (y - rect.y) as i64;
    match mode {
        DisplayMode::Plain => (
            (local_x * CONTENT_WIDTH as i64 / rect.width as i64) as i32,
            (local_y * CONTENT_HEIGHT as i64 / rect.height as i64) as i32,
        ),
        DisplayMode::Crt => (
            (local_x * FULL_WIDTH as i64 / rect.width as i64) as i32 - BORDER_LEFT,
            (local_y * FULL_HEIGHT as i64 / rect.height as i64) as i32 - BORDER_TOP,
        ),
    }
}

/// Four blits that reproduce the bordered framebuffer without a shader: the
/// top and bottom border rows stretched across the window, the left border
/// column stretched across the content band, then the content itself.
pub fn border_blits(rect: GeometryRect, viewport: Viewport) -> [BorderBlit; 4] {
    let (window_w, window_h) = viewport.clamped();
    let bottom_y = rect.y + rect.height;

    [
        BorderBlit {
            src: BlitRect::new(0, 0, FULL_WIDTH, BORDER_TOP),
            dst: BlitRect::new(0, 0, window_w, rect.y),
        },
        BorderBlit {
            src: BlitRect::new(0, FULL_HEIGHT - BORDER_TOP, FULL_WIDTH, BORDER_TOP),
            dst: BlitRect::new(0, bottom_y, window_w, (window_h - bottom_y).max(0)),
        },
        BorderBlit {
            src: BlitRect::new(0, BORDER_TOP, BORDER_LEFT, CONTENT_HEIGHT),
            dst: BlitRect::new(0, rect.y, window_w, rect.height),
        },
        BorderBlit {
            src: BlitRect::new(BORDER_LEFT, BORDER_TOP, CONTENT_WIDTH, CONTENT_HEIGHT),
            dst: rect,
        },
    ]
}

pub fn full_frame_source() -> BlitRect {
    BlitRect::new(0, 0, FULL_WIDTH, FULL_HEIGHT)
}
