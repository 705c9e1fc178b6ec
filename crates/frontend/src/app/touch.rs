use tracing::{debug, warn};

use super::host::{HostBackend, IndexedSheet, TextureSlot, TouchDevice};
use super::input::{GamepadButton, GamepadMask};
use super::rendering::{BlitRect, Viewport};

pub const GLYPH_SIZE: i32 = 8;
pub const FADE_STEP: u8 = 3;
pub const HIDE_AFTER_SECONDS: u32 = 5;
const DPAD_CELLS: i32 = 3;

/// Window-relative placement of the touch gamepad. Rebuilt on every resize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchLayout {
    tile_size: i32,
    dpad: (i32, i32),
    a: (i32, i32),
    b: (i32, i32),
    x: (i32, i32),
    y: (i32, i32),
}

impl TouchLayout {
    pub fn for_viewport(viewport: Viewport) -> Self {
        let width = viewport.width.min(i32::MAX as u32) as i32;
        let height = viewport.height.min(i32::MAX as u32) as i32;

        let (tile, offset) = if width < height {
            let tile = width / 2 / DPAD_CELLS;
            (tile, (height * 2 - DPAD_CELLS * tile) / 3)
        } else {
            let tile = width / 5 / DPAD_CELLS;
            (tile, (height - DPAD_CELLS * tile) / 2)
        };

        Self {
            tile_size: tile,
            dpad: (0, offset),
            a: (width - 2 * tile, 2 * tile + offset),
            b: (width - tile, tile + offset),
            x: (width - 3 * tile, tile + offset),
            y: (width - 2 * tile, offset),
        }
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn dpad_rect(&self) -> BlitRect {
        let size = self.tile_size * DPAD_CELLS;
        BlitRect::new(self.dpad.0, self.dpad.1, size, size)
    }

    pub fn button_rect(&self, button: GamepadButton) -> Option<BlitRect> {
        let (x, y) = match button {
            GamepadButton::A => self.a,
            GamepadButton::B => self.b,
            GamepadButton::X => self.x,
            GamepadButton::Y => self.y,
            _ => return None,
        };
        Some(BlitRect::new(x, y, self.tile_size, self.tile_size))
    }

    /// Buttons covered by a single window-space point.
    pub fn hit_test(&self, x: i32, y: i32) -> GamepadMask {
        let mut mask = GamepadMask::EMPTY;

        let dpad = self.dpad_rect();
        if dpad.contains(x, y) {
            let size = self.tile_size;
            let local_x = x - dpad.x;
            let local_y = y - dpad.y;
            let (cell_x, cell_y) = (local_x / size, local_y / size);
            if cell_x == 1 && cell_y == 1 {
                // Center cell splits into a finer 3x3 grid.
                let sub = size / DPAD_CELLS;
                if sub > 0 {
                    mask |= direction_bits(
                        ((local_x - size) / sub).min(2),
                        ((local_y - size) / sub).min(2),
                    );
                }
            } else {
                mask |= direction_bits(cell_x, cell_y);
            }
        }

        for button in [
            GamepadButton::A,
            GamepadButton::B,
            GamepadButton::X,
            GamepadButton::Y,
        ] {
            if let Some(rect) = self.button_rect(button) {
                if rect.contains(x, y) {
                    mask.set(button, true);
                }
            }
        }

        mask
    }

    /// Destination of each glyph, in `GamepadButton::ALL` order.
    pub fn glyph_rects(&self) -> [BlitRect; 8] {
        let tile = self.tile_size;
        let (dx, dy) = self.dpad;
        let at = |(x, y): (i32, i32)| BlitRect::new(x, y, tile, tile);
        [
            at((dx + tile, dy)),
            at((dx + tile, dy + 2 * tile)),
            at((dx, dy + tile)),
            at((dx + 2 * tile, dy + tile)),
            at(self.a),
            at(self.b),
            at(self.x),
            at(self.y),
        ]
    }
}

fn direction_bits(cell_x: i32, cell_y: i32) -> GamepadMask {
    let mut mask = GamepadMask::EMPTY;
    mask.set(GamepadButton::Up, cell_y == 0);
    mask.set(GamepadButton::Down, cell_y == 2);
    mask.set(GamepadButton::Left, cell_x == 0);
    mask.set(GamepadButton::Right, cell_x == 2);
    mask
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchScan {
    pub any_finger: bool,
    pub zones: GamepadMask,
}

/// Hit-tests every pressed finger of every touch device against the layout.
pub fn scan_touches(layout: &TouchLayout, viewport: Viewport, devices: &[TouchDevice]) -> TouchScan {
    let mut scan = TouchScan::default();
    for device in devices {
        if device.fingers.is_empty() {
            continue;
        }
        scan.any_finger = true;
        for finger in device.fingers.iter().filter(|finger| finger.pressure > 0.0) {
            let x = (finger.x * viewport.width as f32) as i32;
            let y = (finger.y * viewport.height as f32) as i32;
            scan.zones |= layout.hit_test(x, y);
        }
    }
    scan
}

/// Overlay visibility state, mutated once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeTimer {
    alpha: u8,
    idle_ticks: u32,
    visible: bool,
    max_alpha: u8,
    hide_after_ticks: u32,
}

impl FadeTimer {
    pub fn new(max_alpha: u8, hide_after_ticks: u32) -> Self {
        Self {
            alpha: 0,
            idle_ticks: 0,
            visible: false,
            max_alpha,
            hide_after_ticks: hide_after_ticks.max(1),
        }
    }

    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn should_draw(&self) -> bool {
        self.visible || self.alpha > 0
    }

    /// A finger is down somewhere on a touch device this tick.
    pub fn observe_touch(&mut self) {
        self.idle_ticks = 0;
        if !self.visible {
            self.alpha = self.max_alpha;
            self.visible = true;
        }
    }

    pub fn end_tick(&mut self, zone_active: bool) {
        if !self.visible {
            self.alpha = self.alpha.saturating_sub(FADE_STEP);
        }

        self.idle_ticks = if zone_active {
            0
        } else {
            self.idle_ticks.saturating_add(1)
        };
        if self.idle_ticks >= self.hide_after_ticks {
            self.visible = false;
        }
    }
}

#[derive(Debug)]
pub struct TouchOverlayRenderer {
    viewport: Viewport,
    layout: TouchLayout,
    fade: FadeTimer,
    texture_ready: bool,
    rgba: Vec<u8>,
}

impl TouchOverlayRenderer {
    pub fn new(viewport: Viewport, max_alpha: u8, target_tps: u32) -> Self {
        Self {
            viewport,
            layout: TouchLayout::for_viewport(viewport),
            fade: FadeTimer::new(max_alpha, HIDE_AFTER_SECONDS * target_tps.max(1)),
            texture_ready: false,
            rgba: Vec::new(),
        }
    }

    pub fn layout(&self) -> &TouchLayout {
        &self.layout
    }

    pub fn fade(&self) -> &FadeTimer {
        &self.fade
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.layout = TouchLayout::for_viewport(viewport);
    }

    /// Re-derives the glyph texture from the VM's tile sheet. Palette index 0
    /// is transparent.
    pub fn refresh_texture<H: HostBackend>(&mut self, host: &mut H, sheet: Option<IndexedSheet<'_>>) {
        let Some(sheet) = sheet else {
            self.texture_ready = false;
            return;
        };

        match indexed_sheet_to_rgba(&sheet, &mut self.rgba) {
            Ok(()) => {
                host.upload_texture(TextureSlot::TouchOverlay, sheet.width, sheet.height, &self.rgba);
                self.texture_ready = true;
                debug!(width = sheet.width, height = sheet.height, "touch_overlay_texture_ready");
            }
            Err(expected) => {
                warn!(
                    expected_bytes = expected,
                    actual_bytes = sheet.pixels.len(),
                    "touch_overlay_sheet_too_small"
                );
                self.texture_ready = false;
            }
        }
    }

    pub fn scan<H: HostBackend>(&mut self, host: &H) -> GamepadMask {
        let scan = scan_touches(&self.layout, self.viewport, host.touch_devices());
        if scan.any_finger {
            self.fade.observe_touch();
        }
        scan.zones
    }

    /// Draws the glyphs for player one's fused state, then advances the fade.
    pub fn render<H: HostBackend>(&mut self, host: &mut H, pressed: GamepadMask, zone_active: bool) {
        if self.texture_ready && self.fade.should_draw() {
            host.set_texture_alpha(TextureSlot::TouchOverlay, self.fade.alpha());
            for (index, (button, dst)) in GamepadButton::ALL
                .into_iter()
                .zip(self.layout.glyph_rects())
                .enumerate()
            {
                let column = (if pressed.is_down(button) { 8 + index } else { index }) as i32;
                let src = BlitRect::new(column * GLYPH_SIZE, 0, GLYPH_SIZE, GLYPH_SIZE);
                host.blit(TextureSlot::TouchOverlay, src, dst);
            }
        }

        self.fade.end_tick(zone_active);
    }
}

fn indexed_sheet_to_rgba(sheet: &IndexedSheet<'_>, out: &mut Vec<u8>) -> Result<(), usize> {
    let pixel_count = sheet.width as usize * sheet.height as usize;
    let expected = pixel_count.div_ceil(2);
    if sheet.pixels.len() < expected {
        return Err(expected);
    }

    out.clear();
    out.reserve(pixel_count * 4);
    for index in 0..pixel_count {
        let byte = sheet.pixels[index / 2];
        let color = if index % 2 == 0 { byte & 0x0f } else { byte >> 4 };
        if color == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            let [r, g, b] = sheet.palette[usize::from(color)];
            out.extend_from_slice(&[r, g, b, 0xff]);
        }
    }
    Ok(())
}
