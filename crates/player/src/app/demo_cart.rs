use frontend::app::{BORDER_LEFT, BORDER_TOP, CONTENT_HEIGHT, CONTENT_WIDTH, FRAMEBUFFER_BYTES, GAMEPAD_COUNT};
use frontend::{
    CanonicalInputSnapshot, ConsoleKey, ConsoleVm, GamepadButton, IndexedSheet, VmFrame,
    FULL_WIDTH,
};
use tracing::info;

use super::desktop::CONSOLE_SAMPLE_RATE;

const TARGET_TPS: u32 = 60;
const SAMPLES_PER_TICK: usize = (CONSOLE_SAMPLE_RATE / TARGET_TPS) as usize;
const BEEP_HZ: u32 = 440;
const BEEP_AMPLITUDE: i16 = 4000;

const SHEET_WIDTH: u32 = 128;
const SHEET_HEIGHT: u32 = 8;
const GLYPH: u32 = 8;

const COLOR_BORDER: usize = 1;
const COLOR_DIM: usize = 15;
const COLOR_LIT: usize = 11;
const COLOR_OUTLINE: usize = 12;
const COLOR_PRESSED: usize = 4;
const COLOR_CURSOR: usize = 12;

const PALETTE: [[u8; 3]; 16] = [
    [26, 28, 44],
    [93, 39, 93],
    [177, 62, 83],
    [239, 125, 87],
    [255, 205, 117],
    [167, 240, 112],
    [56, 183, 100],
    [37, 113, 121],
    [41, 54, 111],
    [59, 93, 201],
    [65, 166, 246],
    [115, 239, 247],
    [244, 244, 244],
    [148, 176, 194],
    [86, 108, 134],
    [51, 60, 87],
];

/// Built-in test-pattern cartridge: scrolling color bars, one indicator row
/// per gamepad, a pointer crosshair and a beep while player one holds A.
/// Escape asks the front-end to quit.
#[derive(Debug)]
pub(crate) struct DemoCart {
    framebuffer: Vec<u8>,
    samples: Vec<i16>,
    sheet: Vec<u8>,
    frame: u32,
    beep_phase: u32,
    exit: bool,
}

impl DemoCart {
    pub(crate) fn new() -> Self {
        Self {
            framebuffer: vec![0; FRAMEBUFFER_BYTES],
            samples: vec![0; SAMPLES_PER_TICK],
            sheet: build_glyph_sheet(),
            frame: 0,
            beep_phase: 0,
            exit: false,
        }
    }

    fn draw(&mut self, input: &CanonicalInputSnapshot) {
        fill_rect(
            &mut self.framebuffer,
            0,
            0,
            FULL_WIDTH,
            CONTENT_HEIGHT + 2 * BORDER_TOP,
            COLOR_BORDER,
        );

        let bar_width = CONTENT_WIDTH / 8;
        let scroll = (self.frame / 2) as i32;
        for column in 0..CONTENT_WIDTH {
            let bar = ((column + scroll) / bar_width) as usize % 8;
            fill_rect(
                &mut self.framebuffer,
                BORDER_LEFT + column,
                BORDER_TOP,
                1,
                CONTENT_HEIGHT,
                2 + bar,
            );
        }

        for slot in 0..GAMEPAD_COUNT {
            let mask = input.gamepad(slot);
            let y = BORDER_TOP + 8 + slot as i32 * 12;
            for (index, button) in GamepadButton::ALL.into_iter().enumerate() {
                let color = if mask.is_down(button) { COLOR_LIT } else { COLOR_DIM };
                fill_rect(
                    &mut self.framebuffer,
                    BORDER_LEFT + 8 + index as i32 * 12,
                    y,
                    10,
                    10,
                    color,
                );
            }
        }

        let pointer = input.pointer();
        if (0..CONTENT_WIDTH).contains(&pointer.x) && (0..CONTENT_HEIGHT).contains(&pointer.y) {
            let x = BORDER_LEFT + pointer.x;
            let y = BORDER_TOP + pointer.y;
            fill_rect(&mut self.framebuffer, x - 3, y, 7, 1, COLOR_CURSOR);
            fill_rect(&mut self.framebuffer, x, y - 3, 1, 7, COLOR_CURSOR);
        }
    }

    fn synthesize(&mut self, beeping: bool) {
        if !beeping {
            self.samples.fill(0);
            self.beep_phase = 0;
            return;
        }
        let half_period = CONSOLE_SAMPLE_RATE / BEEP_HZ / 2;
        for sample in &mut self.samples {
            let high = (self.beep_phase / half_period) % 2 == 0;
            *sample = if high { BEEP_AMPLITUDE } else { -BEEP_AMPLITUDE };
            self.beep_phase = self.beep_phase.wrapping_add(1);
        }
    }
}

impl ConsoleVm for DemoCart {
    fn tick(&mut self, input: &CanonicalInputSnapshot) -> VmFrame<'_> {
        self.frame = self.frame.wrapping_add(1);
        self.exit = input.keyboard().contains(ConsoleKey::Escape);
        self.draw(input);
        self.synthesize(input.gamepad(0).is_down(GamepadButton::A));
        VmFrame {
            framebuffer: &self.framebuffer,
            samples: &self.samples,
        }
    }

    fn touch_overlay_sheet(&self) -> Option<IndexedSheet<'_>> {
        Some(IndexedSheet {
            width: SHEET_WIDTH,
            height: SHEET_HEIGHT,
            pixels: &self.sheet,
            palette: &PALETTE,
        })
    }

    fn exit_requested(&self) -> bool {
        self.exit
    }

    fn focus_gained(&mut self) {
        self.frame = 0;
        info!("demo_cart_restarted");
    }
}

fn fill_rect(framebuffer: &mut [u8], x: i32, y: i32, width: i32, height: i32, color: usize) {
    let [r, g, b] = PALETTE[color];
    let full_height = CONTENT_HEIGHT + 2 * BORDER_TOP;
    for row in y.max(0)..(y + height).min(full_height) {
        for column in x.max(0)..(x + width).min(FULL_WIDTH) {
            let offset = (row * FULL_WIDTH + column) as usize * 4;
            if let Some(pixel) = framebuffer.get_mut(offset..offset + 4) {
                pixel.copy_from_slice(&[r, g, b, 255]);
            }
        }
    }
}

/// Sixteen 8x8 glyphs in a 4bpp sheet: the eight buttons released, then the
/// same eight pressed.
fn build_glyph_sheet() -> Vec<u8> {
    let mut sheet = vec![0; (SHEET_WIDTH * SHEET_HEIGHT / 2) as usize];
    for y in 0..SHEET_HEIGHT {
        for x in 0..SHEET_WIDTH {
            let glyph = (x / GLYPH) as usize;
            let color = glyph_pixel(glyph % 8, glyph >= 8, x % GLYPH, y);
            let index = (y * SHEET_WIDTH + x) as usize;
            let shift = if index % 2 == 0 { 0 } else { 4 };
            sheet[index / 2] |= color << shift;
        }
    }
    sheet
}

fn glyph_pixel(button: usize, pressed: bool, x: u32, y: u32) -> u8 {
    let edge = x == 0 || y == 0 || x == GLYPH - 1 || y == GLYPH - 1;
    let corner = (x == 0 || x == GLYPH - 1) && (y == 0 || y == GLYPH - 1);
    if corner {
        return 0;
    }
    if edge {
        return COLOR_OUTLINE as u8;
    }

    // 2x2 marker: towards the edge for directions, centred for face buttons.
    let (marker_x, marker_y) = match button {
        0 => (3, 1),
        1 => (3, 5),
        2 => (1, 3),
        3 => (5, 3),
        _ => (3, 3),
    };
    let in_marker = (marker_x..marker_x + 2).contains(&x) && (marker_y..marker_y + 2).contains(&y);
    match (in_marker, pressed) {
        (true, _) => COLOR_OUTLINE as u8,
        (false, true) => COLOR_PRESSED as u8,
        (false, false) => 0,
    }
}
