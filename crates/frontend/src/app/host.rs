use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::input::{CanonicalInputSnapshot, PointerButtons};
use super::keymap::KeyboardState;
use super::rendering::{BlitRect, Viewport};

/// Host-assigned handle of an opened joystick.
pub type JoystickId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderStageId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn label(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Framebuffer,
    TouchOverlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Quit,
    Resized(Viewport),
    FocusGained,
    MouseWheel { x: i32, y: i32 },
    JoystickAdded { device_index: usize },
    JoystickRemoved { device_index: usize },
}

/// Raw pointer position in window pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPointer {
    pub x: i32,
    pub y: i32,
    pub buttons: PointerButtons,
}

/// One finger in normalized device coordinates (0.0..=1.0 on both axes).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchFinger {
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchDevice {
    pub fingers: Vec<TouchFinger>,
}

/// Per-tick reading of one joystick. Buffers are reused between reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoystickState {
    pub axes: Vec<i16>,
    pub hats: Vec<u8>,
    pub buttons: Vec<bool>,
}

impl JoystickState {
    pub fn clear(&mut self) {
        self.axes.clear();
        self.hats.clear();
        self.buttons.clear();
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to present frame: {0}")]
    Present(String),
}

/// Platform capabilities the frame loop drives. Exactly one implementation is
/// chosen at startup; every call happens on the loop thread between or inside
/// ticks, never concurrently.
pub trait HostBackend {
    fn poll_event(&mut self) -> Option<HostEvent>;
    fn viewport(&self) -> Viewport;

    fn keyboard(&self) -> &KeyboardState;
    fn pointer(&self) -> RawPointer;
    fn touch_devices(&self) -> &[TouchDevice];

    fn open_joystick(&mut self, device_index: usize) -> Option<JoystickId>;
    fn close_joystick(&mut self, joystick: JoystickId);
    /// Returns false when the joystick is no longer attached.
    fn read_joystick(&mut self, joystick: JoystickId, state: &mut JoystickState) -> bool;

    fn clear(&mut self);
    fn upload_texture(&mut self, slot: TextureSlot, width: u32, height: u32, rgba: &[u8]);
    fn set_texture_alpha(&mut self, slot: TextureSlot, alpha: u8);
    fn blit(&mut self, slot: TextureSlot, src: BlitRect, dst: BlitRect);

    fn compile_shader(&mut self, stage: ShaderStage, source: &str)
        -> Result<ShaderStageId, String>;
    /// Consumes both stages whether or not linking succeeds.
    fn link_program(
        &mut self,
        vertex: ShaderStageId,
        fragment: ShaderStageId,
    ) -> Result<ProgramId, String>;
    fn release_shader(&mut self, stage: ShaderStageId);
    fn release_program(&mut self, program: ProgramId);
    fn activate_program(&mut self, program: Option<ProgramId>);
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: f32);

    fn present(&mut self) -> Result<(), HostError>;
    fn queue_audio(&mut self, samples: &[i16]);

    fn set_fullscreen(&mut self, fullscreen: bool);
    fn is_fullscreen(&self) -> bool;
    fn show_warning(&mut self, title: &str, message: &str);
}

/// Indexed 4bpp tile sheet plus its 16-color palette. Pixels are packed two
/// per byte, low nibble first, `width` pixels per row.
#[derive(Debug, Clone, Copy)]
pub struct IndexedSheet<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
    pub palette: &'a [[u8; 3]; 16],
}

/// Output of one VM tick: a bordered RGBA framebuffer and this tick's mono
/// 16-bit audio block.
#[derive(Debug, Clone, Copy)]
pub struct VmFrame<'a> {
    pub framebuffer: &'a [u8],
    pub samples: &'a [i16],
}

pub trait ConsoleVm {
    fn tick(&mut self, input: &CanonicalInputSnapshot) -> VmFrame<'_>;

    fn touch_overlay_sheet(&self) -> Option<IndexedSheet<'_>> {
        None
    }

    fn exit_requested(&self) -> bool {
        false
    }

    fn focus_gained(&mut self) {}
}

/// Monotonic performance counter.
pub trait Clock {
    fn counter(&self) -> u64;
    fn frequency(&self) -> u64;
    fn sleep(&mut self, ticks: u64);

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let frequency = u128::from(self.frequency().max(1));
        Duration::from_nanos((u128::from(ticks) * 1_000_000_000 / frequency) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    const NANOS_PER_SECOND: u64 = 1_000_000_000;

    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn counter(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        Self::NANOS_PER_SECOND
    }

    fn sleep(&mut self, ticks: u64) {
        if ticks > 0 {
            thread::sleep(Duration::from_nanos(ticks));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.counter();
        let second = clock.counter();

        assert!(second >= first);
        assert_eq!(clock.frequency(), 1_000_000_000);
    }

    #[test]
    fn ticks_convert_to_duration_using_frequency() {
        let clock = SystemClock::new();

        assert_eq!(
            clock.ticks_to_duration(16_000_000),
            Duration::from_millis(16)
        );
    }
}
