mod fusion;
mod host;
mod input;
mod keymap;
mod loop_runner;
mod metrics;
mod perf_stats;
mod rendering;
mod touch;

#[cfg(test)]
mod test_support;

pub use fusion::{
    axis_hat_bits, hat, hat_to_mask, read_controller, ControllerReading, InputFusionEngine,
    AXIS_THRESHOLD,
};
pub use host::{
    Clock, ConsoleVm, HostBackend, HostError, HostEvent, IndexedSheet, JoystickId, JoystickState,
    ProgramId, RawPointer, ShaderStage, ShaderStageId, SystemClock, TextureSlot, TouchDevice,
    TouchFinger, VmFrame,
};
pub use input::{
    CanonicalInputSnapshot, ConsoleKey, GamepadButton, GamepadMask, GamepadSet, KeyBuffer,
    PointerButtons, PointerState, GAMEPAD_COUNT, INPUT_REGION_SIZE, KEY_BUFFER_CAPACITY,
};
pub use keymap::{console_key_for_scancode, keyboard_buffer, scancode, KeyboardState, SCANCODE_COUNT};
pub use loop_runner::{
    FramePacer, FrameScheduler, FrontendError, IterationOutcome, LoopConfig, PacingDecision,
    StopHandle, SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use perf_stats::{PhaseTimings, RollingMsStats};
pub use rendering::{
    border_blits, compute_geometry, full_frame_source, pointer_to_logical, BlitRect, BorderBlit,
    DisplayCompositor, DisplayMode, GeometryRect, PostProcessPipeline, ShaderLoadError, Viewport,
    BORDER_LEFT, BORDER_TOP, CONTENT_HEIGHT, CONTENT_WIDTH, DEFAULT_CRT_SHADER,
    DEFAULT_VERTEX_SHADER, FRAMEBUFFER_BYTES, FULL_HEIGHT, FULL_WIDTH, UNIFORM_SCREEN_HEIGHT,
    UNIFORM_SCREEN_WIDTH, UNIFORM_TARGET_HEIGHT, UNIFORM_TARGET_WIDTH, UNIFORM_TARGET_X,
    UNIFORM_TARGET_Y,
};
pub use touch::{
    scan_touches, FadeTimer, TouchLayout, TouchOverlayRenderer, TouchScan, FADE_STEP, GLYPH_SIZE,
    HIDE_AFTER_SECONDS,
};
