pub mod app;
pub mod config;

pub use app::{
    compute_geometry, pointer_to_logical, BlitRect, CanonicalInputSnapshot, Clock, ConsoleKey,
    ConsoleVm, DisplayMode, FrameScheduler, FrontendError, GamepadButton, GamepadMask,
    GeometryRect, HostBackend, HostError, HostEvent, IndexedSheet, IterationOutcome, JoystickId,
    JoystickState, KeyboardState, LoopConfig, LoopMetricsSnapshot, MetricsHandle, PacingDecision,
    PointerButtons, ProgramId, RawPointer, ShaderStage, ShaderStageId, StopHandle, SystemClock,
    TextureSlot, TouchDevice, TouchFinger, Viewport, VmFrame, FULL_HEIGHT, FULL_WIDTH,
    SLOW_FRAME_ENV_VAR,
};
pub use config::{
    load_options, resolve_options, ConfigError, FrontendOptions, CONFIG_ENV_VAR,
    DEFAULT_TOUCH_OVERLAY_ALPHA, MAX_VOLUME,
};
