mod compositor;
mod geometry;
mod postprocess;

pub use compositor::{DisplayCompositor, FRAMEBUFFER_BYTES};
pub use geometry::{
    border_blits, compute_geometry, full_frame_source, pointer_to_logical, BlitRect, BorderBlit,
    DisplayMode, GeometryRect, Viewport, BORDER_LEFT, BORDER_TOP, CONTENT_HEIGHT, CONTENT_WIDTH,
    FULL_HEIGHT, FULL_WIDTH,
};
pub(crate) use postprocess::SHADER_WARNING_TITLE;
pub use postprocess::{
    PostProcessPipeline, ShaderLoadError, DEFAULT_CRT_SHADER, DEFAULT_VERTEX_SHADER,
    UNIFORM_SCREEN_HEIGHT, UNIFORM_SCREEN_WIDTH, UNIFORM_TARGET_HEIGHT, UNIFORM_TARGET_WIDTH,
    UNIFORM_TARGET_X, UNIFORM_TARGET_Y,
};
