use thiserror::Error;
use tracing::{info, warn};

use crate::app::host::{HostBackend, ProgramId, ShaderStage, ShaderStageId};

use super::geometry::{GeometryRect, Viewport};

pub const DEFAULT_VERTEX_SHADER: &str = include_str!("shaders/fullscreen.wgsl");
pub const DEFAULT_CRT_SHADER: &str = include_str!("shaders/crt.wgsl");

pub const UNIFORM_TARGET_X: &str = "trg_x";
pub const UNIFORM_TARGET_Y: &str = "trg_y";
pub const UNIFORM_TARGET_WIDTH: &str = "trg_w";
pub const UNIFORM_TARGET_HEIGHT: &str = "trg_h";
pub const UNIFORM_SCREEN_WIDTH: &str = "scr_w";
pub const UNIFORM_SCREEN_HEIGHT: &str = "scr_h";

pub(crate) const SHADER_WARNING_TITLE: &str = "CRT shader error";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShaderLoadError {
    #[error("{stage} shader failed to compile:\n{diagnostic}")]
    Compile {
        stage: &'static str,
        diagnostic: String,
    },
    #[error("shader program failed to link:\n{0}")]
    Link(String),
}

/// Owns at most one live shader program. A failed reload leaves the current
/// program untouched.
#[derive(Debug)]
pub struct PostProcessPipeline {
    vertex_source: String,
    program: Option<ProgramId>,
}

impl Default for PostProcessPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PostProcessPipeline {
    pub fn new() -> Self {
        Self::with_vertex_source(DEFAULT_VERTEX_SHADER)
    }

    pub fn with_vertex_source(source: impl Into<String>) -> Self {
        Self {
            vertex_source: source.into(),
            program: None,
        }
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn is_active(&self) -> bool {
        self.program.is_some()
    }

    /// Compiles and links a new program. On failure the user sees one
    /// warning carrying the backend diagnostic.
    pub fn reload<H: HostBackend>(
        &mut self,
        host: &mut H,
        fragment_source: &str,
    ) -> Result<ProgramId, ShaderLoadError> {
        match self.build(host, fragment_source) {
            Ok(program) => {
                if let Some(previous) = self.program.replace(program) {
                    host.release_program(previous);
                }
                info!(program = program.0, "shader_loaded");
                Ok(program)
            }
            Err(error) => {
                match &error {
                    ShaderLoadError::Compile { stage, diagnostic } => {
                        warn!(stage, diagnostic = diagnostic.as_str(), "shader_compile_failed");
                    }
                    ShaderLoadError::Link(diagnostic) => {
                        warn!(diagnostic = diagnostic.as_str(), "shader_link_failed");
                    }
                }
                host.show_warning(SHADER_WARNING_TITLE, &error.to_string());
                Err(error)
            }
        }
    }

    fn build<H: HostBackend>(
        &self,
        host: &mut H,
        fragment_source: &str,
    ) -> Result<ProgramId, ShaderLoadError> {
        let vertex = compile(host, ShaderStage::Vertex, &self.vertex_source)?;
        let fragment = match compile(host, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(error) => {
                host.release_shader(vertex);
                return Err(error);
            }
        };
        host.link_program(vertex, fragment)
            .map_err(ShaderLoadError::Link)
    }

    /// Pushes the per-frame geometry uniforms. Returns false when no program
    /// is active.
    pub fn apply_uniforms<H: HostBackend>(
        &self,
        host: &mut H,
        rect: GeometryRect,
        viewport: Viewport,
    ) -> bool {
        let Some(program) = self.program else {
            return false;
        };

        host.set_uniform(program, UNIFORM_TARGET_X, rect.x as f32);
        host.set_uniform(program, UNIFORM_TARGET_Y, rect.y as f32);
        host.set_uniform(program, UNIFORM_TARGET_WIDTH, rect.width as f32);
        host.set_uniform(program, UNIFORM_TARGET_HEIGHT, rect.height as f32);
        host.set_uniform(program, UNIFORM_SCREEN_WIDTH, viewport.width as f32);
        host.set_uniform(program, UNIFORM_SCREEN_HEIGHT, viewport.height as f32);
        true
    }

    pub fn release<H: HostBackend>(&mut self, host: &mut H) {
        if let Some(program) = self.program.take() {
            host.release_program(program);
        }
    }
}

fn compile<H: HostBackend>(
    host: &mut H,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderStageId, ShaderLoadError> {
    host.compile_shader(stage, source)
        .map_err(|diagnostic| ShaderLoadError::Compile {
            stage: stage.label(),
            diagnostic,
        })
}
