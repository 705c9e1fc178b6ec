use tracing::{debug, info};

use crate::app::host::{HostBackend, TextureSlot};

use super::geometry::{
    border_blits, compute_geometry, full_frame_source, DisplayMode, GeometryRect, Viewport,
    FULL_HEIGHT, FULL_WIDTH,
};
use super::postprocess::PostProcessPipeline;

pub const FRAMEBUFFER_BYTES: usize = FULL_WIDTH as usize * FULL_HEIGHT as usize * 4;

/// Places the bordered framebuffer on the output surface. Geometry is cached
/// until the window size or the display mode changes.
#[derive(Debug)]
pub struct DisplayCompositor {
    viewport: Viewport,
    crt_requested: bool,
    cached: Option<(DisplayMode, GeometryRect)>,
}

impl DisplayCompositor {
    pub fn new(viewport: Viewport, crt_requested: bool) -> Self {
        Self {
            viewport,
            crt_requested,
            cached: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.cached = None;
        info!(width = viewport.width, height = viewport.height, "window_resized");
    }

    pub fn crt_requested(&self) -> bool {
        self.crt_requested
    }

    pub fn set_crt_requested(&mut self, enabled: bool) {
        if enabled != self.crt_requested {
            self.crt_requested = enabled;
            self.cached = None;
        }
    }

    /// CRT output needs both the user flag and a live shader program.
    pub fn mode(&self, program_active: bool) -> DisplayMode {
        if self.crt_requested && program_active {
            DisplayMode::Crt
        } else {
            DisplayMode::Plain
        }
    }

    pub fn geometry(&mut self, mode: DisplayMode) -> GeometryRect {
        match self.cached {
            Some((cached_mode, rect)) if cached_mode == mode => rect,
            _ => {
                let rect = compute_geometry(self.viewport, mode);
                debug!(?mode, x = rect.x, y = rect.y, width = rect.width, height = rect.height, "geometry_updated");
                self.cached = Some((mode, rect));
                rect
            }
        }
    }

    /// Clears the surface, uploads the framebuffer and draws it either through
    /// the post-process program or as plain border blits.
    pub fn compose<H: HostBackend>(
        &mut self,
        host: &mut H,
        framebuffer: &[u8],
        pipeline: &PostProcessPipeline,
        mode: DisplayMode,
    ) {
        host.clear();
        match framebuffer.get(..FRAMEBUFFER_BYTES) {
            Some(pixels) => {
                host.upload_texture(
                    TextureSlot::Framebuffer,
                    FULL_WIDTH as u32,
                    FULL_HEIGHT as u32,
                    pixels,
                );
            }
            None => debug!(
                expected = FRAMEBUFFER_BYTES,
                actual = framebuffer.len(),
                "framebuffer_size_mismatch"
            ),
        }

        let rect = self.geometry(mode);
        match pipeline.program().filter(|_| mode == DisplayMode::Crt) {
            Some(program) => {
                host.activate_program(Some(program));
                pipeline.apply_uniforms(host, rect, self.viewport);
                host.blit(TextureSlot::Framebuffer, full_frame_source(), rect);
            }
            None => {
                host.activate_program(None);
                for blit in border_blits(rect, self.viewport) {
                    host.blit(TextureSlot::Framebuffer, blit.src, blit.dst);
                }
            }
        }
    }
}
