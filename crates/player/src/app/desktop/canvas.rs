use frontend::BlitRect;

pub(crate) const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];

/// CPU-side copy of an uploaded texture plus its blend alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CpuTexture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rgba: Vec<u8>,
    pub(crate) alpha: u8,
}

impl CpuTexture {
    pub(crate) fn new(width: u32, height: u32, rgba: &[u8]) -> Self {
        Self {
            width,
            height,
            rgba: rgba.to_vec(),
            alpha: u8::MAX,
        }
    }

    /// Replaces the pixels, keeping the current blend alpha.
    pub(crate) fn replace(&mut self, width: u32, height: u32, rgba: &[u8]) {
        self.width = width;
        self.height = height;
        self.rgba.clear();
        self.rgba.extend_from_slice(rgba);
    }

    fn texel(&self, x: i32, y: i32) -> Option<&[u8]> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(offset..offset + 4)
    }
}

pub(crate) fn clear(frame: &mut [u8], color: [u8; 4]) {
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

/// Nearest-neighbour scaled copy of `src` (texture pixels) into `dst` (frame
/// pixels). Destination pixels outside the frame and source texels outside
/// the texture are skipped.
pub(crate) fn blit(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    texture: &CpuTexture,
    src: BlitRect,
    dst: BlitRect,
) {
    if src.width <= 0 || src.height <= 0 || dst.width <= 0 || dst.height <= 0 {
        return;
    }

    let x_start = dst.x.max(0);
    let x_end = dst.x.saturating_add(dst.width).min(frame_width as i32);
    let y_start = dst.y.max(0);
    let y_end = dst.y.saturating_add(dst.height).min(frame_height as i32);

    for y in y_start..y_end {
        let source_y = src.y + scale_offset(y - dst.y, src.height, dst.height);
        let row = y as usize * frame_width as usize;
        for x in x_start..x_end {
            let source_x = src.x + scale_offset(x - dst.x, src.width, dst.width);
            let Some(texel) = texture.texel(source_x, source_y) else {
                continue;
            };
            let offset = (row + x as usize) * 4;
            if let Some(target) = frame.get_mut(offset..offset + 4) {
                blend(target, texel, texture.alpha);
            }
        }
    }
}

fn scale_offset(offset: i32, source_len: i32, target_len: i32) -> i32 {
    (i64::from(offset) * i64::from(source_len) / i64::from(target_len)) as i32
}

fn blend(target: &mut [u8], source: &[u8], alpha: u8) {
    let coverage = u32::from(source[3]) * u32::from(alpha) / 255;
    match coverage {
        0 => {}
        255 => {
            target[..3].copy_from_slice(&source[..3]);
            target[3] = 255;
        }
        _ => {
            for channel in 0..3 {
                let over = u32::from(source[channel]) * coverage;
                let under = u32::from(target[channel]) * (255 - coverage);
                target[channel] = ((over + under) / 255) as u8;
            }
            target[3] = 255;
        }
    }
}
