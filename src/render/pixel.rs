use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReframeError, ReframeResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// Straight-alpha RGBA8, 4 bytes per pixel.
    Rgba8,
    /// 4:2:0 bi-planar YCbCr, full range: Y plane followed by interleaved CbCr.
    #[default]
    Nv12FullRange,
}

impl PixelFormat {
    pub fn frame_byte_len(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            Self::Rgba8 => w * h * 4,
            Self::Nv12FullRange => w * h + (w / 2) * (h / 2) * 2,
        }
    }

    /// `-pix_fmt` name understood by ffmpeg's rawvideo demuxer.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Rgba8 => "rgba",
            Self::Nv12FullRange => "nv12",
        }
    }
}

/// Presentation timestamp of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PresentationTime {
    pub index: FrameIndex,
    pub secs: f64,
}

/// One decoded, composited frame. Moved from reader to pump to writer, never cloned on the way.
#[derive(Debug, PartialEq)]
pub struct PixelFrame {
    pub pts: PresentationTime,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelFrame {
    pub fn new(
        pts: PresentationTime,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> ReframeResult<Self> {
        let want = format.frame_byte_len(width, height);
        if data.len() != want {
            return Err(ReframeError::decode(format!(
                "{format:?} frame {width}x{height} expects {want} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            pts,
            format,
            width,
            height,
            data,
        })
    }
}

/// Flatten premultiplied RGBA8 over an opaque background, in place.
pub fn flatten_premul_over_bg(rgba_premul: &mut [u8], bg_rgba: [u8; 4]) -> ReframeResult<()> {
    if !rgba_premul.len().is_multiple_of(4) {
        return Err(ReframeError::decode(
            "flatten_premul_over_bg expects an rgba8 buffer",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for px in rgba_premul.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        let inv = 255u16 - a;
        px[0] = (u16::from(px[0]) + mul_div255(bg_r, inv)).min(255) as u8;
        px[1] = (u16::from(px[1]) + mul_div255(bg_g, inv)).min(255) as u8;
        px[2] = (u16::from(px[2]) + mul_div255(bg_b, inv)).min(255) as u8;
        px[3] = 255;
    }
    Ok(())
}

/// Convert opaque RGBA8 into NV12 (BT.601, full range). Chroma is the 2x2 box average.
pub fn rgba_to_nv12(rgba: &[u8], width: u32, height: u32, dst: &mut Vec<u8>) -> ReframeResult<()> {
    let (w, h) = (width as usize, height as usize);
    if !w.is_multiple_of(2) || !h.is_multiple_of(2) {
        return Err(ReframeError::decode("nv12 conversion needs even dimensions"));
    }
    if rgba.len() != w * h * 4 {
        return Err(ReframeError::decode(format!(
            "rgba buffer has {} bytes, expected {}",
            rgba.len(),
            w * h * 4
        )));
    }

    dst.clear();
    dst.resize(PixelFormat::Nv12FullRange.frame_byte_len(width, height), 0);
    let (y_plane, uv_plane) = dst.split_at_mut(w * h);

    for (y_px, px) in y_plane.iter_mut().zip(rgba.chunks_exact(4)) {
        let (r, g, b) = (i32::from(px[0]), i32::from(px[1]), i32::from(px[2]));
        *y_px = ((77 * r + 150 * g + 29 * b + 128) >> 8).clamp(0, 255) as u8;
    }

    for cy in 0..h / 2 {
        for cx in 0..w / 2 {
            let (mut r, mut g, mut b) = (0i32, 0i32, 0i32);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let off = ((cy * 2 + dy) * w + cx * 2 + dx) * 4;
                r += i32::from(rgba[off]);
                g += i32::from(rgba[off + 1]);
                b += i32::from(rgba[off + 2]);
            }
            let (r, g, b) = ((r + 2) / 4, (g + 2) / 4, (b + 2) / 4);
            let cb = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
            let cr = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;
            let off = (cy * (w / 2) + cx) * 2;
            uv_plane[off] = cb.clamp(0, 255) as u8;
            uv_plane[off + 1] = cr.clamp(0, 255) as u8;
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
#[path = "../../tests/unit/render/pixel.rs"]
mod tests;
