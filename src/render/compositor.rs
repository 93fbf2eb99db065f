use std::sync::Arc;

use crate::{
    composition::model::CompositionDescriptor,
    foundation::core::Affine,
    foundation::error::{ReframeError, ReframeResult},
    render::pixel::{PixelFormat, flatten_premul_over_bg, rgba_to_nv12},
};

/// Applies a [`CompositionDescriptor`] to decoded frames on the CPU.
///
/// The decoded frame is painted as an image in its natural pixel space under the active layer
/// transform, rasterized at render size, flattened over `bg_rgba`, then converted to the output
/// pixel format.
pub struct Compositor {
    composition: CompositionDescriptor,
    width: u16,
    height: u16,
    bg_rgba: [u8; 4],
    output_format: PixelFormat,
}

impl Compositor {
    pub fn new(
        composition: CompositionDescriptor,
        output_format: PixelFormat,
        bg_rgba: [u8; 4],
    ) -> ReframeResult<Self> {
        composition.validate()?;
        let width: u16 = composition
            .render_size
            .width
            .try_into()
            .map_err(|_| ReframeError::configuration("render width exceeds u16"))?;
        let height: u16 = composition
            .render_size
            .height
            .try_into()
            .map_err(|_| ReframeError::configuration("render height exceeds u16"))?;
        Ok(Self {
            composition,
            width,
            height,
            bg_rgba,
            output_format,
        })
    }

    pub fn composition(&self) -> &CompositionDescriptor {
        &self.composition
    }

    pub fn output_format(&self) -> PixelFormat {
        self.output_format
    }

    /// Compose one straight-alpha RGBA8 source frame shown at `time_sec`.
    ///
    /// Writes the output frame into `dst`, replacing its contents.
    pub fn compose_rgba8(
        &self,
        src_rgba: &[u8],
        src_width: u32,
        src_height: u32,
        time_sec: f64,
        dst: &mut Vec<u8>,
    ) -> ReframeResult<()> {
        let transform = self.composition.layer_transform_at(time_sec).ok_or_else(|| {
            ReframeError::decode(format!("no composition layer active at {time_sec:.3}s"))
        })?;

        let image = source_image(src_rgba, src_width, src_height)?;

        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(transform));
        ctx.set_paint(image);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(src_width),
            f64::from(src_height),
        ));
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        let mut rgba = pixmap.data_as_u8_slice().to_vec();
        flatten_premul_over_bg(&mut rgba, self.bg_rgba)?;

        match self.output_format {
            PixelFormat::Rgba8 => {
                dst.clear();
                dst.extend_from_slice(&rgba);
            }
            PixelFormat::Nv12FullRange => rgba_to_nv12(
                &rgba,
                u32::from(self.width),
                u32::from(self.height),
                dst,
            )?,
        }
        Ok(())
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn source_image(rgba: &[u8], width: u32, height: u32) -> ReframeResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ReframeError::decode("source frame width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ReframeError::decode("source frame height exceeds u16"))?;
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(ReframeError::decode("source frame byte length mismatch"));
    }

    // Decoder output is straight alpha; premultiply for the rasterizer.
    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: premul(px[0], a),
            g: premul(px[1], a),
            b: premul(px[2], a),
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn premul(c: u8, a: u8) -> u8 {
    if a == 255 {
        return c;
    }
    (((u16::from(c) * u16::from(a)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
