//! Layer transform computation.
//!
//! The layer transform maps a decoded frame, in its natural (unrotated) pixel space, onto the
//! render surface. It is built from four steps applied in order:
//!
//! 1. the track's intrinsic orientation,
//! 2. a translation moving the oriented frame's top-left corner to the origin,
//! 3. a translation moving the crop rectangle's origin to the origin,
//! 4. a non-uniform scale from crop size to render size.

use crate::foundation::core::{Affine, CropRect, Rect, RenderSize, Size, Vec2};

/// Intrinsic orientation stored in container metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Orientation {
    /// Clockwise display rotation, one of 0, 90, 180, 270.
    pub rotation_cw: u16,
    /// Horizontal flip applied before the rotation.
    pub mirrored: bool,
}

impl Orientation {
    pub const UP: Self = Self {
        rotation_cw: 0,
        mirrored: false,
    };

    /// Snap arbitrary clockwise degrees to the nearest quarter turn.
    pub fn from_rotation_degrees(degrees_cw: f64, mirrored: bool) -> Self {
        let quarter = if degrees_cw.is_finite() {
            (degrees_cw / 90.0).round() as i64
        } else {
            0
        };
        let rotation_cw = (quarter.rem_euclid(4) * 90) as u16;
        Self {
            rotation_cw,
            mirrored,
        }
    }

    /// Orientation as a transform in y-down pixel space.
    ///
    /// Only the linear part is meaningful; the translation is normalized away by
    /// [`compute_layer_transform`].
    pub fn to_affine(self) -> Affine {
        let flip = if self.mirrored {
            Affine::FLIP_X
        } else {
            Affine::IDENTITY
        };
        let rotate = match self.rotation_cw {
            90 => Affine::new([0.0, 1.0, -1.0, 0.0, 0.0, 0.0]),
            180 => Affine::new([-1.0, 0.0, 0.0, -1.0, 0.0, 0.0]),
            270 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, 0.0]),
            _ => Affine::IDENTITY,
        };
        rotate * flip
    }

    pub fn swaps_axes(self) -> bool {
        self.rotation_cw == 90 || self.rotation_cw == 270
    }
}

/// Bounding box of the natural frame rectangle after applying `orientation`.
pub fn oriented_bounds(natural_size: Size, orientation: Affine) -> Rect {
    orientation.transform_rect_bbox(Rect::from_origin_size((0.0, 0.0), natural_size))
}

/// Compute the single layer transform for a crop/scale job.
///
/// `crop` is expressed in the oriented source space (after rotation, top-left at the origin).
/// `CropRect` guarantees a positive width and height, so the scale factors are finite.
pub fn compute_layer_transform(
    natural_size: Size,
    orientation: Affine,
    crop: CropRect,
    render_size: RenderSize,
) -> Affine {
    let bounds = oriented_bounds(natural_size, orientation);
    let to_origin = Affine::translate(Vec2::new(-bounds.x0, -bounds.y0));
    let to_crop = Affine::translate(-crop.origin().to_vec2());
    let render = render_size.as_size();
    let scale = Affine::scale_non_uniform(render.width / crop.width(), render.height / crop.height());

    // Later steps post-multiply: kurbo applies the right-most factor first.
    scale * to_crop * to_origin * orientation
}

#[cfg(test)]
#[path = "../../tests/unit/transform/affine.rs"]
mod tests;
