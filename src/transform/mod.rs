/// Orientation and crop-to-render affine math.
pub mod affine;
