//! Per-frame compositing on the CPU.
//!
//! Decoded source frames are drawn through the layer transform onto the render surface, flattened
//! over the background, and converted to the encoder's pixel format.

/// `vello_cpu` compositor.
pub mod compositor;
/// Pixel buffers and color conversion.
pub mod pixel;
