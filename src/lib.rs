//! Reframe crops a portrait video to a narrower window and re-encodes it at a fixed render size.
//!
//! A job is driven by a [`Reframer`]:
//!
//! - Probe the configured source and build a [`CompositionDescriptor`] from the crop
//! - Decode, composite and encode frames on a background media thread
//! - Deliver the outcome to a [`PlaybackSurface`] on the thread that owns the controller
//!
//! `ffmpeg` and `ffprobe` must be installed and on `PATH`.
#![forbid(unsafe_code)]

/// Source media probing.
pub mod assets;
/// Composition model built per job.
pub mod composition;
/// Frame decoding.
pub mod decode;
/// Encoding sinks.
pub mod encode;
mod foundation;
/// Per-frame compositing.
pub mod render;
/// Job control and the drain loop.
pub mod session;
/// Layer transform math.
pub mod transform;

pub use crate::foundation::core::{
    Affine, CropRect, Fps, FrameIndex, Point, Rect, RenderSize, Size, TimeRange, Vec2,
};
pub use crate::foundation::error::{ReframeError, ReframeResult};

pub use crate::assets::media::{VideoAsset, VideoTrackDescriptor, probe_asset};
pub use crate::composition::model::{CompositionDescriptor, build_composition};
pub use crate::decode::reader::{FrameSource, ReaderOpts, ReaderState, SourceReader};
pub use crate::encode::ffmpeg::FfmpegWriter;
pub use crate::encode::sink::{
    FinishedOutput, FrameSink, InMemorySink, OutputSettings, VideoCodec, WriterState,
};
pub use crate::render::pixel::{PixelFormat, PixelFrame, PresentationTime};
pub use crate::session::job::{
    JobEvent, JobHandle, JobId, PlaybackSurface, ReframeConfig, Reframer,
};
pub use crate::session::pump::{JobReport, PumpReport, pump};
pub use crate::transform::affine::{Orientation, compute_layer_transform};
