//! Encoding sinks.
//!
//! Sinks consume composited frames in presentation order, gated by readiness.

/// `ffmpeg`-based writer (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Generic frame sink trait and the in-memory sink.
pub mod sink;
