/// Source media probing via `ffprobe`.
pub mod media;
