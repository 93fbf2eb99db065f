/// Frame sources (system `ffmpeg` decoder).
pub mod reader;
