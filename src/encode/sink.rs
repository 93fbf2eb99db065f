use std::path::PathBuf;

use crate::foundation::core::{Fps, RenderSize};
use crate::foundation::error::{ReframeError, ReframeResult};
use crate::render::pixel::{PixelFormat, PixelFrame};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VideoCodec {
    #[default]
    H264,
}

impl VideoCodec {
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
        }
    }
}

/// Fixed encoder settings for one output file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputSettings {
    pub codec: VideoCodec,
    pub size: RenderSize,
    pub fps: Fps,
    /// Pixel format of appended frames.
    pub input_format: PixelFormat,
}

impl OutputSettings {
    pub fn validate(&self) -> ReframeResult<()> {
        self.size.validate()
    }

    /// Appended frames must match the configured geometry and format exactly.
    pub fn check_frame(&self, frame: &PixelFrame) -> ReframeResult<()> {
        if frame.width != self.size.width || frame.height != self.size.height {
            return Err(ReframeError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.size.width, self.size.height
            )));
        }
        if frame.format != self.input_format {
            return Err(ReframeError::encode(format!(
                "frame format mismatch: got {:?}, expected {:?}",
                frame.format, self.input_format
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    Created,
    Writing,
    Finalizing,
    Finalized,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinishedOutput {
    pub path: PathBuf,
    pub frames_written: u64,
}

/// Completion callback for [`FrameSink::finish`]. May run on any thread.
pub type FinishCallback = Box<dyn FnOnce(ReframeResult<FinishedOutput>) + Send + 'static>;

/// Readiness-gated consumer of frames.
///
/// Ordering contract: frames are appended in strictly increasing presentation order. Calling
/// `append` while not ready, or after `mark_finished`, is a caller error.
pub trait FrameSink: Send {
    fn state(&self) -> WriterState;
    fn is_ready(&self) -> bool;
    /// Block until `is_ready` holds. Returns an error once the sink can no longer accept frames.
    fn wait_ready(&self) -> ReframeResult<()>;
    fn append(&mut self, frame: PixelFrame) -> ReframeResult<()>;
    /// Signal that no more frames will be appended.
    fn mark_finished(&mut self);
    /// Finalize the output. `on_complete` fires exactly once with the outcome.
    fn finish(&mut self, on_complete: FinishCallback);
}

/// In-memory sink for tests and debugging.
#[derive(Debug)]
pub struct InMemorySink {
    path: PathBuf,
    settings: Option<OutputSettings>,
    state: WriterState,
    input_finished: bool,
    finalize_error: Option<String>,
    /// Frames in append order.
    pub(crate) frames: Vec<PixelFrame>,
}

impl InMemorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: None,
            state: WriterState::Writing,
            input_finished: false,
            finalize_error: None,
            frames: Vec::new(),
        }
    }

    /// Validate appended frames against `settings`.
    pub fn with_settings(mut self, settings: OutputSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Make `finish` report an encode error with `msg`.
    pub fn failing_finalize(mut self, msg: impl Into<String>) -> Self {
        self.finalize_error = Some(msg.into());
        self
    }

    pub fn frames(&self) -> &[PixelFrame] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn state(&self) -> WriterState {
        self.state
    }

    fn is_ready(&self) -> bool {
        self.state == WriterState::Writing && !self.input_finished
    }

    fn wait_ready(&self) -> ReframeResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ReframeError::encode("in-memory sink is not accepting frames"))
        }
    }

    fn append(&mut self, frame: PixelFrame) -> ReframeResult<()> {
        if !self.is_ready() {
            return Err(ReframeError::encode("append called while sink is not ready"));
        }
        if let Some(settings) = &self.settings {
            settings.check_frame(&frame)?;
        }
        if let Some(last) = self.frames.last()
            && frame.pts.index <= last.pts.index
        {
            return Err(ReframeError::encode("sink received out-of-order frame"));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn mark_finished(&mut self) {
        self.input_finished = true;
    }

    fn finish(&mut self, on_complete: FinishCallback) {
        self.input_finished = true;
        self.state = WriterState::Finalizing;
        let result = match self.finalize_error.take() {
            Some(msg) => {
                self.state = WriterState::Failed;
                Err(ReframeError::encode(msg))
            }
            None => {
                self.state = WriterState::Finalized;
                Ok(FinishedOutput {
                    path: self.path.clone(),
                    frames_written: self.frames.len() as u64,
                })
            }
        };
        on_complete(result);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
