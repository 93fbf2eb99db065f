use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::{
    assets::media::{VideoAsset, VideoTrackDescriptor},
    composition::model::CompositionDescriptor,
    foundation::core::FrameIndex,
    foundation::error::{ReframeError, ReframeResult},
    render::compositor::Compositor,
    render::pixel::{PixelFormat, PixelFrame, PresentationTime},
};

/// Pull-style producer of composited frames.
///
/// `Ok(None)` is end of stream. A source that returned an error stays failed.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> ReframeResult<Option<PixelFrame>>;
    fn state(&self) -> ReaderState;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    Created,
    Reading,
    Completed,
    Failed,
}

#[derive(Clone, Debug)]
pub struct ReaderOpts {
    pub output_format: PixelFormat,
    /// Background for areas of the render surface not covered by the source.
    pub bg_rgba: [u8; 4],
}

impl Default for ReaderOpts {
    fn default() -> Self {
        Self {
            output_format: PixelFormat::Nv12FullRange,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Decodes the first video track through the system `ffmpeg` and composites each frame.
pub struct SourceReader {
    track: VideoTrackDescriptor,
    source_path: std::path::PathBuf,
    compositor: Compositor,
    state: ReaderState,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    next_index: u64,
}

impl SourceReader {
    /// Bind the reader to `asset`'s first video track. Decoding starts in [`Self::start_reading`].
    pub fn open(
        asset: &VideoAsset,
        composition: CompositionDescriptor,
        opts: ReaderOpts,
    ) -> ReframeResult<Self> {
        let track = asset.first_video_track()?.clone();
        let compositor = Compositor::new(composition, opts.output_format, opts.bg_rgba)?;
        Ok(Self {
            scratch: vec![0u8; track.frame_byte_len_rgba()],
            track,
            source_path: asset.source_path.clone(),
            compositor,
            state: ReaderState::Created,
            child: None,
            stdout: None,
            stderr_drain: None,
            next_index: 0,
        })
    }

    pub fn composition(&self) -> &CompositionDescriptor {
        self.compositor.composition()
    }

    pub fn start_reading(&mut self) -> ReframeResult<()> {
        if self.state != ReaderState::Created {
            return Err(ReframeError::decode(format!(
                "reader cannot start from state {:?}",
                self.state
            )));
        }

        // Orientation is part of the layer transform, so ffmpeg must not rotate on its own.
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(&self.source_path)
            .args([
                "-map",
                &format!("0:{}", self.track.stream_index),
                "-an",
                "-vsync",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ]);
        self.spawn_decoder(cmd)
    }

    /// Run `cmd` as the decoder. It must write tightly packed RGBA frames of the track's natural
    /// size to stdout.
    fn spawn_decoder(&mut self, mut cmd: Command) -> ReframeResult<()> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ReframeError::configuration(format!(
                "failed to spawn ffmpeg decoder (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ReframeError::configuration("failed to open ffmpeg stdout (unexpected)")
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ReframeError::configuration("failed to open ffmpeg stderr (unexpected)")
        })?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.child = Some(child);
        self.stdout = Some(stdout);
        self.stderr_drain = Some(stderr_drain);
        self.state = ReaderState::Reading;
        tracing::debug!(
            source = %self.source_path.display(),
            stream = self.track.stream_index,
            "decoder started"
        );
        Ok(())
    }

    /// Fill `scratch` with one raw frame. `Ok(false)` means a clean end of stream.
    fn read_raw_frame(&mut self) -> ReframeResult<bool> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| ReframeError::decode("decoder output is closed"))?;

        let filled = fill_frame(stdout, &mut self.scratch)
            .map_err(|e| ReframeError::decode(format!("failed to read decoded frame: {e}")))?;

        if filled == 0 {
            return Ok(false);
        }
        if filled < self.scratch.len() {
            return Err(ReframeError::decode(format!(
                "truncated frame {}: got {filled} of {} bytes",
                self.next_index,
                self.scratch.len()
            )));
        }
        Ok(true)
    }

    /// Reap the decoder process; a non-zero exit is a decode error.
    fn reap(&mut self) -> ReframeResult<()> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| ReframeError::decode(format!("failed to wait for ffmpeg decoder: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReframeError::decode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReframeError::decode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(ReframeError::decode(format!(
                "ffmpeg decoder exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }

    fn fail(&mut self, err: ReframeError) -> ReframeError {
        self.state = ReaderState::Failed;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.stdout = None;
        err
    }
}

impl FrameSource for SourceReader {
    fn next_frame(&mut self) -> ReframeResult<Option<PixelFrame>> {
        match self.state {
            ReaderState::Created => {
                return Err(ReframeError::decode("reader has not been started"));
            }
            ReaderState::Completed => return Ok(None),
            ReaderState::Failed => return Err(ReframeError::decode("reader has already failed")),
            ReaderState::Reading => {}
        }

        match self.read_raw_frame() {
            Ok(true) => {}
            Ok(false) => {
                return match self.reap() {
                    Ok(()) => {
                        self.state = ReaderState::Completed;
                        tracing::debug!(
                            frames = self.next_index,
                            expected = ?self.track.frame_count,
                            "decoder reached end of stream"
                        );
                        Ok(None)
                    }
                    Err(e) => Err(self.fail(e)),
                };
            }
            Err(e) => {
                // Prefer the decoder's own diagnostic when the process failed.
                let err = self.reap().err().unwrap_or(e);
                return Err(self.fail(err));
            }
        }

        let index = FrameIndex(self.next_index);
        let secs = self.track.fps.frames_to_secs(index.0);
        let render = self.compositor.composition().render_size;
        let mut data = Vec::new();
        if let Err(e) = self.compositor.compose_rgba8(
            &self.scratch,
            self.track.width,
            self.track.height,
            secs,
            &mut data,
        ) {
            return Err(self.fail(e));
        }
        self.next_index += 1;

        let frame = PixelFrame::new(
            PresentationTime { index, secs },
            self.compositor.output_format(),
            render.width,
            render.height,
            data,
        );
        frame.map(Some).map_err(|e| self.fail(e))
    }

    fn state(&self) -> ReaderState {
        self.state
    }
}

/// Read until `buf` is full or the stream ends. Returns the number of bytes filled.
fn fill_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Drop for SourceReader {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/reader.rs"]
mod tests;
