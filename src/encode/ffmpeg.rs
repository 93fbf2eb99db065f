use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, mpsc};
use std::thread::JoinHandle;

use crate::encode::sink::{FinishCallback, FinishedOutput, FrameSink, OutputSettings, WriterState};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReframeError, ReframeResult};
use crate::render::pixel::{PixelFormat, PixelFrame};

/// Default number of frames that may be queued for the encoder before `is_ready` turns false.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

struct GateState {
    writer: WriterState,
    in_flight: usize,
    frames_written: u64,
    failure: Option<String>,
}

/// Readiness shared between the writer handle, the stdin feeder and the finalizer.
struct ReadyGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl ReadyGate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        // A poisoned gate only means a helper thread panicked; the counters stay usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// MP4 writer that spawns the system `ffmpeg` and streams raw frames to its stdin.
///
/// Frames are handed to a feeder thread; at most `queue_depth` frames are in flight. The
/// completion callback of [`FrameSink::finish`] runs on a dedicated finalizer thread.
pub struct FfmpegWriter {
    path: PathBuf,
    settings: OutputSettings,
    queue_depth: usize,
    gate: Arc<ReadyGate>,
    child: Option<Child>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    feeder: Option<JoinHandle<()>>,
    tx: Option<mpsc::Sender<PixelFrame>>,
    last_idx: Option<FrameIndex>,
    input_finished: bool,
}

impl FfmpegWriter {
    /// Open an encoder writing to `path`. An existing file at `path` is deleted first.
    #[tracing::instrument(skip(settings), fields(w = settings.size.width, h = settings.size.height))]
    pub fn open(path: &Path, settings: OutputSettings, queue_depth: usize) -> ReframeResult<Self> {
        settings.validate()?;
        remove_existing_output(path)?;
        ensure_parent_dir(path)?;

        if !is_ffmpeg_on_path() {
            return Err(ReframeError::configuration(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            settings.input_format.ffmpeg_name(),
        ]);
        if settings.input_format == PixelFormat::Nv12FullRange {
            cmd.args(["-color_range", "pc"]);
        }
        cmd.args([
            "-s",
            &format!("{}x{}", settings.size.width, settings.size.height),
            "-r",
            &format!("{}/{}", settings.fps.num, settings.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            settings.codec.ffmpeg_encoder(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(path);

        let mut child = cmd.spawn().map_err(|e| {
            ReframeError::configuration(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            ReframeError::configuration("failed to open ffmpeg stdin (unexpected)")
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ReframeError::configuration("failed to open ffmpeg stderr (unexpected)")
        })?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let gate = Arc::new(ReadyGate {
            state: Mutex::new(GateState {
                writer: WriterState::Created,
                in_flight: 0,
                frames_written: 0,
                failure: None,
            }),
            cond: Condvar::new(),
        });

        let (tx, rx) = mpsc::channel::<PixelFrame>();
        let feeder_gate = gate.clone();
        let feeder = std::thread::spawn(move || {
            for frame in rx {
                let failed = feeder_gate.lock().failure.is_some();
                let res = if failed {
                    Ok(())
                } else {
                    stdin.write_all(&frame.data)
                };
                let mut g = feeder_gate.lock();
                g.in_flight = g.in_flight.saturating_sub(1);
                match res {
                    Ok(()) if !failed => g.frames_written += 1,
                    Ok(()) => {}
                    Err(e) => {
                        g.failure = Some(format!("failed to write frame to ffmpeg stdin: {e}"));
                        g.writer = WriterState::Failed;
                    }
                }
                drop(g);
                feeder_gate.cond.notify_all();
            }
            drop(stdin);
        });

        tracing::debug!(path = %path.display(), queue_depth, "encoder opened");
        Ok(Self {
            path: path.to_path_buf(),
            settings,
            queue_depth: queue_depth.max(1),
            gate,
            child: Some(child),
            stderr_drain: Some(stderr_drain),
            feeder: Some(feeder),
            tx: Some(tx),
            last_idx: None,
            input_finished: false,
        })
    }

    /// Start the writing session at time zero. Must precede the first append.
    pub fn start_session(&mut self) -> ReframeResult<()> {
        let mut g = self.gate.lock();
        if g.writer != WriterState::Created {
            return Err(ReframeError::encode(format!(
                "cannot start a session from state {:?}",
                g.writer
            )));
        }
        g.writer = WriterState::Writing;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &OutputSettings {
        &self.settings
    }
}

impl FrameSink for FfmpegWriter {
    fn state(&self) -> WriterState {
        self.gate.lock().writer
    }

    fn is_ready(&self) -> bool {
        if self.input_finished {
            return false;
        }
        let g = self.gate.lock();
        g.writer == WriterState::Writing && g.failure.is_none() && g.in_flight < self.queue_depth
    }

    fn wait_ready(&self) -> ReframeResult<()> {
        if self.input_finished {
            return Err(ReframeError::encode("writer input is already finished"));
        }
        let mut g = self.gate.lock();
        loop {
            if let Some(msg) = &g.failure {
                return Err(ReframeError::encode(msg.clone()));
            }
            if g.writer != WriterState::Writing {
                return Err(ReframeError::encode(format!(
                    "writer is not accepting frames (state {:?})",
                    g.writer
                )));
            }
            if g.in_flight < self.queue_depth {
                return Ok(());
            }
            g = self.gate.cond.wait(g).unwrap_or_else(|p| p.into_inner());
        }
    }

    fn append(&mut self, frame: PixelFrame) -> ReframeResult<()> {
        if !self.is_ready() {
            return Err(ReframeError::encode("append called while writer is not ready"));
        }
        self.settings.check_frame(&frame)?;
        if let Some(last) = self.last_idx
            && frame.pts.index <= last
        {
            return Err(ReframeError::encode("writer received out-of-order frame"));
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ReframeError::encode("writer input is closed"))?;

        self.last_idx = Some(frame.pts.index);
        self.gate.lock().in_flight += 1;
        tx.send(frame).map_err(|_| {
            let mut g = self.gate.lock();
            g.in_flight = g.in_flight.saturating_sub(1);
            ReframeError::encode("encoder feeder thread is gone")
        })
    }

    fn mark_finished(&mut self) {
        self.input_finished = true;
        drop(self.tx.take());
    }

    fn finish(&mut self, on_complete: FinishCallback) {
        self.mark_finished();

        let Some(mut child) = self.child.take() else {
            on_complete(Err(ReframeError::encode("writer is already finalized")));
            return;
        };
        {
            let mut g = self.gate.lock();
            if g.writer != WriterState::Failed {
                g.writer = WriterState::Finalizing;
            }
        }
        self.gate.cond.notify_all();

        let gate = self.gate.clone();
        let feeder = self.feeder.take();
        let stderr_drain = self.stderr_drain.take();
        let path = self.path.clone();

        std::thread::spawn(move || {
            if let Some(feeder) = feeder
                && feeder.join().is_err()
            {
                gate.lock().failure = Some("encoder feeder thread panicked".to_string());
            }

            let status = child.wait();
            let stderr_bytes = stderr_drain
                .and_then(|h| h.join().ok())
                .and_then(|r| r.ok())
                .unwrap_or_default();

            let result = {
                let mut g = gate.lock();
                let outcome = match (&g.failure, status) {
                    (Some(msg), _) => Err(ReframeError::encode(msg.clone())),
                    (None, Err(e)) => Err(ReframeError::encode(format!(
                        "failed to wait for ffmpeg to finish: {e}"
                    ))),
                    (None, Ok(status)) if !status.success() => Err(ReframeError::encode(format!(
                        "ffmpeg exited with status {}: {}",
                        status,
                        String::from_utf8_lossy(&stderr_bytes).trim()
                    ))),
                    (None, Ok(_)) => Ok(FinishedOutput {
                        path,
                        frames_written: g.frames_written,
                    }),
                };
                g.writer = if outcome.is_ok() {
                    WriterState::Finalized
                } else {
                    WriterState::Failed
                };
                outcome
            };
            gate.cond.notify_all();
            on_complete(result);
        });
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn remove_existing_output(path: &Path) -> ReframeResult<()> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| {
            ReframeError::configuration(format!(
                "failed to remove existing output '{}': {e}",
                path.display()
            ))
        })?;
        tracing::debug!(path = %path.display(), "removed previous output");
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ReframeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
