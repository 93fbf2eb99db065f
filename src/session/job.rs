use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context as _;

use crate::{
    assets::media::probe_asset,
    composition::model::build_composition,
    decode::reader::{ReaderOpts, SourceReader},
    encode::ffmpeg::{DEFAULT_QUEUE_DEPTH, FfmpegWriter},
    encode::sink::{OutputSettings, VideoCodec},
    foundation::core::{CropRect, RenderSize},
    foundation::error::{ReframeError, ReframeResult},
    render::pixel::PixelFormat,
    session::pump::{JobReport, PumpCallback, PumpReport, pump},
};

pub const DEFAULT_CROP_HEIGHT: u32 = 1920;
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "video.mp4";
pub const QUEUE_DEPTH_ENV: &str = "REFRAME_WRITER_QUEUE_DEPTH";

fn default_output_file_name() -> String {
    DEFAULT_OUTPUT_FILE_NAME.to_string()
}

fn default_crop_height() -> u32 {
    DEFAULT_CROP_HEIGHT
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_background() -> [u8; 4] {
    [0, 0, 0, 255]
}

/// Paths and fixed parameters of a [`Reframer`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReframeConfig {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,
    #[serde(default)]
    pub render_size: RenderSize,
    /// Height of the crop rectangle in oriented source pixels.
    #[serde(default = "default_crop_height")]
    pub crop_height: u32,
    #[serde(default = "default_queue_depth")]
    pub writer_queue_depth: usize,
    #[serde(default = "default_background")]
    pub background_rgba: [u8; 4],
}

impl ReframeConfig {
    pub fn new(source_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output_dir: output_dir.into(),
            output_file_name: default_output_file_name(),
            render_size: RenderSize::default(),
            crop_height: DEFAULT_CROP_HEIGHT,
            writer_queue_depth: DEFAULT_QUEUE_DEPTH,
            background_rgba: default_background(),
        }
    }

    /// Load a JSON config file.
    pub fn from_path(path: &Path) -> ReframeResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            ReframeError::configuration(format!("invalid config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReframeResult<()> {
        self.render_size.validate()?;
        if self.crop_height == 0 {
            return Err(ReframeError::configuration("crop_height must be > 0"));
        }
        if self.writer_queue_depth == 0 {
            return Err(ReframeError::configuration("writer_queue_depth must be > 0"));
        }
        let name = Path::new(&self.output_file_name);
        if self.output_file_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(ReframeError::configuration(format!(
                "output_file_name must be a plain file name, got '{}'",
                self.output_file_name
            )));
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file_name)
    }
}

/// True when writing `output` would replace `source`. File names are compared ignoring ASCII
/// case, since the default output name differs from common source names only in case.
fn output_collides_with_source(source: &Path, output: &Path) -> bool {
    let Ok(source) = source.canonicalize() else {
        return false;
    };
    if output.canonicalize().is_ok_and(|out| out == source) {
        return true;
    }
    let (Some(source_dir), Some(source_name)) = (source.parent(), source.file_name()) else {
        return false;
    };
    let Some(output_name) = output.file_name() else {
        return false;
    };
    let output_dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    output_dir.canonicalize().is_ok_and(|dir| dir == source_dir)
        && source_name
            .to_string_lossy()
            .eq_ignore_ascii_case(&output_name.to_string_lossy())
}

fn queue_depth_override(raw: Option<String>) -> Option<usize> {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

/// Monotonic identifier of a started job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Completion of a job, as seen by the interactive thread.
#[derive(Debug)]
pub struct JobEvent {
    pub job: JobId,
    pub result: ReframeResult<JobReport>,
}

/// Receiver of job completions on the interactive thread.
pub trait PlaybackSurface {
    /// Load and play the finished output.
    fn present(&mut self, job: JobId, report: &JobReport);
    fn report_failure(&mut self, job: JobId, error: &ReframeError);
}

/// Handle to a running job's media worker.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    output_path: PathBuf,
    worker: JoinHandle<PumpReport>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Wait for the drain loop to end. Finalization may still be running afterwards; its outcome
    /// arrives as a [`JobEvent`].
    pub fn join(self) -> ReframeResult<PumpReport> {
        self.worker
            .join()
            .map_err(|_| ReframeError::Other(anyhow::anyhow!("media worker thread panicked")))
    }
}

/// Marks the single job slot as taken until dropped.
struct SlotGuard(Arc<AtomicBool>);

impl SlotGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> ReframeResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReframeError::busy("a reframing job is already in flight"))?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Job controller: validates a crop request, wires reader and writer, and runs the drain loop
/// on a background media thread.
///
/// Completions are queued and handed to a [`PlaybackSurface`] only when the owning thread calls
/// [`Reframer::dispatch_events`] or [`Reframer::wait_event`].
pub struct Reframer {
    config: ReframeConfig,
    active: Arc<AtomicBool>,
    next_id: AtomicU64,
    events_tx: mpsc::Sender<JobEvent>,
    events_rx: mpsc::Receiver<JobEvent>,
}

impl Reframer {
    pub fn new(mut config: ReframeConfig) -> ReframeResult<Self> {
        if let Some(depth) = queue_depth_override(std::env::var(QUEUE_DEPTH_ENV).ok()) {
            config.writer_queue_depth = depth;
        }
        config.validate()?;
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            config,
            active: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            events_tx,
            events_rx,
        })
    }

    pub fn config(&self) -> &ReframeConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start reframing the configured source to a `crop_width`-wide crop anchored at the top-left.
    ///
    /// Setup runs synchronously and any failure is returned here; no job starts in that case.
    /// An existing output file is deleted once the encoder is opened.
    #[tracing::instrument(skip(self), fields(source = %self.config.source_path.display()))]
    pub fn start(&self, crop_width: u32) -> ReframeResult<JobHandle> {
        let crop = CropRect::new(
            0.0,
            0.0,
            f64::from(crop_width),
            f64::from(self.config.crop_height),
        )?;
        let slot = SlotGuard::acquire(&self.active)?;
        let job = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let output_path = self.config.output_path();
        if output_collides_with_source(&self.config.source_path, &output_path) {
            return Err(ReframeError::configuration(format!(
                "output '{}' would overwrite the source asset '{}'",
                output_path.display(),
                self.config.source_path.display()
            )));
        }

        let asset = probe_asset(&self.config.source_path)?;
        let track = asset.first_video_track()?;
        let composition = build_composition(&asset, track, crop, self.config.render_size)?;

        let settings = OutputSettings {
            codec: VideoCodec::H264,
            size: self.config.render_size,
            fps: track.fps,
            input_format: PixelFormat::Nv12FullRange,
        };
        if composition.render_size != settings.size {
            return Err(ReframeError::configuration(format!(
                "render size {}x{} does not match output size {}x{}",
                composition.render_size.width,
                composition.render_size.height,
                settings.size.width,
                settings.size.height
            )));
        }

        let mut reader = SourceReader::open(
            &asset,
            composition,
            ReaderOpts {
                output_format: settings.input_format,
                bg_rgba: self.config.background_rgba,
            },
        )?;
        let mut writer =
            FfmpegWriter::open(&output_path, settings, self.config.writer_queue_depth)?;
        reader.start_reading()?;
        writer.start_session()?;

        let state = JobState {
            job,
            reader,
            writer,
            slot,
        };
        let events_tx = self.events_tx.clone();
        let worker = std::thread::Builder::new()
            .name("reframe-media".to_string())
            .spawn(move || state.run(events_tx))
            .context("failed to spawn media worker thread")?;

        tracing::info!(%job, crop_width, output = %output_path.display(), "job started");
        Ok(JobHandle {
            id: job,
            output_path,
            worker,
        })
    }

    /// Deliver every queued completion to `surface`. Returns the number of events delivered.
    pub fn dispatch_events(&self, surface: &mut dyn PlaybackSurface) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            deliver(surface, event);
            delivered += 1;
        }
        delivered
    }

    /// Block up to `timeout` for the next completion.
    pub fn wait_event(&self, timeout: Duration) -> Option<JobEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }
}

/// Everything one job owns while it runs. Dropped once the output is finalized.
struct JobState {
    job: JobId,
    reader: SourceReader,
    writer: FfmpegWriter,
    slot: SlotGuard,
}

impl JobState {
    fn run(self, events_tx: mpsc::Sender<JobEvent>) -> PumpReport {
        let JobState {
            job,
            mut reader,
            mut writer,
            slot,
        } = self;
        let on_complete: PumpCallback = Box::new(move |result| {
            match &result {
                Ok(report) => tracing::info!(
                    %job,
                    frames = report.frames_written,
                    partial = report.decode_error.is_some(),
                    "job finished"
                ),
                Err(e) => tracing::error!(%job, error = %e, "job failed"),
            }
            drop(slot);
            // The controller may already be gone; nobody is left to notify then.
            let _ = events_tx.send(JobEvent { job, result });
        });
        pump(&mut reader, &mut writer, on_complete)
    }
}

fn deliver(surface: &mut dyn PlaybackSurface, event: JobEvent) {
    match &event.result {
        Ok(report) => surface.present(event.job, report),
        Err(e) => surface.report_failure(event.job, e),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/job.rs"]
mod tests;
