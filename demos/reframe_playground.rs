use std::{path::PathBuf, time::Duration};

use clap::Parser;
use reframe::{JobId, JobReport, PlaybackSurface, ReframeConfig, ReframeError, Reframer};

/// Crop a portrait clip to a narrower window and print where the result landed.
#[derive(Parser, Debug)]
struct Args {
    /// Source video (first video track is used).
    #[arg(long)]
    source: PathBuf,
    /// Directory receiving `video.mp4`.
    #[arg(long, default_value = "target/reframe_playground")]
    out_dir: PathBuf,
    /// Crop width in oriented source pixels.
    #[arg(long, default_value_t = 500)]
    crop_width: u32,
    /// Optional JSON config; `--source` and `--out-dir` still win.
    #[arg(long)]
    config: Option<PathBuf>,
}

struct ConsoleSurface {
    done: bool,
}

impl PlaybackSurface for ConsoleSurface {
    fn present(&mut self, job: JobId, report: &JobReport) {
        println!(
            "{job}: playing {} ({} frames)",
            report.output_path.display(),
            report.frames_written
        );
        if let Some(diag) = &report.decode_error {
            println!("{job}: source ended early: {diag}");
        }
        self.done = true;
    }

    fn report_failure(&mut self, job: JobId, error: &ReframeError) {
        eprintln!("{job}: {error}");
        self.done = true;
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ReframeConfig::from_path(path)?,
        None => ReframeConfig::new(&args.source, &args.out_dir),
    };
    config.source_path = args.source;
    config.output_dir = args.out_dir;

    let reframer = Reframer::new(config)?;
    let handle = reframer.start(args.crop_width)?;
    println!("{}: writing {}", handle.id(), handle.output_path().display());

    let mut surface = ConsoleSurface { done: false };
    while !surface.done {
        std::thread::sleep(Duration::from_millis(100));
        reframer.dispatch_events(&mut surface);
    }

    let pumped = handle.join()?;
    println!("{} frames pulled from the source", pumped.frames_appended);
    Ok(())
}
