use std::sync::mpsc;

use super::*;
use crate::{
    decode::reader::ReaderState,
    encode::sink::{InMemorySink, OutputSettings, VideoCodec, WriterState},
    foundation::core::{FrameIndex, Fps, RenderSize},
    render::pixel::{PixelFormat, PixelFrame, PresentationTime},
};

/// Emits `frames` NV12 frames, then either ends cleanly or fails.
struct ScriptedSource {
    next: u64,
    frames: u64,
    fail_at_end: bool,
    state: ReaderState,
    w: u32,
    h: u32,
}

impl ScriptedSource {
    fn new(frames: u64, fail_at_end: bool) -> Self {
        Self {
            next: 0,
            frames,
            fail_at_end,
            state: ReaderState::Reading,
            w: 4,
            h: 2,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> ReframeResult<Option<PixelFrame>> {
        match self.state {
            ReaderState::Completed => return Ok(None),
            ReaderState::Failed => return Err(ReframeError::decode("already failed")),
            _ => {}
        }
        if self.next == self.frames {
            if self.fail_at_end {
                self.state = ReaderState::Failed;
                return Err(ReframeError::decode("corrupt packet"));
            }
            self.state = ReaderState::Completed;
            return Ok(None);
        }
        let i = self.next;
        self.next += 1;
        PixelFrame::new(
            PresentationTime {
                index: FrameIndex(i),
                secs: i as f64 / 10.0,
            },
            PixelFormat::Nv12FullRange,
            self.w,
            self.h,
            vec![16; PixelFormat::Nv12FullRange.frame_byte_len(self.w, self.h)],
        )
        .map(Some)
    }

    fn state(&self) -> ReaderState {
        self.state
    }
}

fn run(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
) -> (PumpReport, ReframeResult<JobReport>) {
    let (tx, rx) = mpsc::channel();
    let report = pump(source, sink, Box::new(move |r| tx.send(r).unwrap()));
    (report, rx.recv().unwrap())
}

#[test]
fn clean_end_of_stream_finalizes_all_frames() {
    let mut source = ScriptedSource::new(3, false);
    let mut sink = InMemorySink::new("clean.mp4");
    let (report, outcome) = run(&mut source, &mut sink);

    assert_eq!(report.frames_appended, 3);
    assert!(report.decode_error.is_none());
    let job = outcome.unwrap();
    assert_eq!(job.frames_written, 3);
    assert_eq!(job.output_path, PathBuf::from("clean.mp4"));
    assert!(job.decode_error.is_none());
    assert_eq!(sink.state(), WriterState::Finalized);
    assert_eq!(source.state(), ReaderState::Completed);
}

#[test]
fn decode_error_keeps_partial_output() {
    let mut source = ScriptedSource::new(2, true);
    let mut sink = InMemorySink::new("partial.mp4");
    let (report, outcome) = run(&mut source, &mut sink);

    assert_eq!(report.frames_appended, 2);
    assert!(report.encode_error.is_none());
    let job = outcome.unwrap();
    assert_eq!(job.frames_written, 2);
    assert!(job.decode_error.unwrap().contains("corrupt packet"));
    assert_eq!(sink.frames().len(), 2);
}

#[test]
fn finalize_failure_is_reported_as_error() {
    let mut source = ScriptedSource::new(1, false);
    let mut sink = InMemorySink::new("bad.mp4").failing_finalize("moov atom write failed");
    let (report, outcome) = run(&mut source, &mut sink);

    assert_eq!(report.frames_appended, 1);
    let err = outcome.unwrap_err();
    assert!(matches!(err, ReframeError::Encode(_)));
    assert!(err.to_string().contains("moov atom"));
}

#[test]
fn rejected_append_stops_pulling_and_fails_the_job() {
    let mut source = ScriptedSource::new(5, false);
    let mut sink = InMemorySink::new("mismatch.mp4").with_settings(OutputSettings {
        codec: VideoCodec::H264,
        size: RenderSize::new(8, 2).unwrap(),
        fps: Fps::new(10, 1).unwrap(),
        input_format: PixelFormat::Nv12FullRange,
    });
    let (report, outcome) = run(&mut source, &mut sink);

    assert_eq!(report.frames_appended, 0);
    assert!(report.encode_error.unwrap().contains("size mismatch"));
    assert_eq!(source.next, 1);
    assert!(outcome.is_err());
}

#[test]
fn empty_source_produces_empty_report() {
    let mut source = ScriptedSource::new(0, false);
    let mut sink = InMemorySink::new("empty.mp4");
    let (report, outcome) = run(&mut source, &mut sink);
    assert_eq!(report, PumpReport::default());
    assert_eq!(outcome.unwrap().frames_written, 0);
}
