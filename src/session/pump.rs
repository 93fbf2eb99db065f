use std::path::PathBuf;

use crate::{
    decode::reader::FrameSource,
    encode::sink::FrameSink,
    foundation::error::{ReframeError, ReframeResult},
};

/// Outcome of a finished reframing job, delivered to the completion callback.
#[derive(Clone, Debug, PartialEq)]
pub struct JobReport {
    pub output_path: PathBuf,
    pub frames_written: u64,
    /// Decoder diagnostic when the source ended early; the output holds the frames before it.
    pub decode_error: Option<String>,
}

/// What the drain loop observed, returned synchronously by [`pump`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub frames_appended: u64,
    pub decode_error: Option<String>,
    pub encode_error: Option<String>,
}

pub type PumpCallback = Box<dyn FnOnce(ReframeResult<JobReport>) + Send + 'static>;

/// Drain `source` into `sink` until end of stream, then finalize the sink.
///
/// The loop blocks on sink readiness and pulls frames only while the sink stays ready. A decode
/// error ends the stream early and the partial output is still finalized. An encode error also
/// stops the loop, and the completion outcome is then an error regardless of how finalization went.
/// `on_complete` fires exactly once, on whatever thread the sink completes on.
pub fn pump(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    on_complete: PumpCallback,
) -> PumpReport {
    let mut frames_appended = 0u64;
    let mut decode_error: Option<ReframeError> = None;
    let mut encode_error: Option<ReframeError> = None;

    'drain: loop {
        if let Err(e) = sink.wait_ready() {
            encode_error = Some(e);
            break;
        }
        while sink.is_ready() {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = sink.append(frame) {
                        encode_error = Some(e);
                        break 'drain;
                    }
                    frames_appended += 1;
                }
                Ok(None) => break 'drain,
                Err(e) => {
                    tracing::warn!(frames_appended, error = %e, "decoding stopped early");
                    decode_error = Some(e);
                    break 'drain;
                }
            }
        }
    }

    sink.mark_finished();

    let report = PumpReport {
        frames_appended,
        decode_error: decode_error.as_ref().map(ToString::to_string),
        encode_error: encode_error.as_ref().map(ToString::to_string),
    };
    tracing::debug!(
        frames_appended,
        decode_failed = report.decode_error.is_some(),
        encode_failed = report.encode_error.is_some(),
        "drain loop finished, finalizing output"
    );

    let decode_diag = report.decode_error.clone();
    sink.finish(Box::new(move |finished| {
        let outcome = match (encode_error, finished) {
            (Some(e), finished) => {
                if let Err(fin) = finished {
                    tracing::debug!(error = %fin, "finalize also failed after an encode error");
                }
                Err(e)
            }
            (None, Err(e)) => {
                tracing::error!(error = %e, "failed to finalize output");
                Err(e)
            }
            (None, Ok(out)) => Ok(JobReport {
                output_path: out.path,
                frames_written: out.frames_written,
                decode_error: decode_diag,
            }),
        };
        on_complete(outcome);
    }));

    report
}

#[cfg(test)]
#[path = "../../tests/unit/session/pump.rs"]
mod tests;
