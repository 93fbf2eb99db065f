use std::path::{Path, PathBuf};

use crate::{
    foundation::core::{Affine, Fps, Size},
    foundation::error::{ReframeError, ReframeResult},
    transform::affine::Orientation,
};

/// One video track of a source asset, as read from container metadata.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoTrackDescriptor {
    /// Container stream index (`-map 0:<index>`).
    pub stream_index: u32,
    pub codec_name: Option<String>,
    /// Coded frame size, before the orientation is applied.
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub fps: Fps,
    pub frame_count: Option<u64>,
}

impl VideoTrackDescriptor {
    pub fn natural_size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub fn orientation_transform(&self) -> Affine {
        self.orientation.to_affine()
    }

    pub fn frame_byte_len_rgba(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoAsset {
    pub source_path: PathBuf,
    pub duration_sec: f64,
    /// Video tracks in container order.
    pub video_tracks: Vec<VideoTrackDescriptor>,
}

impl VideoAsset {
    /// First video track; multi-track assets are not disambiguated.
    pub fn first_video_track(&self) -> ReframeResult<&VideoTrackDescriptor> {
        self.video_tracks.first().ok_or_else(|| {
            ReframeError::configuration(format!(
                "no video track found in '{}'",
                self.source_path.display()
            ))
        })
    }
}

/// Probe `source_path` with the system `ffprobe`.
#[tracing::instrument]
pub fn probe_asset(source_path: &Path) -> ReframeResult<VideoAsset> {
    if !source_path.is_file() {
        return Err(ReframeError::configuration(format!(
            "source asset '{}' is not a readable file",
            source_path.display()
        )));
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| ReframeError::configuration(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReframeError::configuration(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let asset = parse_probe_json(&out.stdout, source_path)?;
    tracing::debug!(
        tracks = asset.video_tracks.len(),
        codec = asset
            .video_tracks
            .first()
            .and_then(|t| t.codec_name.as_deref())
            .unwrap_or("unknown"),
        duration_sec = asset.duration_sec,
        "probed source asset"
    );
    Ok(asset)
}

#[derive(serde::Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
    /// 3x3 fixed-point matrix as printed by ffprobe, one `index: a b c` row per line.
    displaymatrix: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_json(bytes: &[u8], source_path: &Path) -> ReframeResult<VideoAsset> {
    let parsed: ProbeOut = serde_json::from_slice(bytes)
        .map_err(|e| ReframeError::configuration(format!("ffprobe json parse failed: {e}")))?;

    let mut video_tracks = Vec::new();
    let mut stream_duration = None;
    for s in parsed
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
    {
        let (Some(width), Some(height)) = (s.width, s.height) else {
            return Err(ReframeError::configuration(format!(
                "video stream {} is missing width/height",
                s.index
            )));
        };
        if width == 0 || height == 0 {
            return Err(ReframeError::configuration(format!(
                "video stream {} has zero dimensions",
                s.index
            )));
        }

        let fps = s
            .avg_frame_rate
            .as_deref()
            .and_then(parse_ff_ratio)
            .or_else(|| s.r_frame_rate.as_deref().and_then(parse_ff_ratio))
            .ok_or_else(|| {
                ReframeError::configuration(format!(
                    "video stream {} has no usable frame rate",
                    s.index
                ))
            })?;
        let fps = Fps::new(fps.0, fps.1)?;

        if stream_duration.is_none() {
            stream_duration = s.duration.as_deref().and_then(|d| d.parse::<f64>().ok());
        }

        video_tracks.push(VideoTrackDescriptor {
            stream_index: s.index,
            codec_name: s.codec_name.clone(),
            width,
            height,
            orientation: stream_orientation(s),
            fps,
            frame_count: s.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()),
        });
    }

    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or(stream_duration)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(VideoAsset {
        source_path: source_path.to_path_buf(),
        duration_sec,
        video_tracks,
    })
}

fn stream_orientation(s: &ProbeStream) -> Orientation {
    match s
        .side_data_list
        .iter()
        .find_map(|d| d.displaymatrix.as_deref().and_then(parse_display_matrix))
    {
        Some(m) => orientation_from_display_matrix(&m),
        None => Orientation::from_rotation_degrees(rotation_cw_degrees(s), false),
    }
}

fn parse_display_matrix(text: &str) -> Option<[f64; 9]> {
    let values: Vec<f64> = text
        .lines()
        .filter_map(|line| line.split_once(':'))
        .flat_map(|(_, row)| row.split_whitespace())
        .map(|v| v.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    values.try_into().ok()
}

/// A negative determinant of the 2x2 part means the matrix flips. Undoing the horizontal flip on
/// the input row leaves a pure rotation whose angle is read off the first row.
fn orientation_from_display_matrix(m: &[f64; 9]) -> Orientation {
    let (mut a, mut b) = (m[0], m[1]);
    let mirrored = a * m[4] - b * m[3] < 0.0;
    if mirrored {
        a = -a;
        b = -b;
    }
    Orientation::from_rotation_degrees(b.atan2(a).to_degrees(), mirrored)
}

/// Clockwise display rotation. The display matrix side data is counter-clockwise, the legacy
/// `rotate` tag is clockwise.
fn rotation_cw_degrees(s: &ProbeStream) -> f64 {
    if let Some(ccw) = s.side_data_list.iter().find_map(|d| d.rotation) {
        return -ccw;
    }
    s.tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if a == 0 || b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/media.rs"]
mod tests;
