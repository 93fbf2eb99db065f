use crate::foundation::error::{ReframeError, ReframeResult};

pub use kurbo::{Affine, Point, Rect, Size, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> ReframeResult<Self> {
        if den == 0 {
            return Err(ReframeError::configuration("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ReframeError::configuration("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }
}

/// Target output dimensions of the encoded video.
///
/// Both sides are non-zero and even: frames are handed to the encoder as 4:2:0 planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> ReframeResult<Self> {
        let size = Self { width, height };
        size.validate()?;
        Ok(size)
    }

    pub fn validate(&self) -> ReframeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReframeError::configuration(
                "render width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(ReframeError::configuration(
                "render width/height must be even (required for 4:2:0 output)",
            ));
        }
        if u16::try_from(self.width).is_err() || u16::try_from(self.height).is_err() {
            return Err(ReframeError::configuration("render size exceeds u16"));
        }
        Ok(())
    }

    pub fn as_size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

impl Default for RenderSize {
    fn default() -> Self {
        Self {
            width: 312,
            height: 424,
        }
    }
}

/// Axis-aligned crop in the oriented source coordinate space.
///
/// Width and height are always finite and strictly positive, so the scale step of the layer
/// transform is well defined.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Rect", into = "Rect")]
pub struct CropRect(Rect);

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> ReframeResult<Self> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return Err(ReframeError::configuration(
                "crop rectangle must have finite coordinates",
            ));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(ReframeError::configuration(format!(
                "crop rectangle must have positive width and height, got {width}x{height}"
            )));
        }
        Ok(Self(Rect::new(x, y, x + width, y + height)))
    }

    pub fn rect(self) -> Rect {
        self.0
    }

    pub fn origin(self) -> Point {
        self.0.origin()
    }

    pub fn width(self) -> f64 {
        self.0.width()
    }

    pub fn height(self) -> f64 {
        self.0.height()
    }
}

impl TryFrom<Rect> for CropRect {
    type Error = ReframeError;

    fn try_from(r: Rect) -> ReframeResult<Self> {
        Self::new(r.x0, r.y0, r.width(), r.height())
    }
}

impl From<CropRect> for Rect {
    fn from(c: CropRect) -> Self {
        c.0
    }
}

/// Half-open presentation time range in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    pub start_sec: f64,
    pub duration_sec: f64,
}

impl TimeRange {
    pub fn new(start_sec: f64, duration_sec: f64) -> ReframeResult<Self> {
        if !start_sec.is_finite() || !duration_sec.is_finite() || duration_sec < 0.0 {
            return Err(ReframeError::configuration(
                "time range must be finite with a non-negative duration",
            ));
        }
        Ok(Self {
            start_sec,
            duration_sec,
        })
    }

    pub fn end_sec(self) -> f64 {
        self.start_sec + self.duration_sec
    }

    pub fn contains(self, t: f64) -> bool {
        self.start_sec <= t && t < self.end_sec()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
