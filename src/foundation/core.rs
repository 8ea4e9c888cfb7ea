use crate::foundation::error::{DotMatrixError, DotMatrixResult};

/// 0-based frame ordinal within a source stream.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> DotMatrixResult<Self> {
        if den == 0 {
            return Err(DotMatrixError::invalid_params("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(DotMatrixError::invalid_params("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert a frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Parse an `ffprobe`-style ratio such as `30000/1001` or a plain integer.
    pub fn parse_ratio(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('/');
        let num = parts.next()?.parse::<u32>().ok()?;
        let den = match parts.next() {
            Some(d) => d.parse::<u32>().ok()?,
            None => 1,
        };
        if parts.next().is_some() {
            return None;
        }
        Self::new(num, den).ok()
    }
}
