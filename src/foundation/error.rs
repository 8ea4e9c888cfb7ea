/// Convenience result alias used throughout the crate.
pub type DotMatrixResult<T> = Result<T, DotMatrixError>;

/// Errors produced by buffer construction, rendering, and media I/O.
#[derive(thiserror::Error, Debug)]
pub enum DotMatrixError {
    /// Render parameters or job configuration violate their invariants.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Pixel data does not match its declared dimensions or layout.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// A pixel read outside the buffer extents. The grid walk never produces one.
    #[error("sample ({x}, {y}) out of bounds for {width}x{height} buffer")]
    OutOfBounds {
        /// Requested column.
        x: u32,
        /// Requested row.
        y: u32,
        /// Buffer width.
        width: u32,
        /// Buffer height.
        height: u32,
    },

    /// An image or frame decoder failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// An image or frame encoder failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// A video job stopped early.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DotMatrixError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn invalid_buffer(msg: impl Into<String>) -> Self {
        Self::InvalidBuffer(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

/// Failure of [`crate::process`].
///
/// Frames pushed to the sink before the failure stay there. `frames_written` reports how many, so
/// the caller can decide whether a partial output is acceptable.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Rejected before any frame was pulled.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("decode failed at frame {position} ({frames_written} frames written): {reason}")]
    DecodeFailed {
        /// 0-based position in the source stream.
        position: u64,
        frames_written: u64,
        reason: String,
    },

    /// The sink rejected a frame or failed to finish.
    ///
    /// If the encoder thread panicked, the number of frames already in the sink is unknown:
    /// `frames_written` is 0 and `reason` says the count is unknown.
    #[error("encode failed at frame {position} ({frames_written} frames written): {reason}")]
    EncodeFailed {
        position: u64,
        frames_written: u64,
        reason: String,
    },

    /// The dot renderer failed on a frame. Indicates a bug, not bad input.
    #[error("render failed at frame {position} ({frames_written} frames written): {reason}")]
    Render {
        position: u64,
        frames_written: u64,
        reason: String,
    },

    #[error("cancelled after {frames_written} frames")]
    Cancelled { frames_written: u64 },
}

impl PipelineError {
    /// Number of frames the sink accepted before the job stopped.
    pub fn frames_written(&self) -> u64 {
        match self {
            Self::InvalidParams(_) => 0,
            Self::DecodeFailed { frames_written, .. }
            | Self::EncodeFailed { frames_written, .. }
            | Self::Render { frames_written, .. }
            | Self::Cancelled { frames_written } => *frames_written,
        }
    }

    pub(crate) fn with_frames_written(mut self, written: u64) -> Self {
        match &mut self {
            Self::InvalidParams(_) => {}
            Self::DecodeFailed { frames_written, .. }
            | Self::EncodeFailed { frames_written, .. }
            | Self::Render { frames_written, .. }
            | Self::Cancelled { frames_written } => *frames_written = written,
        }
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
