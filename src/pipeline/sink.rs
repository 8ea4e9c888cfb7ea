use crate::{
    buffer::ChannelLayout,
    foundation::{core::Fps, error::DotMatrixResult},
    pipeline::frame::Frame,
};

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Channel layout of every pushed frame.
    pub layout: ChannelLayout,
    /// Output frames-per-second.
    pub fps: Fps,
}

/// Push side of a video job, typically backed by an encoder/muxer.
///
/// Ordering contract: `push_frame` is called with strictly increasing frame ordinals. A job that
/// stops early on a decode failure or cancellation still calls `end`, so the frames already pushed
/// form a complete (shorter) output. After a `push_frame` error, `end` is not called.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> DotMatrixResult<()>;
    /// Push one rendered frame.
    fn push_frame(&mut self, frame: &Frame) -> DotMatrixResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> DotMatrixResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<Frame>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames in push order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Whether `end` has been called since the last `begin`.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> DotMatrixResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> DotMatrixResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> DotMatrixResult<()> {
        self.ended = true;
        Ok(())
    }
}
