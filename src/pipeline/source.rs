use std::collections::VecDeque;

use crate::{
    buffer::ChannelLayout,
    foundation::{
        core::{FrameIndex, Fps},
        error::{DotMatrixError, DotMatrixResult},
    },
    pipeline::frame::Frame,
};

/// Stream properties a [`FrameSource`] reports up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    /// Width of every frame in pixels.
    pub width: u32,
    /// Height of every frame in pixels.
    pub height: u32,
    /// Channel layout of every frame.
    pub layout: ChannelLayout,
    pub fps: Fps,
    /// Number of frames the source expects to yield, when known.
    pub frame_count: Option<u64>,
}

/// Pull side of a video job, typically backed by a demuxer/decoder.
///
/// Ordering contract: `next_frame` yields frames with strictly increasing [`FrameIndex`] and the
/// dimensions reported by [`FrameSource::info`]. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn info(&self) -> SourceInfo;
    fn next_frame(&mut self) -> DotMatrixResult<Option<Frame>>;
}

/// In-memory source for tests and embedding. Items may be errors, to simulate decoder failures.
#[derive(Debug)]
pub struct VecSource {
    info: SourceInfo,
    items: VecDeque<DotMatrixResult<Frame>>,
}

impl VecSource {
    /// Build a source from frames, taking dimensions and layout from the first frame.
    pub fn from_frames(fps: Fps, frames: Vec<Frame>) -> DotMatrixResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| DotMatrixError::invalid_params("VecSource needs at least one frame"))?;
        let info = SourceInfo {
            width: first.buffer.width(),
            height: first.buffer.height(),
            layout: first.buffer.layout(),
            fps,
            frame_count: Some(frames.len() as u64),
        };
        Ok(Self::with_items(info, frames.into_iter().map(Ok).collect()))
    }

    /// Build a source from raw items; `info` is reported verbatim.
    pub fn with_items(info: SourceInfo, items: Vec<DotMatrixResult<Frame>>) -> Self {
        Self {
            info,
            items: items.into(),
        }
    }
}

impl FrameSource for VecSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> DotMatrixResult<Option<Frame>> {
        self.items.pop_front().transpose()
    }
}

/// Keeps every `every`-th frame of `inner` and renumbers the kept frames from 0.
///
/// Frame positions are counted from 1, so with `every = 2` the 2nd, 4th, ... frames are kept.
/// Timestamps are passed through unchanged.
#[derive(Debug)]
pub struct Decimate<S> {
    inner: S,
    every: u64,
    seen: u64,
    emitted: u64,
}

impl<S: FrameSource> Decimate<S> {
    pub fn new(inner: S, every: u64) -> Self {
        Self {
            inner,
            every: every.max(1),
            seen: 0,
            emitted: 0,
        }
    }

    /// Decimate toward `target` fps: keeps one frame in `round(source_fps / target)`, at least 1.
    pub fn to_fps(inner: S, target: Fps) -> Self {
        let ratio = inner.info().fps.as_f64() / target.as_f64();
        let every = if ratio.is_finite() {
            ratio.round().max(1.0) as u64
        } else {
            1
        };
        Self::new(inner, every)
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FrameSource> FrameSource for Decimate<S> {
    fn info(&self) -> SourceInfo {
        let inner = self.inner.info();
        let every = u32::try_from(self.every).unwrap_or(u32::MAX);
        let fps = inner
            .fps
            .den
            .checked_mul(every)
            .and_then(|den| Fps::new(inner.fps.num, den).ok())
            .unwrap_or(inner.fps);
        SourceInfo {
            fps,
            frame_count: inner.frame_count.map(|n| n / self.every),
            ..inner
        }
    }

    fn next_frame(&mut self) -> DotMatrixResult<Option<Frame>> {
        loop {
            let Some(mut frame) = self.inner.next_frame()? else {
                return Ok(None);
            };
            self.seen += 1;
            if !self.seen.is_multiple_of(self.every) {
                continue;
            }
            frame.index = FrameIndex(self.emitted);
            self.emitted += 1;
            return Ok(Some(frame));
        }
    }
}
