//! Applies the dot renderer to every frame of a video stream.
//!
//! The pipeline only knows the [`FrameSource`](source::FrameSource) and
//! [`FrameSink`](sink::FrameSink) traits; codecs and containers live behind them.

pub mod frame;
pub mod process;
pub mod sink;
pub mod source;
