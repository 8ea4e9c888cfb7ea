use crate::{
    buffer::PixelBuffer,
    foundation::{core::FrameIndex, error::DotMatrixResult},
    raster::dots::{RenderParams, render},
};

/// One video frame: pixels plus its ordinal and presentation time.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: FrameIndex,
    /// Presentation timestamp in seconds.
    pub pts_secs: f64,
    pub buffer: PixelBuffer,
}

impl Frame {
    pub fn new(index: FrameIndex, pts_secs: f64, buffer: PixelBuffer) -> Self {
        Self {
            index,
            pts_secs,
            buffer,
        }
    }

    /// Dot-render this frame, keeping its ordinal and timestamp.
    pub fn render_dots(&self, params: &RenderParams) -> DotMatrixResult<Frame> {
        Ok(Frame {
            index: self.index,
            pts_secs: self.pts_secs,
            buffer: render(&self.buffer, params)?,
        })
    }
}
