//! Dot-matrix (halftone) rendering for images and video frame sequences.
//!
//! Every grid cell is sampled for brightness and redrawn as a white dot on black whose radius
//! grows with that brightness. The same transform is applied to a single [`PixelBuffer`] with
//! [`render`] or to every frame of a [`FrameSource`] with [`process`].
#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod foundation;
pub mod media;
pub mod pipeline;
pub mod raster;

pub use buffer::{ChannelLayout, PixelBuffer};
pub use config::JobConfig;
pub use foundation::core::{FrameIndex, Fps};
pub use foundation::error::{DotMatrixError, DotMatrixResult, PipelineError};
pub use media::ffmpeg::{
    FfmpegSink, FfmpegSinkOpts, FfmpegSource, FfmpegSourceOpts, VideoProbe, is_ffmpeg_on_path,
    probe_video,
};
pub use media::image::{decode_image, downscale, fit_within, load_image, save_image};
pub use pipeline::frame::Frame;
pub use pipeline::process::{CancelToken, PipelineOpts, PipelineStats, process, process_with};
pub use pipeline::sink::{FrameSink, InMemorySink, SinkConfig};
pub use pipeline::source::{Decimate, FrameSource, SourceInfo, VecSource};
pub use raster::dots::{
    BACKGROUND_RGBA, DEAD_ZONE_RADIUS, FOREGROUND_RGBA, RenderParams, dot_radius, grid_cells,
    render,
};
pub use raster::sampler::{SampleMode, sample};
