//! File-format adapters: still images through the `image` crate, video through the system
//! `ffmpeg`/`ffprobe` binaries.

pub mod ffmpeg;
pub mod image;
