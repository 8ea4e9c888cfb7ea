//! Dot-matrix rasterization: per-cell brightness sampling and dot drawing.

pub mod dots;
pub mod sampler;
