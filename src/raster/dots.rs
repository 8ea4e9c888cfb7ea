use crate::{
    buffer::PixelBuffer,
    foundation::error::{DotMatrixError, DotMatrixResult},
    raster::sampler::{SampleMode, sample},
};

/// Output background (opaque black).
pub const BACKGROUND_RGBA: [u8; 4] = [0, 0, 0, 255];
/// Dot color (opaque white).
pub const FOREGROUND_RGBA: [u8; 4] = [255, 255, 255, 255];
/// Dots with a radius at or below this many pixels are not drawn.
pub const DEAD_ZONE_RADIUS: f64 = 0.5;

/// Grid layout for one render call (and for every frame of one video job).
///
/// Invariant: `dot_size + spacing > 0`, checked by [`RenderParams::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Cell size in pixels; a full-brightness dot has diameter `dot_size`.
    pub dot_size: u32,
    /// Gap between cells in pixels.
    pub spacing: u32,
    pub sampling: SampleMode,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            dot_size: 10,
            spacing: 2,
            sampling: SampleMode::TopLeft,
        }
    }
}

impl RenderParams {
    /// Validated params using the default [`SampleMode::TopLeft`] sampling.
    pub fn new(dot_size: u32, spacing: u32) -> DotMatrixResult<Self> {
        let params = Self {
            dot_size,
            spacing,
            sampling: SampleMode::TopLeft,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_sampling(mut self, sampling: SampleMode) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn validate(&self) -> DotMatrixResult<()> {
        match self.dot_size.checked_add(self.spacing) {
            Some(0) => Err(DotMatrixError::invalid_params(
                "dot_size + spacing must be > 0",
            )),
            None => Err(DotMatrixError::invalid_params(
                "dot_size + spacing overflows",
            )),
            Some(_) => Ok(()),
        }
    }

    /// Distance between neighbouring cell origins.
    pub fn pitch(&self) -> u32 {
        self.dot_size.saturating_add(self.spacing)
    }

    /// Params for a source downscaled by `factor`.
    ///
    /// `dot_size` never drops below 1. A non-zero `spacing` never drops below 1; zero stays zero.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |v: u32| ((f64::from(v) * factor) as u32).max(1);
        Self {
            dot_size: scale(self.dot_size),
            spacing: if self.spacing == 0 {
                0
            } else {
                scale(self.spacing)
            },
            sampling: self.sampling,
        }
    }
}

/// Dot radius for a cell of the given brightness, capped at `dot_size / 2`.
pub fn dot_radius(brightness: f64, dot_size: u32) -> f64 {
    let half = f64::from(dot_size) / 2.0;
    (brightness * half).clamp(0.0, half)
}

/// Top-left corners of every grid cell, row by row.
///
/// `params` must be valid; a zero pitch yields no cells.
pub fn grid_cells(
    width: u32,
    height: u32,
    params: &RenderParams,
) -> impl Iterator<Item = (u32, u32)> + use<> {
    let pitch = params.pitch() as usize;
    let rows = if pitch == 0 { 0 } else { height };
    (0..rows)
        .step_by(pitch.max(1))
        .flat_map(move |y| (0..width).step_by(pitch.max(1)).map(move |x| (x, y)))
}

/// Render `input` as white dots on black. The output has the input's size and channel layout.
#[tracing::instrument(
    level = "trace",
    skip(input),
    fields(width = input.width(), height = input.height())
)]
pub fn render(input: &PixelBuffer, params: &RenderParams) -> DotMatrixResult<PixelBuffer> {
    params.validate()?;

    let mut out = PixelBuffer::filled(
        input.width(),
        input.height(),
        input.layout(),
        BACKGROUND_RGBA,
    )?;

    let mut drawn = 0usize;
    for (x, y) in grid_cells(input.width(), input.height(), params) {
        let brightness = sample(input, x, y, params)?;
        let radius = dot_radius(brightness, params.dot_size);
        if radius > DEAD_ZONE_RADIUS {
            draw_dot(&mut out, x, y, params.dot_size, radius);
            drawn += 1;
        }
    }

    tracing::trace!(drawn, "dots drawn");
    Ok(out)
}

/// Fill the disc of `radius` centered in the cell at `(cell_x, cell_y)`.
///
/// A pixel is lit when its center lies within `radius` of the disc center. The pixels nearest the
/// center are always lit: one pixel for an odd `dot_size`, the central 2×2 block for an even one.
/// Writes never leave the cell's `dot_size × dot_size` box.
fn draw_dot(out: &mut PixelBuffer, cell_x: u32, cell_y: u32, dot_size: u32, radius: f64) {
    let half = f64::from(dot_size) / 2.0;
    let cx = f64::from(cell_x) + half;
    let cy = f64::from(cell_y) + half;
    let r2 = (radius * radius).max(nearest_center_dist2(dot_size));

    let x_end = cell_x.saturating_add(dot_size).min(out.width());
    let y_end = cell_y.saturating_add(dot_size).min(out.height());

    for py in cell_y..y_end {
        let dy = f64::from(py) + 0.5 - cy;
        let dy2 = dy * dy;
        if dy2 > r2 {
            continue;
        }
        let lit = |px: u32| {
            let dx = f64::from(px) + 0.5 - cx;
            dx * dx + dy2 <= r2
        };

        // Rows of a disc are contiguous.
        let Some(x0) = (cell_x..x_end).find(|&px| lit(px)) else {
            continue;
        };
        let x1 = (x0..x_end).take_while(|&px| lit(px)).last().map_or(x0, |l| l + 1);
        out.fill_span(py, x0, x1, FOREGROUND_RGBA);
    }
}

/// Squared distance from a dot center to the nearest pixel center: 0 when `dot_size` is odd,
/// 0.5 when the center falls on a pixel corner.
fn nearest_center_dist2(dot_size: u32) -> f64 {
    if dot_size.is_multiple_of(2) { 0.5 } else { 0.0 }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/dots.rs"]
mod tests;
