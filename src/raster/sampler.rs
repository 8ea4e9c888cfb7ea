use crate::{
    buffer::PixelBuffer,
    foundation::error::{DotMatrixError, DotMatrixResult},
    raster::dots::RenderParams,
};

/// How a grid cell's brightness is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// The single pixel at the cell's top-left corner.
    #[default]
    TopLeft,
    /// Mean over the cell's `dot_size × dot_size` block, clipped to the buffer. Changes output.
    BlockAverage,
}

/// Brightness in `[0, 1]` of the cell whose top-left corner is `(cell_x, cell_y)`.
///
/// Brightness of a pixel is the mean of its red, green, and blue bytes over 255; alpha is ignored.
pub fn sample(
    buffer: &PixelBuffer,
    cell_x: u32,
    cell_y: u32,
    params: &RenderParams,
) -> DotMatrixResult<f64> {
    let Some(px) = buffer.pixel(cell_x, cell_y) else {
        return Err(DotMatrixError::OutOfBounds {
            x: cell_x,
            y: cell_y,
            width: buffer.width(),
            height: buffer.height(),
        });
    };

    match params.sampling {
        SampleMode::TopLeft => Ok(f64::from(rgb_sum(px)) / 765.0),
        SampleMode::BlockAverage => Ok(block_average(buffer, cell_x, cell_y, params.dot_size)),
    }
}

fn block_average(buffer: &PixelBuffer, cell_x: u32, cell_y: u32, dot_size: u32) -> f64 {
    let size = dot_size.max(1);
    let x_end = cell_x.saturating_add(size).min(buffer.width());
    let y_end = cell_y.saturating_add(size).min(buffer.height());

    let mut sum = 0u64;
    let mut count = 0u64;
    for y in cell_y..y_end {
        for x in cell_x..x_end {
            if let Some(px) = buffer.pixel(x, y) {
                sum += u64::from(rgb_sum(px));
                count += 1;
            }
        }
    }
    // `count >= 1`: the caller already checked that the top-left pixel exists.
    sum as f64 / (count.max(1) as f64 * 765.0)
}

fn rgb_sum(px: &[u8]) -> u32 {
    u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2])
}
