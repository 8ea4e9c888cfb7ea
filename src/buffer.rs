use crate::foundation::error::{DotMatrixError, DotMatrixResult};

/// Byte layout of one pixel. Both layouts are 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// `r, g, b`
    Rgb8,
    /// `r, g, b, a` with straight (non-premultiplied) alpha.
    Rgba8,
}

impl ChannelLayout {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// A `width × height` image, row-major and tightly packed.
///
/// Invariant: `data.len() == width * height * layout.channels()` and both dimensions are non-zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing pixel bytes, validating the size invariant.
    pub fn new(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> DotMatrixResult<Self> {
        let expected = byte_len(width, height, layout)?;
        if data.len() != expected {
            return Err(DotMatrixError::invalid_buffer(format!(
                "{}x{} {:?} buffer needs {expected} bytes, got {}",
                width,
                height,
                layout,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// A buffer with every pixel set to `rgba`. The alpha byte is dropped for [`ChannelLayout::Rgb8`].
    pub fn filled(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        rgba: [u8; 4],
    ) -> DotMatrixResult<Self> {
        let len = byte_len(width, height, layout)?;
        let px = &rgba[..layout.channels()];
        let mut data = Vec::with_capacity(len);
        for _ in 0..(len / px.len()) {
            data.extend_from_slice(px);
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channel bytes of the pixel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.layout.channels();
        let off = (y as usize * self.width as usize + x as usize) * c;
        Some(&self.data[off..off + c])
    }

    /// Write `rgba` into the half-open span `[x0, x1)` of row `y`. Clipped to the buffer.
    pub(crate) fn fill_span(&mut self, y: u32, x0: u32, x1: u32, rgba: [u8; 4]) {
        if y >= self.height {
            return;
        }
        let x1 = x1.min(self.width);
        if x0 >= x1 {
            return;
        }
        let c = self.layout.channels();
        let row = y as usize * self.width as usize;
        let start = (row + x0 as usize) * c;
        let end = (row + x1 as usize) * c;
        for px in self.data[start..end].chunks_exact_mut(c) {
            px.copy_from_slice(&rgba[..c]);
        }
    }

    /// Copy out as RGBA8, filling alpha with 255 for RGB input.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.layout {
            ChannelLayout::Rgba8 => self.data.clone(),
            ChannelLayout::Rgb8 => {
                let mut out = Vec::with_capacity(self.data.len() / 3 * 4);
                for px in self.data.chunks_exact(3) {
                    out.extend_from_slice(px);
                    out.push(255);
                }
                out
            }
        }
    }
}

fn byte_len(width: u32, height: u32, layout: ChannelLayout) -> DotMatrixResult<usize> {
    if width == 0 || height == 0 {
        return Err(DotMatrixError::invalid_buffer(
            "buffer width/height must be non-zero",
        ));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(layout.channels()))
        .ok_or_else(|| {
            DotMatrixError::invalid_buffer(format!("{width}x{height} buffer size overflows"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates_length_and_dimensions() {
        assert!(PixelBuffer::new(2, 2, ChannelLayout::Rgb8, vec![0; 12]).is_ok());
        assert!(PixelBuffer::new(2, 2, ChannelLayout::Rgba8, vec![0; 12]).is_err());
        assert!(PixelBuffer::new(0, 2, ChannelLayout::Rgb8, vec![]).is_err());
        assert!(PixelBuffer::new(2, 0, ChannelLayout::Rgba8, vec![]).is_err());
    }

    #[test]
    fn filled_drops_alpha_for_rgb() {
        let buf = PixelBuffer::filled(3, 1, ChannelLayout::Rgb8, [1, 2, 3, 4]).unwrap();
        assert_eq!(buf.data(), &[1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn pixel_reads_row_major() {
        let data = (0u8..16).collect::<Vec<_>>();
        let buf = PixelBuffer::new(2, 2, ChannelLayout::Rgba8, data).unwrap();
        assert_eq!(buf.pixel(1, 0), Some(&[4u8, 5, 6, 7][..]));
        assert_eq!(buf.pixel(0, 1), Some(&[8u8, 9, 10, 11][..]));
        assert_eq!(buf.pixel(2, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
    }

    #[test]
    fn fill_span_clips_to_row() {
        let mut buf = PixelBuffer::filled(3, 2, ChannelLayout::Rgb8, [0, 0, 0, 255]).unwrap();
        buf.fill_span(1, 1, 10, [9, 9, 9, 255]);
        buf.fill_span(5, 0, 3, [7, 7, 7, 255]);
        assert_eq!(
            buf.data(),
            &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9, 9, 9, 9, 9, 9]
        );
    }

    #[test]
    fn to_rgba8_expands_rgb() {
        let buf = PixelBuffer::new(1, 1, ChannelLayout::Rgb8, vec![10, 20, 30]).unwrap();
        assert_eq!(buf.to_rgba8(), vec![10, 20, 30, 255]);
    }
}
