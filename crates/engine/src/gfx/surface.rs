use crate::types::CodecError;

/// A decoded, fixed-size rectangular pixel grid (row-major, one byte
/// per palette index).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Result<Self, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::BadDimensions { width, height });
        }
        Ok(Self { width, height, pixels: vec![0; width as usize * height as usize] })
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CodecError> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize {
            return Err(CodecError::BadDimensions { width, height });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// The world surface: a 2-D pixel buffer that may be larger than the
/// viewport to support scrolling. Mutated only through compositor
/// write calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: i32,
    height: i32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0);
        Self { width, height, pixels: vec![0; (width * height) as usize] }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn pixel(&self, x: i32, y: i32) -> u8 {
        debug_assert!(self.in_bounds(x, y));
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: u8) {
        debug_assert!(self.in_bounds(x, y));
        self.pixels[(y * self.width + x) as usize] = color;
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn fill(&mut self, color: u8) {
        self.pixels.fill(color);
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(Image::new(0, 4).is_err());
        assert!(Image::new(4, 0).is_err());
    }

    #[test]
    fn oversized_dimensions_do_not_wrap_the_length_check() {
        // 65536 * 65536 wraps to zero in u32; the length check must
        // not be fooled by it.
        assert!(Image::from_pixels(1 << 16, 1 << 16, Vec::new()).is_err());
    }
}
