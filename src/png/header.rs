//! The `IHDR` chunk: image dimensions, pixel encoding, and interlacing.

use crate::error::PngError;
use crate::pixel::ColorType;
use crate::PngResult;

/// Parsed `IHDR` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  pub width: u32,
  pub height: u32,
  pub bit_depth: u8,
  pub color_type: ColorType,
  pub interlaced: bool,
}
impl Header {
  /// Parses the 13-byte `IHDR` payload, validating the bit-depth table in
  /// full (not just that the color type and bit depth are individually
  /// in range).
  pub fn parse(payload: &[u8]) -> PngResult<Self> {
    let [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, compression, filter, interlace] =
      *payload
    else {
      return Err(PngError::IllegalIhdrLength);
    };
    let width = u32::from_be_bytes([w0, w1, w2, w3]);
    let height = u32::from_be_bytes([h0, h1, h2, h3]);
    if width == 0 || height == 0 {
      return Err(PngError::IllegalWidthOrHeightZero);
    }
    if compression != 0 || filter != 0 {
      return Err(PngError::IllegalAncillaryMethod);
    }
    let color_type = ColorType::try_from(color_type)?;
    let allowed: &[u8] = match color_type {
      ColorType::Grayscale => &[1, 2, 4, 8, 16],
      ColorType::Rgb => &[8, 16],
      ColorType::Palette => &[1, 2, 4, 8],
      ColorType::GrayscaleAlpha => &[8, 16],
      ColorType::RgbAlpha => &[8, 16],
    };
    if !allowed.contains(&bit_depth) {
      return Err(PngError::IllegalColorTypeBitDepthCombination);
    }
    let interlaced = match interlace {
      0 => false,
      1 => true,
      _ => return Err(PngError::IllegalInterlaceMethod),
    };
    Ok(Self { width, height, bit_depth, color_type, interlaced })
  }

  /// Bits per pixel, before any palette indirection.
  #[inline]
  pub const fn bits_per_pixel(&self) -> usize {
    self.bit_depth as usize * self.color_type.samples_per_pixel()
  }

  /// Byte distance back to the same sample in the pixel immediately to the
  /// left, for the scanline filter's `bpp` parameter.
  #[inline]
  pub const fn filter_bpp(&self) -> usize {
    let bpp = self.bits_per_pixel();
    if bpp < 8 {
      1
    } else {
      bpp / 8
    }
  }

  /// Bytes in one filtered scanline of an image (or Adam7 pass) `width`
  /// pixels wide, including the leading filter-selector byte.
  #[inline]
  pub const fn bytes_per_filterline(&self, width: u32) -> usize {
    1 + (self.bits_per_pixel() * width as usize).div_ceil(8)
  }
}
