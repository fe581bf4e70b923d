//! Converts one already-unfiltered PNG scanline to 32-bpp RGBA (or BGRA) at
//! the final destination, and the small set of whole-pixel transforms
//! (premultiply/unpremultiply, channel swap) applied after.

use bitfrob::{u8_bit_split_1x8_rev, u8_bit_split_2x4_rev, u8_bit_split_4x2_rev};
use pixel_formats::r8g8b8a8_Unorm;

use crate::error::PngError;
use crate::PngResult;

/// The five pixel encodings PNG's `color_type` byte names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
  Grayscale,
  Rgb,
  Palette,
  GrayscaleAlpha,
  RgbAlpha,
}
impl ColorType {
  /// Samples per pixel before any palette indirection, i.e. the table in
  /// section 3 of the PNG spec.
  #[inline]
  pub const fn samples_per_pixel(self) -> usize {
    match self {
      Self::Grayscale => 1,
      Self::Rgb => 3,
      Self::Palette => 1,
      Self::GrayscaleAlpha => 2,
      Self::RgbAlpha => 4,
    }
  }

  /// Whether this color type carries its own alpha channel (as opposed to
  /// alpha coming from a palette's `tRNS` or a single-color key).
  #[inline]
  pub const fn has_native_alpha(self) -> bool {
    matches!(self, Self::GrayscaleAlpha | Self::RgbAlpha)
  }
}
impl TryFrom<u8> for ColorType {
  type Error = PngError;
  #[inline]
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0 => Self::Grayscale,
      2 => Self::Rgb,
      3 => Self::Palette,
      4 => Self::GrayscaleAlpha,
      6 => Self::RgbAlpha,
      _ => return Err(PngError::IllegalColorTypeBitDepthCombination),
    })
  }
}

/// A single-color transparency key from `tRNS`, in the sample's native bit
/// depth (not yet reduced to 8 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransparencyKey {
  pub r: u16,
  pub g: u16,
  pub b: u16,
}

/// Reduces a 16-bit sample to 8 bits using the same formula libpng does,
/// `(v * 255 + 32895) >> 16`, which rounds to the nearest integer.
#[inline]
pub const fn reduce_16_to_8(v: u16) -> u8 {
  (((v as u32) * 255 + 32895) >> 16) as u8
}

/// Scales an `n`-bit sample (`n` in `{1,2,4,8}`) up to 8 bits by the exact
/// `v * 255 / (2^n - 1)` formula.
#[inline]
fn scale_sub_byte_sample(v: u8, bit_depth: u8) -> u8 {
  let max = (1u32 << bit_depth) - 1;
  ((v as u32 * 255) / max) as u8
}

/// Unpacks one unfiltered scanline (the bytes after the filter-selector
/// byte) into `width` RGBA pixels written to `dest`.
///
/// `dest` must be exactly `width * 4` bytes. `palette` is required and
/// must have at least as many entries as the largest index the data can
/// contain when `color_type` is [`ColorType::Palette`].
#[allow(clippy::too_many_arguments)]
pub fn unpack_scanline_to_rgba(
  color_type: ColorType, bit_depth: u8, width: u32, line: &[u8],
  palette: Option<&[r8g8b8a8_Unorm]>, trns: Option<TransparencyKey>, dest: &mut [u8],
) -> PngResult<()> {
  debug_assert_eq!(dest.len(), width as usize * 4);

  // Fast paths for the common 8-bit shapes: no key, straight memory shapes.
  match (color_type, bit_depth, trns) {
    (ColorType::Grayscale, 8, None) => {
      for (src, dst) in line.iter().zip(dest.chunks_exact_mut(4)) {
        dst.copy_from_slice(&[*src, *src, *src, 255]);
      }
      return Ok(());
    }
    (ColorType::Rgb, 8, None) => {
      for (src, dst) in line.chunks_exact(3).zip(dest.chunks_exact_mut(4)) {
        dst.copy_from_slice(&[src[0], src[1], src[2], 255]);
      }
      return Ok(());
    }
    (ColorType::GrayscaleAlpha, 8, _) => {
      for (src, dst) in line.chunks_exact(2).zip(dest.chunks_exact_mut(4)) {
        dst.copy_from_slice(&[src[0], src[0], src[0], src[1]]);
      }
      return Ok(());
    }
    (ColorType::RgbAlpha, 8, _) => {
      dest.copy_from_slice(&line[..dest.len()]);
      return Ok(());
    }
    (ColorType::Palette, 8, _) => {
      let palette = palette.ok_or(PngError::IllegalPalette)?;
      for (&idx, dst) in line.iter().zip(dest.chunks_exact_mut(4)) {
        let entry = palette.get(idx as usize).ok_or(PngError::PaletteIndexOutOfRange)?;
        dst.copy_from_slice(bytemuck::bytes_of(entry));
      }
      return Ok(());
    }
    _ => {}
  }

  // Slow path: sub-byte depths, 16-bit depths, and the 8-bit-with-key
  // subcases all funnel through per-pixel sample extraction.
  let mut write_gray = |x: usize, v16: u16, is_16: bool| -> PngResult<()> {
    let v8 = if is_16 { reduce_16_to_8(v16) } else { scale_sub_byte_sample(v16 as u8, bit_depth) };
    let a = match trns {
      Some(key) if key.r == v16 => 0,
      _ => 255,
    };
    let dst = &mut dest[x * 4..x * 4 + 4];
    dst.copy_from_slice(&[v8, v8, v8, a]);
    Ok(())
  };

  match color_type {
    ColorType::Grayscale => match bit_depth {
      1 => {
        for (byte_i, byte) in line.iter().enumerate() {
          for (plus_x, pix) in u8_bit_split_1x8_rev(*byte).into_iter().enumerate() {
            let x = byte_i * 8 + plus_x;
            if x >= width as usize {
              break;
            }
            write_gray(x, pix as u16, false)?;
          }
        }
      }
      2 => {
        for (byte_i, byte) in line.iter().enumerate() {
          for (plus_x, pix) in u8_bit_split_2x4_rev(*byte).into_iter().enumerate() {
            let x = byte_i * 4 + plus_x;
            if x >= width as usize {
              break;
            }
            write_gray(x, pix as u16, false)?;
          }
        }
      }
      4 => {
        for (byte_i, byte) in line.iter().enumerate() {
          for (plus_x, pix) in u8_bit_split_4x2_rev(*byte).into_iter().enumerate() {
            let x = byte_i * 2 + plus_x;
            if x >= width as usize {
              break;
            }
            write_gray(x, pix as u16, false)?;
          }
        }
      }
      8 => {
        for (x, &v) in line.iter().enumerate() {
          write_gray(x, v as u16, false)?;
        }
      }
      16 => {
        for (x, chunk) in line.chunks_exact(2).enumerate() {
          let v = u16::from_be_bytes([chunk[0], chunk[1]]);
          write_gray(x, v, true)?;
        }
      }
      _ => return Err(PngError::IllegalColorTypeBitDepthCombination),
    },
    ColorType::Palette => {
      let palette = palette.ok_or(PngError::IllegalPalette)?;
      let mut write_index = |x: usize, idx: u8| -> PngResult<()> {
        if x >= width as usize {
          return Ok(());
        }
        let entry = palette.get(idx as usize).ok_or(PngError::PaletteIndexOutOfRange)?;
        dest[x * 4..x * 4 + 4].copy_from_slice(bytemuck::bytes_of(entry));
        Ok(())
      };
      match bit_depth {
        1 => {
          for (byte_i, byte) in line.iter().enumerate() {
            for (plus_x, pix) in u8_bit_split_1x8_rev(*byte).into_iter().enumerate() {
              write_index(byte_i * 8 + plus_x, pix)?;
            }
          }
        }
        2 => {
          for (byte_i, byte) in line.iter().enumerate() {
            for (plus_x, pix) in u8_bit_split_2x4_rev(*byte).into_iter().enumerate() {
              write_index(byte_i * 4 + plus_x, pix)?;
            }
          }
        }
        4 => {
          for (byte_i, byte) in line.iter().enumerate() {
            for (plus_x, pix) in u8_bit_split_4x2_rev(*byte).into_iter().enumerate() {
              write_index(byte_i * 2 + plus_x, pix)?;
            }
          }
        }
        _ => return Err(PngError::IllegalColorTypeBitDepthCombination),
      }
    }
    ColorType::Rgb => match bit_depth {
      16 => {
        for (x, chunk) in line.chunks_exact(6).enumerate() {
          if x >= width as usize {
            break;
          }
          let r16 = u16::from_be_bytes([chunk[0], chunk[1]]);
          let g16 = u16::from_be_bytes([chunk[2], chunk[3]]);
          let b16 = u16::from_be_bytes([chunk[4], chunk[5]]);
          let a = match trns {
            Some(key) if key.r == r16 && key.g == g16 && key.b == b16 => 0,
            _ => 255,
          };
          let dst = &mut dest[x * 4..x * 4 + 4];
          dst.copy_from_slice(&[reduce_16_to_8(r16), reduce_16_to_8(g16), reduce_16_to_8(b16), a]);
        }
      }
      8 => {
        // only reached with a tRNS key (the no-key case is a fast path).
        for (x, chunk) in line.chunks_exact(3).enumerate() {
          if x >= width as usize {
            break;
          }
          let (r, g, b) = (chunk[0], chunk[1], chunk[2]);
          let a = match trns {
            Some(key) if key.r == r as u16 && key.g == g as u16 && key.b == b as u16 => 0,
            _ => 255,
          };
          dest[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, a]);
        }
      }
      _ => return Err(PngError::IllegalColorTypeBitDepthCombination),
    },
    ColorType::GrayscaleAlpha => {
      if bit_depth != 16 {
        return Err(PngError::IllegalColorTypeBitDepthCombination);
      }
      for (x, chunk) in line.chunks_exact(4).enumerate() {
        if x >= width as usize {
          break;
        }
        let v = reduce_16_to_8(u16::from_be_bytes([chunk[0], chunk[1]]));
        let a = reduce_16_to_8(u16::from_be_bytes([chunk[2], chunk[3]]));
        dest[x * 4..x * 4 + 4].copy_from_slice(&[v, v, v, a]);
      }
    }
    ColorType::RgbAlpha => {
      if bit_depth != 16 {
        return Err(PngError::IllegalColorTypeBitDepthCombination);
      }
      for (x, chunk) in line.chunks_exact(8).enumerate() {
        if x >= width as usize {
          break;
        }
        let r = reduce_16_to_8(u16::from_be_bytes([chunk[0], chunk[1]]));
        let g = reduce_16_to_8(u16::from_be_bytes([chunk[2], chunk[3]]));
        let b = reduce_16_to_8(u16::from_be_bytes([chunk[4], chunk[5]]));
        let a = reduce_16_to_8(u16::from_be_bytes([chunk[6], chunk[7]]));
        dest[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, a]);
      }
    }
  }
  Ok(())
}

/// Premultiplies one RGBA pixel's color channels by its alpha.
///
/// `a == 0` zeroes the color channels outright (no rounding needed); for
/// `0 < a < 255` each channel becomes `(a * c + 127) / 255`. `a == 255`
/// is left untouched.
#[inline]
pub fn premultiply(px: &mut [u8; 4]) {
  let a = px[3] as u32;
  if a == 0 {
    px[0] = 0;
    px[1] = 0;
    px[2] = 0;
  } else if a < 255 {
    for c in &mut px[..3] {
      *c = ((a * (*c as u32) + 127) / 255) as u8;
    }
  }
}

/// Reverses [`premultiply`]: for `0 < a < 255`, each channel becomes
/// `255 * c / a`. `a == 0` and `a == 255` are left untouched (there is no
/// information to recover when `a == 0`).
#[inline]
pub fn unpremultiply(px: &mut [u8; 4]) {
  let a = px[3] as u32;
  if a != 0 && a < 255 {
    for c in &mut px[..3] {
      *c = ((255 * (*c as u32)) / a) as u8;
    }
  }
}

/// Swaps the R and B channels of one RGBA/BGRA pixel in place.
#[inline]
pub fn swap_red_blue(px: &mut [u8; 4]) {
  px.swap(0, 2);
}
