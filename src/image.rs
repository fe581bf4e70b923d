//! The owned image buffer a full decode produces, and the allocator hook
//! that controls how it's backed.

use alloc::vec::Vec;

use crate::error::PngError;
use crate::PngResult;

/// Dimensions and alpha presence, without any pixel data. What an
/// info-only decode returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
  pub width: u32,
  pub height: u32,
  pub has_alpha: bool,
}

/// A fully decoded image: `stride * height` bytes of 32-bpp pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
  pub width: u32,
  pub height: u32,
  /// Byte stride of one row. Always `width * 4` unless a caller-supplied
  /// [`ImageAllocator`] chose something larger.
  pub stride: usize,
  pub has_alpha: bool,
  pub pixels: Vec<u8>,
}
impl Image {
  /// The four bytes at `(x, y)`, or `None` if out of bounds.
  #[inline]
  pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let off = y as usize * self.stride + x as usize * 4;
    Some(self.pixels[off..off + 4].try_into().unwrap())
  }
}

/// What a full decode call returns: either a complete pixel buffer, or
/// (when [`crate::png::DecodeFlags::INFO_ONLY`] is set) just the header
/// facts gathered before decoding stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
  Full(Image),
  Info(ImageInfo),
}

/// Chooses how the pixel buffer behind a decoded [`Image`] is backed.
///
/// The default implementation ([`VecAllocator`]) always picks
/// `stride == width * 4`. A caller-supplied implementation may choose a
/// larger stride (e.g. to satisfy an external API's row-alignment
/// requirement), but this crate does not itself support arbitrary strides
/// beyond what the allocator returns.
pub trait ImageAllocator {
  /// Returns a zero-filled buffer and the stride (in bytes) it should be
  /// read with. `stride` must be at least `width * 4`.
  fn allocate(&mut self, width: u32, height: u32) -> PngResult<(Vec<u8>, usize)>;
}

/// The default [`ImageAllocator`]: a `Vec<u8>` with `stride == width * 4`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VecAllocator;
impl ImageAllocator for VecAllocator {
  fn allocate(&mut self, width: u32, height: u32) -> PngResult<(Vec<u8>, usize)> {
    // stride is checked against u32::MAX in 64-bit arithmetic first, since
    // `width * 4` as a plain `usize` multiply never overflows on a 64-bit
    // target and would otherwise let this ceiling go unchecked there.
    let stride_u64 = width as u64 * 4;
    if stride_u64 > u32::MAX as u64 {
      return Err(PngError::ImageTooLarge);
    }
    let total_u64 = stride_u64.checked_mul(height as u64).ok_or(PngError::Allocation)?;
    if total_u64 > usize::MAX as u64 {
      return Err(PngError::Allocation);
    }
    let stride = stride_u64 as usize;
    let total = total_u64 as usize;
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(total)?;
    pixels.resize(total, 0);
    Ok((pixels, stride))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vec_allocator_stride_is_width_times_four() {
    let mut alloc = VecAllocator;
    let (buf, stride) = alloc.allocate(3, 2).unwrap();
    assert_eq!(stride, 12);
    assert_eq!(buf.len(), 24);
    assert!(buf.iter().all(|&b| b == 0));
  }

  #[test]
  fn get_pixel_reads_the_right_offset() {
    let mut alloc = VecAllocator;
    let (mut buf, stride) = alloc.allocate(2, 2).unwrap();
    buf[stride + 4..stride + 8].copy_from_slice(&[1, 2, 3, 4]);
    let img = Image { width: 2, height: 2, stride, has_alpha: false, pixels: buf };
    assert_eq!(img.get_pixel(1, 1), Some([1, 2, 3, 4]));
    assert_eq!(img.get_pixel(2, 0), None);
  }
}
