//! Decode options, a plain bitmask struct in the same const-combine style
//! the header's [`crate::pixel::ColorType`] and the teacher's `PngColorType`
//! use — no `bitflags` dependency.

/// Independent decode options. The default value decodes to straight-alpha
/// RGBA, top row first, with a full (non-info-only) decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeFlags(u8);
impl DecodeFlags {
  /// Swap the R and B channels of the output (BGRA instead of RGBA).
  pub const BGRA: Self = Self(1 << 0);
  /// Premultiply color channels by alpha in the output.
  pub const PREMULTIPLIED: Self = Self(1 << 1);
  /// Write the bottommost source row first instead of the topmost.
  pub const FLIP_Y: Self = Self(1 << 2);
  /// Stop as soon as dimensions and alpha presence are known, without
  /// decompressing or allocating pixel memory.
  pub const INFO_ONLY: Self = Self(1 << 3);

  /// No options set: straight-alpha RGBA, top row first, full decode.
  #[inline]
  pub const fn none() -> Self {
    Self(0)
  }

  #[inline]
  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  #[inline]
  pub const fn union(self, other: Self) -> Self {
    Self(self.0 | other.0)
  }
}
impl Default for DecodeFlags {
  #[inline]
  fn default() -> Self {
    Self::none()
  }
}
impl core::ops::BitOr for DecodeFlags {
  type Output = Self;
  #[inline]
  fn bitor(self, rhs: Self) -> Self {
    self.union(rhs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn combining_flags_with_bitor_is_queryable_with_contains() {
    let flags = DecodeFlags::BGRA | DecodeFlags::PREMULTIPLIED;
    assert!(flags.contains(DecodeFlags::BGRA));
    assert!(flags.contains(DecodeFlags::PREMULTIPLIED));
    assert!(!flags.contains(DecodeFlags::FLIP_Y));
  }

  #[test]
  fn default_is_empty() {
    assert_eq!(DecodeFlags::default(), DecodeFlags::none());
  }
}
