//! `PLTE` and `tRNS` handling.

use crate::error::PngError;
use crate::pixel::{premultiply, ColorType, TransparencyKey};
use crate::PngResult;
use pixel_formats::r8g8b8a8_Unorm;

const OPAQUE_BLACK: r8g8b8a8_Unorm = r8g8b8a8_Unorm { r: 0, g: 0, b: 0, a: 255 };

/// Up to 256 RGBA entries built from `PLTE` (and optionally `tRNS`).
#[derive(Clone, Copy)]
pub struct Palette {
  entries: [r8g8b8a8_Unorm; 256],
  len: usize,
}
impl Palette {
  /// Parses a `PLTE` payload: a positive multiple of 3 bytes, at most 768
  /// (256 entries). Alpha starts at 255 for every entry; `tRNS` overwrites
  /// it afterward if present.
  pub fn parse(payload: &[u8]) -> PngResult<Self> {
    if payload.is_empty() || payload.len() % 3 != 0 || payload.len() > 768 {
      return Err(PngError::IllegalPalette);
    }
    let mut entries = [OPAQUE_BLACK; 256];
    for (entry, rgb) in entries.iter_mut().zip(payload.chunks_exact(3)) {
      *entry = r8g8b8a8_Unorm { r: rgb[0], g: rgb[1], b: rgb[2], a: 255 };
    }
    Ok(Self { entries, len: payload.len() / 3 })
  }

  #[inline]
  pub fn as_slice(&self) -> &[r8g8b8a8_Unorm] {
    &self.entries[..self.len]
  }

  /// Applies a `tRNS` chunk's per-index alpha overrides. `payload.len()`
  /// must not exceed the palette's entry count; `premultiply_alpha` mirrors
  /// the straight-vs-premultiplied decode flag, since a premultiplied
  /// output needs palette colors already scaled by their new alpha.
  pub fn apply_trns(&mut self, payload: &[u8], premultiply_alpha: bool) -> PngResult<()> {
    if payload.len() > self.len {
      return Err(PngError::IllegalTransparency);
    }
    for (entry, &a) in self.entries[..self.len].iter_mut().zip(payload) {
      entry.a = a;
      if premultiply_alpha {
        let mut raw: [u8; 4] = bytemuck::cast(*entry);
        premultiply(&mut raw);
        *entry = bytemuck::cast(raw);
      }
    }
    Ok(())
  }
}

/// Parses a `tRNS` payload for the non-palette color types it is legal for.
/// `GrayscaleAlpha` and `RgbAlpha` already carry alpha and must not have a
/// `tRNS` chunk at all.
pub fn parse_transparency_key(color_type: ColorType, payload: &[u8]) -> PngResult<TransparencyKey> {
  match color_type {
    ColorType::Grayscale => match payload {
      [hi, lo] => Ok(TransparencyKey { r: u16::from_be_bytes([*hi, *lo]), g: 0, b: 0 }),
      _ => Err(PngError::IllegalTransparency),
    },
    ColorType::Rgb => match payload {
      [rh, rl, gh, gl, bh, bl] => Ok(TransparencyKey {
        r: u16::from_be_bytes([*rh, *rl]),
        g: u16::from_be_bytes([*gh, *gl]),
        b: u16::from_be_bytes([*bh, *bl]),
      }),
      _ => Err(PngError::IllegalTransparency),
    },
    ColorType::Palette | ColorType::GrayscaleAlpha | ColorType::RgbAlpha => {
      Err(PngError::IllegalTransparency)
    }
  }
}
