//! The driver: chunk dispatch, feeding the inflater, and the per-scanline
//! filter/pixel/Adam7 pipeline.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::adam7;
use crate::error::PngError;
use crate::filter;
use crate::image::{DecodeOutcome, Image, ImageAllocator, ImageInfo, VecAllocator};
use crate::inflate::{InflateStatus, Inflater};
use crate::pixel::{self, ColorType, TransparencyKey};
use crate::PngResult;

use super::chunk::{strip_signature, ChunkIter};
use super::flags::DecodeFlags;
use super::header::Header;
use super::palette::{parse_transparency_key, Palette};

/// Decodes a complete in-memory PNG with the default allocator.
pub fn decode(png: &[u8], flags: DecodeFlags) -> PngResult<DecodeOutcome> {
  decode_with_allocator(png, flags, &mut VecAllocator)
}

/// Decodes a complete in-memory PNG, letting the caller control how the
/// output pixel buffer is backed.
pub fn decode_with_allocator<A: ImageAllocator>(
  png: &[u8], flags: DecodeFlags, allocator: &mut A,
) -> PngResult<DecodeOutcome> {
  let after_sig = strip_signature(png)?;
  let mut chunks = ChunkIter::new(after_sig);

  let mut cgbi = false;
  let header = loop {
    let chunk = chunks.next().ok_or(PngError::MissingOrMisplacedIhdr)??;
    if chunk.is(b"CgBI") {
      cgbi = true;
      continue;
    }
    if chunk.is(b"IHDR") {
      break Header::parse(chunk.data)?;
    }
    return Err(PngError::MissingOrMisplacedIhdr);
  };

  let mut has_alpha = header.color_type.has_native_alpha();
  if flags.contains(DecodeFlags::INFO_ONLY) && has_alpha {
    return Ok(DecodeOutcome::Info(ImageInfo { width: header.width, height: header.height, has_alpha }));
  }

  let mut image: Option<(Vec<u8>, usize)> = if flags.contains(DecodeFlags::INFO_ONLY) {
    None
  } else {
    Some(allocator.allocate(header.width, header.height)?)
  };

  let mut palette: Option<Palette> = None;
  let mut color_key: Option<TransparencyKey> = None;
  let mut seen_idat = false;

  let mut inflater: Option<Box<Inflater>> = None;
  let mut pass_plan: Vec<(usize, u32, u32)> = Vec::new();
  let mut pass_cursor = 0usize;
  let mut row_in_pass = 0u32;
  let mut scan_buf: Vec<u8> = Vec::new();
  let mut prev_buf: Vec<u8> = Vec::new();
  let mut scan_cursor = 0usize;
  let mut row_temp: Vec<u8> = Vec::new();
  let mut decoding_done = false;

  for chunk in chunks {
    let chunk = chunk?;
    if chunk.is(b"IHDR") {
      return Err(PngError::MissingOrMisplacedIhdr);
    } else if chunk.is(b"CgBI") {
      // only meaningful before IHDR; harmless to see again, ignore.
    } else if chunk.is(b"PLTE") {
      if seen_idat {
        return Err(PngError::IllegalChunkOrder);
      }
      palette = Some(Palette::parse(chunk.data)?);
    } else if chunk.is(b"tRNS") {
      if seen_idat {
        return Err(PngError::IllegalChunkOrder);
      }
      match header.color_type {
        ColorType::Palette => {
          let pal = palette.as_mut().ok_or(PngError::IllegalTransparency)?;
          pal.apply_trns(chunk.data, flags.contains(DecodeFlags::PREMULTIPLIED))?;
        }
        ColorType::Grayscale | ColorType::Rgb => {
          color_key = Some(parse_transparency_key(header.color_type, chunk.data)?);
        }
        ColorType::GrayscaleAlpha | ColorType::RgbAlpha => {
          return Err(PngError::IllegalTransparency);
        }
      }
      has_alpha = true;
      if flags.contains(DecodeFlags::INFO_ONLY) {
        return Ok(DecodeOutcome::Info(ImageInfo { width: header.width, height: header.height, has_alpha }));
      }
    } else if chunk.is(b"IDAT") {
      seen_idat = true;
      if flags.contains(DecodeFlags::INFO_ONLY) {
        return Ok(DecodeOutcome::Info(ImageInfo { width: header.width, height: header.height, has_alpha }));
      }
      if decoding_done {
        continue;
      }
      if inflater.is_none() {
        inflater = Some(Box::new(if cgbi { Inflater::new_raw() } else { Inflater::new() }));
        pass_plan = build_pass_plan(&header);
        if pass_plan.is_empty() {
          decoding_done = true;
        } else {
          let line_len = header.bytes_per_filterline(pass_plan[0].1);
          scan_buf.clear();
          scan_buf.resize(line_len, 0);
          prev_buf.clear();
          prev_buf.resize(line_len, 0);
        }
      }
      let mut remaining = chunk.data;
      while !remaining.is_empty() && !decoding_done {
        let (pass, pass_width, pass_height) = pass_plan[pass_cursor];
        let inflater = inflater.as_mut().unwrap();
        let (consumed, written, status) =
          inflater.inflate(remaining, &mut scan_buf[scan_cursor..])?;
        remaining = &remaining[consumed..];
        scan_cursor += written;

        if scan_cursor == scan_buf.len() {
          process_scanline(
            &header,
            &mut scan_buf,
            &prev_buf,
            pass,
            pass_width,
            row_in_pass,
            palette.as_ref(),
            color_key,
            cgbi,
            flags,
            image.as_mut().expect("image buffer present for a non-info-only decode"),
            &mut row_temp,
          )?;
          core::mem::swap(&mut scan_buf, &mut prev_buf);
          scan_cursor = 0;
          row_in_pass += 1;
          if row_in_pass == pass_height {
            pass_cursor += 1;
            row_in_pass = 0;
            if pass_cursor < pass_plan.len() {
              let line_len = header.bytes_per_filterline(pass_plan[pass_cursor].1);
              scan_buf.clear();
              scan_buf.resize(line_len, 0);
              prev_buf.clear();
              prev_buf.resize(line_len, 0);
            } else {
              decoding_done = true;
            }
          }
        }

        if status == InflateStatus::NeedsInput && remaining.is_empty() {
          break;
        }
        if status == InflateStatus::Done {
          // The inflater reaching `Done` only means its own DEFLATE state
          // machine consumed a final block; it says nothing about whether
          // every scanline of every pass has actually been produced. Only
          // treat the image as complete when the pass plan is fully
          // consumed, so a stream that ends early still fails at `IEND`
          // instead of silently returning a partially-filled image.
          if pass_cursor == pass_plan.len() && row_in_pass == 0 {
            decoding_done = true;
          }
          break;
        }
      }
    } else if chunk.is(b"IEND") {
      if !chunk.data.is_empty() {
        return Err(PngError::IllegalIendLength);
      }
      if !flags.contains(DecodeFlags::INFO_ONLY) && !decoding_done {
        return Err(PngError::MissingImageDataAtIend);
      }
      let (pixels, stride) = image.take().expect("image buffer present at IEND for a full decode");
      return Ok(DecodeOutcome::Full(Image { width: header.width, height: header.height, stride, has_alpha, pixels }));
    }
    // any other chunk type: its payload was already consumed by the
    // iterator and its CRC discarded; nothing further to do.
  }

  Err(PngError::MissingImageDataAtIend)
}

/// The sequence of `(pass, width, height)` this header's image decodes as.
/// Non-interlaced images are modeled as a single pass `0` covering the
/// whole image; Adam7 images list only the passes with nonzero area.
fn build_pass_plan(header: &Header) -> Vec<(usize, u32, u32)> {
  let mut plan = Vec::new();
  if header.interlaced {
    for pass in 1..=7 {
      let (w, h) = adam7::pass_dimensions(pass, header.width, header.height);
      if w > 0 && h > 0 {
        plan.push((pass, w, h));
      }
    }
  } else {
    plan.push((0, header.width, header.height));
  }
  plan
}

/// Reverses the filter, transforms to RGBA, applies the `CgBI` fixup and the
/// caller's decode flags, and scatters the row into the destination image.
#[allow(clippy::too_many_arguments)]
fn process_scanline(
  header: &Header, scan_buf: &mut [u8], prev_buf: &[u8], pass: usize, pass_width: u32,
  row_in_pass: u32, palette: Option<&Palette>, color_key: Option<TransparencyKey>, cgbi: bool,
  flags: DecodeFlags, image: &mut (Vec<u8>, usize), row_temp: &mut Vec<u8>,
) -> PngResult<()> {
  let bpp = header.filter_bpp();
  let filter_type = scan_buf[0];
  filter::reconstruct_in_place(filter_type, &mut scan_buf[1..], &prev_buf[1..], bpp)?;

  row_temp.clear();
  row_temp.resize(pass_width as usize * 4, 0);
  pixel::unpack_scanline_to_rgba(
    header.color_type,
    header.bit_depth,
    pass_width,
    &scan_buf[1..],
    palette.map(Palette::as_slice),
    color_key,
    row_temp,
  )?;

  let (pixels, stride) = image;
  let stride = *stride;
  for rx in 0..pass_width {
    let off = rx as usize * 4;
    let mut px: [u8; 4] = row_temp[off..off + 4].try_into().unwrap();
    if cgbi {
      pixel::swap_red_blue(&mut px);
      pixel::unpremultiply(&mut px);
    }
    if flags.contains(DecodeFlags::PREMULTIPLIED) {
      pixel::premultiply(&mut px);
    }
    if flags.contains(DecodeFlags::BGRA) {
      pixel::swap_red_blue(&mut px);
    }

    let (full_x, full_y) =
      if pass == 0 { (rx, row_in_pass) } else { adam7::reduced_pos_to_full_pos(pass, rx, row_in_pass) };
    let dest_y = if flags.contains(DecodeFlags::FLIP_Y) { header.height - 1 - full_y } else { full_y };
    let dest_off = dest_y as usize * stride + full_x as usize * 4;
    pixels[dest_off..dest_off + 4].copy_from_slice(&px);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::png::flags::DecodeFlags;

  fn push_chunk(bytes: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
    bytes.extend_from_slice(tag);
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
  }

  fn zlib_wrap(raw_deflate_stored: &[u8]) -> Vec<u8> {
    let mut v = alloc::vec![0x78, 0x01];
    v.extend_from_slice(raw_deflate_stored);
    v
  }

  fn stored_block(payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.push(0b0000_0001u8);
    let len = payload.len() as u16;
    v.extend_from_slice(&len.to_le_bytes());
    v.extend_from_slice(&(!len).to_le_bytes());
    v.extend_from_slice(payload);
    v
  }

  fn build_png(ihdr: &[u8], idat_payload: &[u8]) -> Vec<u8> {
    let mut png = Vec::new();
    png.extend_from_slice(&super::super::chunk::SIGNATURE);
    push_chunk(&mut png, b"IHDR", ihdr);
    push_chunk(&mut png, b"IDAT", idat_payload);
    push_chunk(&mut png, b"IEND", &[]);
    png
  }

  fn ihdr_bytes(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&width.to_be_bytes());
    v.extend_from_slice(&height.to_be_bytes());
    v.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);
    v
  }

  #[test]
  fn smallest_valid_png_is_one_red_pixel() {
    let ihdr = ihdr_bytes(1, 1, 8, 2, 0);
    let idat = zlib_wrap(&stored_block(&[0x00, 0xFF, 0x00, 0x00]));
    let png = build_png(&ihdr, &idat);
    let outcome = decode(&png, DecodeFlags::none()).unwrap();
    match outcome {
      DecodeOutcome::Full(img) => {
        assert_eq!((img.width, img.height), (1, 1));
        assert!(!img.has_alpha);
        assert_eq!(img.get_pixel(0, 0), Some([0xFF, 0x00, 0x00, 0xFF]));
      }
      DecodeOutcome::Info(_) => panic!("expected a full decode"),
    }
  }

  #[test]
  fn info_only_stops_after_trns_without_consuming_idat() {
    let mut png = Vec::new();
    png.extend_from_slice(&super::super::chunk::SIGNATURE);
    push_chunk(&mut png, b"IHDR", &ihdr_bytes(2, 1, 8, 0, 0));
    push_chunk(&mut png, b"tRNS", &[0, 128]);
    // a deliberately-broken IDAT: if info-only touched it, decode would fail.
    push_chunk(&mut png, b"IDAT", &[0xFF, 0xFF, 0xFF]);
    push_chunk(&mut png, b"IEND", &[]);
    let outcome = decode(&png, DecodeFlags::INFO_ONLY).unwrap();
    match outcome {
      DecodeOutcome::Info(info) => {
        assert_eq!(info.width, 2);
        assert_eq!(info.height, 1);
        assert!(info.has_alpha);
      }
      DecodeOutcome::Full(_) => panic!("expected an info-only result"),
    }
  }

  #[test]
  fn grayscale_with_trns_key_scenario() {
    let ihdr = ihdr_bytes(2, 1, 8, 0, 0);
    let idat = zlib_wrap(&stored_block(&[0x00, 128, 192]));
    let mut png = Vec::new();
    png.extend_from_slice(&super::super::chunk::SIGNATURE);
    push_chunk(&mut png, b"IHDR", &ihdr);
    push_chunk(&mut png, b"tRNS", &[0, 128]);
    push_chunk(&mut png, b"IDAT", &idat);
    push_chunk(&mut png, b"IEND", &[]);
    let outcome = decode(&png, DecodeFlags::none()).unwrap();
    let DecodeOutcome::Full(img) = outcome else { panic!("expected full decode") };
    assert_eq!(img.get_pixel(0, 0), Some([128, 128, 128, 0]));
    assert_eq!(img.get_pixel(1, 0), Some([192, 192, 192, 255]));
  }

  #[test]
  fn bad_signature_is_rejected() {
    assert!(decode(b"not a png file at all!!", DecodeFlags::none()).is_err());
  }

  #[test]
  fn plte_after_idat_is_rejected() {
    // RGB, not palette-indexed, so the IDAT itself decodes fine and the
    // late PLTE is the only thing that should fail.
    let idat = zlib_wrap(&stored_block(&[0x00, 0, 0, 0]));
    let mut png = Vec::new();
    png.extend_from_slice(&super::super::chunk::SIGNATURE);
    push_chunk(&mut png, b"IHDR", &ihdr_bytes(1, 1, 8, 2, 0));
    push_chunk(&mut png, b"IDAT", &idat);
    push_chunk(&mut png, b"PLTE", &[0, 0, 0]);
    push_chunk(&mut png, b"IEND", &[]);
    let err = decode(&png, DecodeFlags::none()).unwrap_err();
    assert_eq!(err, PngError::IllegalChunkOrder);
  }

  #[test]
  fn trns_after_idat_is_rejected() {
    let idat = zlib_wrap(&stored_block(&[0x00, 5]));
    let mut png = Vec::new();
    png.extend_from_slice(&super::super::chunk::SIGNATURE);
    push_chunk(&mut png, b"IHDR", &ihdr_bytes(1, 1, 8, 0, 0));
    push_chunk(&mut png, b"IDAT", &idat);
    push_chunk(&mut png, b"tRNS", &[0, 5]);
    push_chunk(&mut png, b"IEND", &[]);
    let err = decode(&png, DecodeFlags::none()).unwrap_err();
    assert_eq!(err, PngError::IllegalChunkOrder);
  }

  /// Builds one fixed-Huffman DEFLATE block (BFINAL=1) encoding `literals`
  /// followed by the end-of-block symbol. Mirrors the bit-packing approach
  /// in `inflate.rs`'s own `fixed_huffman_literal_block` test.
  fn fixed_huffman_block(literals: &[u8]) -> Vec<u8> {
    let mut out_bits: u32 = 0;
    let mut out_bit_count = 0u32;
    let mut bytes = Vec::new();
    let mut push_bits = |bytes: &mut Vec<u8>, value: u32, count: u32| {
      out_bits |= value << out_bit_count;
      out_bit_count += count;
      while out_bit_count >= 8 {
        bytes.push((out_bits & 0xFF) as u8);
        out_bits >>= 8;
        out_bit_count -= 8;
      }
    };
    push_bits(&mut bytes, 1, 1); // bfinal
    push_bits(&mut bytes, 0b01, 2); // btype fixed

    for &literal in literals {
      let sym = literal as u32;
      let (code, len) =
        if sym <= 143 { (0b0011_0000 + sym, 8) } else { (0b1_1001_0000 + (sym - 144), 9) };
      let mut rev = 0u32;
      for i in 0..len {
        rev |= ((code >> i) & 1) << (len - 1 - i);
      }
      push_bits(&mut bytes, rev, len);
    }
    // end-of-block, symbol 256, length 7, code 0b0000000.
    push_bits(&mut bytes, 0, 7);

    if out_bit_count > 0 {
      bytes.push((out_bits & 0xFF) as u8);
    }
    bytes
  }

  #[test]
  fn huffman_block_ending_before_every_scanline_is_produced_is_an_error() {
    // 1x2 grayscale: two one-byte (filter + sample) scanlines are needed,
    // but the compressed stream's final block only supplies one before its
    // end-of-block symbol. The inflater legitimately reaches `Done`; the
    // driver must not mistake that for the image being complete.
    let compressed = zlib_wrap(&fixed_huffman_block(&[0x00, 0xAA]));
    let png = build_png(&ihdr_bytes(1, 2, 8, 0, 0), &compressed);
    assert_eq!(decode(&png, DecodeFlags::none()).unwrap_err(), PngError::MissingImageDataAtIend);
  }

  #[test]
  fn cgbi_premultiplied_bgra_is_fixed_up_and_can_be_reapplied() {
    // Premultiplied straight color (200, 100, 50) at alpha 128 rounds, via
    // this crate's premultiply formula, to (100, 50, 25). CgBI stores that
    // as B,G,R,A raw bytes: 25, 50, 100, 128.
    let raw_bgra = [0x00u8, 25, 50, 100, 128];
    let idat = stored_block(&raw_bgra); // no zlib wrapper: headerless DEFLATE

    let mut png = Vec::new();
    png.extend_from_slice(&super::super::chunk::SIGNATURE);
    push_chunk(&mut png, b"CgBI", &[]);
    push_chunk(&mut png, b"IHDR", &ihdr_bytes(1, 1, 8, 6, 0));
    push_chunk(&mut png, b"IDAT", &idat);
    push_chunk(&mut png, b"IEND", &[]);

    let straight = decode(&png, DecodeFlags::none()).unwrap();
    let DecodeOutcome::Full(img) = straight else { panic!("expected a full decode") };
    assert_eq!(img.get_pixel(0, 0), Some([199, 99, 49, 128]));

    let reapplied = decode(&png, DecodeFlags::BGRA | DecodeFlags::PREMULTIPLIED).unwrap();
    let DecodeOutcome::Full(img) = reapplied else { panic!("expected a full decode") };
    assert_eq!(img.get_pixel(0, 0), Some(raw_bgra[1..].try_into().unwrap()));
  }
}
