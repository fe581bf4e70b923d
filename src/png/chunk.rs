//! Chunk-level framing: the 8-byte signature and the length/type/data/CRC
//! shape every chunk shares. CRC-32 is read and discarded, never verified
//! (out of scope).

use crate::error::PngError;
use crate::PngResult;

/// The 8 bytes every PNG file starts with.
pub const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Checks and strips the leading signature, returning the rest of the file.
pub fn strip_signature(bytes: &[u8]) -> PngResult<&[u8]> {
  match bytes.split_at_checked(SIGNATURE.len()) {
    Some((sig, rest)) if sig == SIGNATURE => Ok(rest),
    _ => Err(PngError::NoPngSignature),
  }
}

/// One chunk's type tag and payload, with the CRC already consumed.
#[derive(Debug, Clone, Copy)]
pub struct RawChunk<'b> {
  pub tag: [u8; 4],
  pub data: &'b [u8],
}
impl RawChunk<'_> {
  #[inline]
  pub fn is(&self, tag: &[u8; 4]) -> bool {
    &self.tag == tag
  }
}

/// Iterates the chunks of a PNG file, signature already stripped.
#[derive(Debug, Clone)]
pub struct ChunkIter<'b> {
  rest: &'b [u8],
}
impl<'b> ChunkIter<'b> {
  #[inline]
  pub const fn new(after_signature: &'b [u8]) -> Self {
    Self { rest: after_signature }
  }
}
impl<'b> Iterator for ChunkIter<'b> {
  type Item = PngResult<RawChunk<'b>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.rest.is_empty() {
      return None;
    }
    let Some((len_bytes, after_len)) = self.rest.split_at_checked(4) else {
      self.rest = &[];
      return Some(Err(PngError::ChunkLengthOverrun));
    };
    let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    let Some((tag_bytes, after_tag)) = after_len.split_at_checked(4) else {
      self.rest = &[];
      return Some(Err(PngError::ChunkLengthOverrun));
    };
    let Some((data, after_data)) = after_tag.split_at_checked(len) else {
      self.rest = &[];
      return Some(Err(PngError::ChunkLengthOverrun));
    };
    let Some((_crc, after_crc)) = after_data.split_at_checked(4) else {
      self.rest = &[];
      return Some(Err(PngError::ChunkLengthOverrun));
    };
    self.rest = after_crc;
    Some(Ok(RawChunk { tag: tag_bytes.try_into().unwrap(), data }))
  }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
  use super::*;

  fn push_chunk(bytes: &mut alloc::vec::Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
    bytes.extend_from_slice(tag);
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(&[0, 0, 0, 0]); // fake CRC, never checked
  }

  #[test]
  fn strip_signature_rejects_wrong_bytes() {
    assert!(strip_signature(b"not a png").is_err());
  }

  #[test]
  fn strip_signature_accepts_real_one() {
    let mut bytes = alloc::vec::Vec::new();
    bytes.extend_from_slice(&SIGNATURE);
    bytes.extend_from_slice(b"rest");
    assert_eq!(strip_signature(&bytes).unwrap(), b"rest");
  }

  #[test]
  fn iterates_two_chunks_and_stops() {
    let mut bytes = alloc::vec::Vec::new();
    push_chunk(&mut bytes, b"IHDR", &[1, 2, 3]);
    push_chunk(&mut bytes, b"IEND", &[]);
    let mut it = ChunkIter::new(&bytes);
    let first = it.next().unwrap().unwrap();
    assert!(first.is(b"IHDR"));
    assert_eq!(first.data, &[1, 2, 3]);
    let second = it.next().unwrap().unwrap();
    assert!(second.is(b"IEND"));
    assert!(it.next().is_none());
  }

  #[test]
  fn truncated_chunk_is_an_error() {
    let bytes = [0, 0, 0, 10, b'I', b'D', b'A', b'T', 1, 2, 3];
    let mut it = ChunkIter::new(&bytes);
    assert!(it.next().unwrap().is_err());
  }
}
