use core::fmt;

/// The coarse category a [`PngError`] falls into.
///
/// This is the grouping a caller usually wants to branch on (retry? bug in
/// caller? bad input file?); [`PngError`] itself keeps the finer-grained
/// cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
  /// The caller misused the API (a stride too small for the image, an
  /// allocator that returned a buffer of the wrong size, and so on).
  Api,
  /// The input bytes are not a well-formed PNG (bad signature, chunks out of
  /// order, an invalid filter selector, ...).
  Invalid,
  /// The embedded DEFLATE/zlib stream is corrupt.
  Inflater,
  /// The input describes something this decoder does not implement, such as
  /// an image whose `width * bytes_per_pixel` does not fit in a `u32`.
  Unsupported,
  /// An allocation failed.
  Allocation,
  /// Reading or seeking the underlying input failed.
  Io,
}

/// An error from decoding a PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PngError {
  /// The first 8 bytes of the input were not the PNG signature.
  NoPngSignature,
  /// A chunk's declared length runs past the end of the input.
  ChunkLengthOverrun,
  /// `IHDR` was missing, duplicated, or not the first chunk.
  MissingOrMisplacedIhdr,
  /// `PLTE` or `tRNS` appeared after the first `IDAT`.
  IllegalChunkOrder,
  /// `IHDR`'s payload was not exactly 13 bytes.
  IllegalIhdrLength,
  /// The `color_type`/`bit_depth` pair in `IHDR` is not one RFC 2083 allows.
  IllegalColorTypeBitDepthCombination,
  /// `IHDR` declared a width or height of zero.
  IllegalWidthOrHeightZero,
  /// `IHDR`'s compression or filter method byte was not zero.
  IllegalAncillaryMethod,
  /// `IHDR`'s interlace method byte was neither 0 nor 1.
  IllegalInterlaceMethod,
  /// `tRNS`'s payload did not match what its color type requires (2 bytes
  /// for grayscale, 6 for RGB, at most the palette length for indexed, and
  /// never present at all for the two color types that carry their own
  /// alpha channel).
  IllegalTransparency,
  /// `IEND`'s payload was not empty.
  IllegalIendLength,
  /// `IEND` was reached without every scanline of image data having been
  /// produced.
  MissingImageDataAtIend,
  /// A scanline's leading filter-type byte was not in `0..=4`.
  IllegalFilterSelector,
  /// `PLTE` appeared for a color type that forbids a palette, or with a
  /// length that is not a multiple of 3.
  IllegalPalette,
  /// A pixel index read from `Index`-color data has no matching palette
  /// entry.
  PaletteIndexOutOfRange,
  /// The zlib header's `CMF`/`FLG` check bits did not satisfy
  /// `(CMF * 256 + FLG) % 31 == 0`.
  IllegalZlibFlagCheck,
  /// The zlib header declared a preset dictionary, which this decoder does
  /// not support.
  IllegalZlibFlagDictionary,
  /// The zlib header's compression method was not 8 (DEFLATE).
  IllegalZlibCompressionMethod,
  /// The zlib header declared a window size larger than 32 KiB.
  IllegalZlibWindowSize,
  /// A DEFLATE block's 2-bit type field was the reserved value `0b11`.
  IllegalBlockType,
  /// A stored block's `LEN` and `NLEN` fields were not complements.
  LenAndNLenDidNotMatch,
  /// The dynamic-block Huffman code-length description was malformed (bad
  /// repeat count, too many/few code lengths, etc).
  BadDynamicHuffmanTreeData,
  /// A Huffman code was read that does not correspond to any assigned
  /// symbol.
  CouldNotFindSymbol,
  /// A back-reference's distance points before the start of the output
  /// produced so far.
  BackRefToBeforeOutputStart,
  /// More decompressed bytes were produced than the scanline buffer has
  /// room for.
  OutputOverflow,
  /// The input ended in the middle of a value this decoder needed to finish
  /// reading, and no more input will ever arrive.
  UnexpectedEndOfInput,
  /// `width * bytes_per_pixel` does not fit in a `u32`.
  ImageTooLarge,
  /// The caller-provided stride is smaller than `width * 4`.
  StrideTooSmall,
  /// An allocation failed.
  Allocation,
  /// Reading from or seeking the underlying input failed.
  Io,
}
impl PngError {
  /// The coarse [`ErrorKind`] this error belongs to.
  #[inline]
  pub const fn kind(self) -> ErrorKind {
    match self {
      Self::StrideTooSmall => ErrorKind::Api,
      Self::NoPngSignature
      | Self::ChunkLengthOverrun
      | Self::MissingOrMisplacedIhdr
      | Self::IllegalChunkOrder
      | Self::IllegalIhdrLength
      | Self::IllegalColorTypeBitDepthCombination
      | Self::IllegalWidthOrHeightZero
      | Self::IllegalAncillaryMethod
      | Self::IllegalInterlaceMethod
      | Self::IllegalTransparency
      | Self::IllegalIendLength
      | Self::MissingImageDataAtIend
      | Self::IllegalFilterSelector
      | Self::IllegalPalette
      | Self::PaletteIndexOutOfRange => ErrorKind::Invalid,
      Self::IllegalZlibFlagCheck
      | Self::IllegalZlibFlagDictionary
      | Self::IllegalZlibCompressionMethod
      | Self::IllegalZlibWindowSize
      | Self::IllegalBlockType
      | Self::LenAndNLenDidNotMatch
      | Self::BadDynamicHuffmanTreeData
      | Self::CouldNotFindSymbol
      | Self::BackRefToBeforeOutputStart
      | Self::OutputOverflow => ErrorKind::Inflater,
      Self::UnexpectedEndOfInput => ErrorKind::Io,
      Self::ImageTooLarge => ErrorKind::Unsupported,
      Self::Allocation => ErrorKind::Allocation,
      Self::Io => ErrorKind::Io,
    }
  }
}
impl fmt::Display for PngError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}
#[cfg(feature = "std")]
impl std::error::Error for PngError {}

#[cfg(feature = "alloc")]
impl From<alloc::collections::TryReserveError> for PngError {
  #[inline]
  fn from(_: alloc::collections::TryReserveError) -> Self {
    Self::Allocation
  }
}
