//! Holds all the tools for decoding PNG data.
//!
//! ## Automated PNG Decoding
//! If you don't need full control over the decoding process, [`decode`] takes
//! a complete PNG file's bytes and hands back the pixels as an
//! [`crate::image::Image`] (or just the dimensions and alpha presence, if
//! [`DecodeFlags::INFO_ONLY`] is set). This requires the `alloc` feature.
//!
//! ## Decoding a PNG Yourself
//! The pieces underneath are also public: [`chunk::ChunkIter`] walks the raw
//! chunk sequence, [`header::Header`] parses `IHDR`, [`palette::Palette`]
//! and [`palette::parse_transparency_key`] handle `PLTE`/`tRNS`, and
//! [`crate::pixel`] turns one reconstructed scanline into RGBA bytes.
//!
//! The general format of a PNG is that the information is stored in "chunks".
//! You iterate the chunks and each one gives you some info that you might
//! decide to use. There's four "critical" chunk types:
//! * **Header** (`IHDR`) - dimensions, pixel format, interlacing.
//! * **Palette** (`PLTE`) - present for indexed-color images.
//! * **Image Data** (`IDAT`) - one or more chunks forming a single zlib
//!   stream of filtered, possibly-interlaced scanlines.
//! * **End** (`IEND`) - marks that the file wasn't truncated.
//!
//! Apple's `CgBI` extension (seen in PNGs exported from Xcode asset
//! catalogs) is also supported: a `CgBI` chunk before `IHDR` marks the image
//! data as headerless DEFLATE (no zlib wrapper) storing premultiplied BGRA
//! instead of straight RGBA; the driver undoes both before applying the
//! caller's own [`DecodeFlags`].

pub mod chunk;
pub mod flags;
pub mod header;
pub mod palette;

#[cfg(feature = "alloc")]
pub mod decoder;

pub use chunk::{strip_signature, ChunkIter, RawChunk, SIGNATURE};
pub use flags::DecodeFlags;
pub use header::Header;
pub use palette::{parse_transparency_key, Palette};

#[cfg(feature = "alloc")]
pub use decoder::{decode, decode_with_allocator};
