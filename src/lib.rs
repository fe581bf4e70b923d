#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
//#![warn(missing_docs)]

//! A streaming decoder for PNG images, built around a hand-written
//! RFC 1950/1951 (zlib/DEFLATE) inflater.
//!
//! The two halves of the crate mirror the two halves of the PNG format
//! itself:
//! * [`inflate`] is a standalone, suspend/resume-capable DEFLATE engine. It
//!   knows nothing about PNG; you feed it compressed slabs of any size and it
//!   hands back decompressed bytes.
//! * [`png`] is the chunk-level state machine. It parses the PNG signature
//!   and chunk sequence, feeds `IDAT` payloads into an [`inflate::Inflater`]
//!   one chunk at a time, and turns the decompressed scanlines into a final
//!   32-bits-per-pixel image.
//!
//! With the `alloc` feature (on by default) [`png::decode`] is the one-call
//! entry point: give it the bytes of a PNG file and some [`png::DecodeFlags`]
//! and get back an [`image::Image`] or a [`PngError`].

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

/// Prints a trace line when the `trace` feature is enabled, otherwise a no-op.
///
/// Used in the spots where a from-scratch bit/byte accounting bug would
/// otherwise fail silently.
#[macro_export]
macro_rules! trace {
  ($($arg:tt)*) => {
    #[cfg(feature = "trace")] {
      $crate::__trace_println(format_args!($($arg)*));
    }
  }
}

#[cfg(feature = "trace")]
#[doc(hidden)]
pub fn __trace_println(args: core::fmt::Arguments<'_>) {
  std::println!("{args}");
}

mod error;
pub use error::{ErrorKind, PngError};

pub mod bits;
pub mod huffman;
pub mod window;
pub mod inflate;

pub mod adam7;
pub mod filter;
pub mod pixel;

pub mod png;

#[cfg(feature = "alloc")]
pub mod image;

pub(crate) type PngResult<T> = Result<T, PngError>;
