// SPDX-License-Identifier: LGPL-2.1

//! Block codecs for scientific image data.
//!
//! A [`Codec`] turns a raw interleaved pixel plane into an opaque compressed
//! buffer and back. Each call is parameterized by a [`CodecOptions`] value
//! carrying the plane geometry, the byte order of the pixel data and, for
//! calibrated codecs, the camera identifier. The crate ships [`JetrawCodec`],
//! which delegates the actual transform to the external jetraw plugin, loaded
//! into the process on first use and shared by all codec instances.
//!
//! # Example
//! ```rust,no_run
//! use jetcodec::{Codec, CodecOptions, Endian, JetrawCodec};
//!
//! fn main() {
//!   let options = CodecOptions::new(2048, 2048, Endian::Little)
//!     .and_then(|opts| opts.with_identifier("000251_standard"))
//!     .unwrap();
//!   let plane = std::fs::read("plane.raw").unwrap();
//!
//!   let codec = JetrawCodec::new();
//!   let compressed = codec.compress(&plane, &options).unwrap();
//!   let restored = codec.decompress(&compressed, &options).unwrap();
//!   assert_eq!(plane, restored);
//! }
//! ```

pub mod bits;
pub mod codecs;

pub use bits::Endian;
pub use codecs::Codec;
pub use codecs::CodecError;
pub use codecs::CodecOptions;
pub use codecs::Result;
pub use codecs::jetraw::JetrawCodec;

#[cfg(test)]
pub(crate) fn init_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}
