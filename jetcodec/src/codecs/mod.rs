// SPDX-License-Identifier: LGPL-2.1

use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bits::Endian;

pub mod jetraw;

/// Error variants for codec operations
#[derive(Debug, Error)]
pub enum CodecError {
  /// Host platform has no known native plugin build
  #[error("Unsupported platform: {}", _0)]
  UnsupportedPlatform(String),

  /// Plugin could not be located, staged or initialized
  #[error("Native plugin not available: {}", _0)]
  MissingResource(String),

  #[error("Invalid image geometry: {}x{}", _0, _1)]
  InvalidGeometry(usize, usize),

  #[error("Calibration identifier missing")]
  MissingIdentifier,

  #[error("Invalid buffer length: {}", _0)]
  InvalidBufferLength(usize),

  #[error("Encoding failed with status: {}", _0)]
  EncodingFailed(i32),

  #[error("Encoded length {} exceeds output capacity {}", _0, _1)]
  BufferTooSmall(usize, usize),

  /// Error on stream input
  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Parameters for a single compress or decompress call.
///
/// Owned by the caller and borrowed by the codec for the duration of one call.
/// Validated on construction, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecOptions {
  width: usize,
  height: usize,
  endian: Endian,
  identifier: Option<String>,
}

impl CodecOptions {
  pub fn new(width: usize, height: usize, endian: Endian) -> Result<Self> {
    if width == 0 || height == 0 {
      return Err(CodecError::InvalidGeometry(width, height));
    }
    Ok(Self {
      width,
      height,
      endian,
      identifier: None,
    })
  }

  /// Attaches the camera calibration identifier required by calibrated codecs.
  pub fn with_identifier(mut self, identifier: impl Into<String>) -> Result<Self> {
    let identifier = identifier.into();
    if identifier.is_empty() {
      return Err(CodecError::MissingIdentifier);
    }
    self.identifier = Some(identifier);
    Ok(self)
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn endian(&self) -> Endian {
    self.endian
  }

  /// Sample count of one full plane
  pub fn pixels(&self) -> usize {
    self.width * self.height
  }

  pub fn identifier(&self) -> Option<&str> {
    self.identifier.as_deref()
  }
}

/// Trait for block codecs over fixed-geometry pixel planes.
///
/// Input buffers are borrowed read-only, output buffers are freshly allocated
/// and never alias the input. For a given options value, two calls over
/// identical input bytes yield byte-identical output.
pub trait Codec: Send + Sync {
  /// Compresses a raw interleaved pixel plane of `2 * options.pixels()` bytes.
  fn compress(&self, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>>;

  /// Decompresses a buffer produced by [`Codec::compress`] back into raw
  /// pixel bytes.
  fn decompress(&self, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>>;

  /// Decompresses from a bounded stream.
  ///
  /// Reads the remaining content into memory and delegates to
  /// [`Codec::decompress`]. Compressed planes are bounded by
  /// `2 * options.pixels()`, so buffering the payload is acceptable.
  fn decompress_stream(&self, reader: &mut dyn Read, options: &CodecOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    self.decompress(&buf, options)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_geometry_rejected() {
    crate::init_test_logger();
    assert!(matches!(
      CodecOptions::new(0, 128, Endian::Little).unwrap_err(),
      CodecError::InvalidGeometry(0, 128)
    ));
    assert!(matches!(
      CodecOptions::new(128, 0, Endian::Little).unwrap_err(),
      CodecError::InvalidGeometry(128, 0)
    ));
  }

  #[test]
  fn empty_identifier_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let options = CodecOptions::new(64, 64, Endian::Little)?;
    assert!(matches!(options.with_identifier("").unwrap_err(), CodecError::MissingIdentifier));
    Ok(())
  }

  #[test]
  fn options_accessors() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let options = CodecOptions::new(640, 480, Endian::Big)?.with_identifier("000251_standard")?;
    assert_eq!(options.width(), 640);
    assert_eq!(options.height(), 480);
    assert_eq!(options.pixels(), 640 * 480);
    assert!(options.endian().big());
    assert_eq!(options.identifier(), Some("000251_standard"));
    Ok(())
  }
}
