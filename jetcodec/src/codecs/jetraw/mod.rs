// SPDX-License-Identifier: LGPL-2.1

//! Codec backed by the external jetraw plugin.
//!
//! Compression runs in two phases: a preparation pass that calibrates the
//! samples for the camera named by the options identifier, followed by the
//! encoding pass into a pre-sized output buffer. Decoding fills exactly
//! `width * height` samples. Both directions convert between caller bytes and
//! 16-bit samples through [`crate::bits`].

use std::sync::Arc;

use log::debug;

use crate::bits::{bytes_to_samples, samples_to_bytes};
use crate::codecs::{Codec, CodecError, CodecOptions, Result};

mod dpcore;

pub use dpcore::DpcoreTransform;
pub use dpcore::Platform;
pub use dpcore::{PLUGIN_DIR_ENV, PLUGIN_PATH_ENV};

/// Error bound handed to the preparation phase, fixed for archival operation.
const ERROR_BOUND: f32 = 1.0;

/// Codec delegating the pixel transform to the jetraw plugin.
///
/// Instances are cheap and stateless. The plugin itself is process-wide state:
/// it is loaded and initialized on the first call and shared by all instances.
/// A hung plugin call blocks its caller, no timeout is applied at this layer.
pub struct JetrawCodec {
  transform: Option<Arc<dyn DpcoreTransform>>,
}

impl JetrawCodec {
  /// Codec using the process-wide plugin.
  pub fn new() -> Self {
    Self { transform: None }
  }

  // Codec over a caller-supplied transform instead of the loaded plugin.
  // Used to exercise the codec layer in isolation.
  #[doc(hidden)]
  pub fn with_transform(transform: Arc<dyn DpcoreTransform>) -> Self {
    Self {
      transform: Some(transform),
    }
  }

  fn run<R>(&self, f: impl FnOnce(&dyn DpcoreTransform) -> Result<R>) -> Result<R> {
    match &self.transform {
      Some(transform) => f(transform.as_ref()),
      None => dpcore::with_dpcore(|lib| f(lib)),
    }
  }

  fn compress_with(transform: &dyn DpcoreTransform, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>> {
    let identifier = options.identifier().ok_or(CodecError::MissingIdentifier)?;
    let pixels = options.pixels();
    if data.len() != 2 * pixels {
      return Err(CodecError::InvalidBufferLength(data.len()));
    }
    let mut samples = bytes_to_samples(data, options.endian())?;

    debug!("jetraw preparation using identifier: {}", identifier);
    transform.prepare(&mut samples, identifier, ERROR_BOUND)?;

    let mut encoded = vec![0_u8; pixels / 2];
    let length = transform.encode(&samples, options.width(), options.height(), &mut encoded)?;
    debug!("jetraw encoding exited with image length: {}", length);
    if length > encoded.len() {
      return Err(CodecError::BufferTooSmall(length, encoded.len()));
    }
    encoded.truncate(length);
    Ok(encoded)
  }

  fn decompress_with(transform: &dyn DpcoreTransform, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>> {
    debug!("jetraw performing decoding");
    let mut samples = vec![0_u16; options.pixels()];
    transform.decode(data, &mut samples)?;
    Ok(samples_to_bytes(&samples, options.endian()))
  }
}

impl Default for JetrawCodec {
  fn default() -> Self {
    Self::new()
  }
}

impl Codec for JetrawCodec {
  fn compress(&self, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>> {
    self.run(|transform| Self::compress_with(transform, data, options))
  }

  fn decompress(&self, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>> {
    self.run(|transform| Self::decompress_with(transform, data, options))
  }
}
