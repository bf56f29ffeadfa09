// SPDX-License-Identifier: LGPL-2.1

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::codecs::{CodecError, Result};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Endian {
  Big,
  Little,
}

impl Default for Endian {
  fn default() -> Self {
    Self::Little
  }
}

impl Endian {
  #[inline]
  pub fn big(&self) -> bool {
    matches!(*self, Self::Big)
  }

  #[inline]
  pub fn little(&self) -> bool {
    matches!(*self, Self::Little)
  }

  #[inline]
  pub fn read_u16(&self, buf: &[u8], offset: usize) -> u16 {
    match *self {
      Self::Big => BigEndian::read_u16(&buf[offset..]),
      Self::Little => LittleEndian::read_u16(&buf[offset..]),
    }
  }

  #[inline]
  pub fn write_u16(&self, buf: &mut [u8], n: u16) {
    match *self {
      Self::Big => BigEndian::write_u16(buf, n),
      Self::Little => LittleEndian::write_u16(buf, n),
    }
  }
}

/// Reinterprets a byte buffer as unsigned 16-bit samples in the given byte order.
///
/// The buffer length must be even, two bytes per sample. Together with
/// [`samples_to_bytes`] this forms an exact bijection for any byte order.
pub fn bytes_to_samples(buf: &[u8], endian: Endian) -> Result<Vec<u16>> {
  if buf.len() % 2 != 0 {
    return Err(CodecError::InvalidBufferLength(buf.len()));
  }
  let mut samples = vec![0_u16; buf.len() / 2];
  match endian {
    Endian::Big => BigEndian::read_u16_into(buf, &mut samples),
    Endian::Little => LittleEndian::read_u16_into(buf, &mut samples),
  }
  Ok(samples)
}

/// Emits two bytes per sample, low byte first for [`Endian::Little`].
pub fn samples_to_bytes(samples: &[u16], endian: Endian) -> Vec<u8> {
  let mut buf = vec![0_u8; samples.len() * 2];
  match endian {
    Endian::Big => BigEndian::write_u16_into(samples, &mut buf),
    Endian::Little => LittleEndian::write_u16_into(samples, &mut buf),
  }
  buf
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sample_byteorder() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert_eq!(bytes_to_samples(&[0x01, 0x02], Endian::Little)?, vec![0x0201]);
    assert_eq!(bytes_to_samples(&[0x01, 0x02], Endian::Big)?, vec![0x0102]);
    assert_eq!(samples_to_bytes(&[0x0201], Endian::Little), vec![0x01, 0x02]);
    assert_eq!(samples_to_bytes(&[0x0102], Endian::Big), vec![0x01, 0x02]);
    Ok(())
  }

  #[test]
  fn conversion_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    let buf: Vec<u8> = (0_u16..512).map(|v| (v % 251) as u8).collect();
    for endian in [Endian::Little, Endian::Big] {
      let samples = bytes_to_samples(&buf, endian)?;
      assert_eq!(samples.len(), buf.len() / 2);
      assert_eq!(samples_to_bytes(&samples, endian), buf);
    }
    Ok(())
  }

  #[test]
  fn odd_length_rejected() {
    crate::init_test_logger();
    let err = bytes_to_samples(&[0x01, 0x02, 0x03], Endian::Little).unwrap_err();
    assert!(matches!(err, CodecError::InvalidBufferLength(3)));
  }

  #[test]
  fn endian_helpers() -> std::result::Result<(), Box<dyn std::error::Error>> {
    crate::init_test_logger();
    assert!(Endian::Little.little());
    assert!(Endian::Big.big());
    assert_eq!(Endian::Little.read_u16(&[0xff, 0x01, 0x02], 1), 0x0201);
    let mut buf = [0_u8; 2];
    Endian::Big.write_u16(&mut buf, 0x0102);
    assert_eq!(buf, [0x01, 0x02]);
    Ok(())
  }
}
