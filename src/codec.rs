//! Primitive codec between wire bytes and native values.
//!
//! FITS stores all binary data big-endian. The codec variant is selected once,
//! when a file is opened, and then threaded to every stride/field decode.

/// Wire byte order of the multi-byte values in the data sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
  /// Most significant byte first. The FITS standard byte order.
  #[default]
  Big,
  /// Least significant byte first. Off-standard, kept for raw dumps produced
  /// by little-endian writers that skip the swap.
  Little,
}

/// Single precision complex value (`TFORM` code `C`, 8 wire bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex32 {
  pub re: f32,
  pub im: f32,
}

impl Complex32 {
  pub const fn new(re: f32, im: f32) -> Self {
    Self { re, im }
  }
}

/// Double precision complex value (`TFORM` code `M`, 16 wire bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex64 {
  pub re: f64,
  pub im: f64,
}

impl Complex64 {
  pub const fn new(re: f64, im: f64) -> Self {
    Self { re, im }
  }
}

/// Byte-for-byte symmetric encoder/decoder for the FITS primitive types.
///
/// `Swap` converts between the big-endian wire and a little-endian host,
/// `Straight` passes little-endian bytes through. Round trips are bit-exact,
/// NaN payloads included: floats are moved through their raw bit patterns,
/// never through arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitCodec {
  /// Big-endian wire (the default FITS byte order).
  Swap,
  /// Little-endian wire.
  Straight,
}

macro_rules! symmetric_int {
  ($decode:ident, $encode:ident, $t:ty, $n:literal) => {
    pub fn $decode(&self, bytes: [u8; $n]) -> $t {
      match self {
        Self::Swap => <$t>::from_be_bytes(bytes),
        Self::Straight => <$t>::from_le_bytes(bytes),
      }
    }

    pub fn $encode(&self, value: $t) -> [u8; $n] {
      match self {
        Self::Swap => value.to_be_bytes(),
        Self::Straight => value.to_le_bytes(),
      }
    }
  };
}

impl BitCodec {
  pub const fn new(endianness: Endianness) -> Self {
    match endianness {
      Endianness::Big => Self::Swap,
      Endianness::Little => Self::Straight,
    }
  }

  symmetric_int!(decode_i16, encode_i16, i16, 2);
  symmetric_int!(decode_i32, encode_i32, i32, 4);
  symmetric_int!(decode_i64, encode_i64, i64, 8);
  symmetric_int!(decode_u16, encode_u16, u16, 2);
  symmetric_int!(decode_u32, encode_u32, u32, 4);
  symmetric_int!(decode_u64, encode_u64, u64, 8);

  pub fn decode_f32(&self, bytes: [u8; 4]) -> f32 {
    f32::from_bits(self.decode_u32(bytes))
  }

  pub fn encode_f32(&self, value: f32) -> [u8; 4] {
    self.encode_u32(value.to_bits())
  }

  pub fn decode_f64(&self, bytes: [u8; 8]) -> f64 {
    f64::from_bits(self.decode_u64(bytes))
  }

  pub fn encode_f64(&self, value: f64) -> [u8; 8] {
    self.encode_u64(value.to_bits())
  }

  /// Decode a single precision complex: real part first, then imaginary.
  pub fn decode_complex32(&self, bytes: [u8; 8]) -> Complex32 {
    let (re, im) = bytes.split_at(4);
    Complex32 {
      re: self.decode_f32(re.try_into().unwrap()),
      im: self.decode_f32(im.try_into().unwrap()),
    }
  }

  pub fn encode_complex32(&self, value: Complex32) -> [u8; 8] {
    let mut bytes = [0_u8; 8];
    bytes[..4].copy_from_slice(&self.encode_f32(value.re));
    bytes[4..].copy_from_slice(&self.encode_f32(value.im));
    bytes
  }

  /// Decode a double precision complex: real part first, then imaginary.
  pub fn decode_complex64(&self, bytes: [u8; 16]) -> Complex64 {
    let (re, im) = bytes.split_at(8);
    Complex64 {
      re: self.decode_f64(re.try_into().unwrap()),
      im: self.decode_f64(im.try_into().unwrap()),
    }
  }

  pub fn encode_complex64(&self, value: Complex64) -> [u8; 16] {
    let mut bytes = [0_u8; 16];
    bytes[..8].copy_from_slice(&self.encode_f64(value.re));
    bytes[8..].copy_from_slice(&self.encode_f64(value.im));
    bytes
  }
}
