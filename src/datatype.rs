//! The FITS data-type registry: `BITPIX` pixel types and the `TFORM` column
//! descriptor grammar.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{
  new_invalid_tform_err, new_unexpected_value, new_unsupported_tform_err, Error,
};

/// The `BITPIX` keyword value: pixel width in bits, negative for IEEE floats.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BitPix {
  U8 = 8,
  I16 = 16,
  I32 = 32,
  I64 = 64,
  F32 = -32,
  F64 = -64,
}

impl BitPix {
  /// The value associated to this BitPix, as written in the card.
  pub const fn i16_value(&self) -> i16 {
    *self as i16
  }

  /// Size, in bytes, of one data element.
  pub const fn byte_size(&self) -> u64 {
    (self.i16_value().unsigned_abs() >> 3) as u64
  }

  pub fn from_value(value: i64) -> Result<Self, Error> {
    match value {
      8 => Ok(Self::U8),
      16 => Ok(Self::I16),
      32 => Ok(Self::I32),
      64 => Ok(Self::I64),
      -32 => Ok(Self::F32),
      -64 => Ok(Self::F64),
      _ => Err(new_unexpected_value(
        "one of [8, 16, 32, 64, -32, -64]",
        value,
      )),
    }
  }
}

/// Element type of a binary table column, i.e. the letter code of a `TFORM`
/// descriptor. The `P`/`Q` variable-length array descriptors are rejected at
/// parse time, so no variant exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
  /// `L`: logical, one ASCII `T`/`F` byte.
  Logical,
  /// `X`: bit, packed 8 per byte.
  Bit,
  /// `B`: unsigned byte.
  UnsignedByte,
  /// `I`: 16-bit signed integer.
  Short,
  /// `J`: 32-bit signed integer.
  Int,
  /// `K`: 64-bit signed integer.
  Long,
  /// `A`: ASCII character.
  AsciiChar,
  /// `E`: IEEE single precision float.
  Float,
  /// `D`: IEEE double precision float.
  Double,
  /// `C`: single precision complex.
  ComplexFloat,
  /// `M`: double precision complex.
  ComplexDouble,
}

impl DataType {
  pub const fn code(&self) -> char {
    match self {
      Self::Logical => 'L',
      Self::Bit => 'X',
      Self::UnsignedByte => 'B',
      Self::Short => 'I',
      Self::Int => 'J',
      Self::Long => 'K',
      Self::AsciiChar => 'A',
      Self::Float => 'E',
      Self::Double => 'D',
      Self::ComplexFloat => 'C',
      Self::ComplexDouble => 'M',
    }
  }

  /// Wire bytes of a single element (one byte for `X`: the packing over the
  /// repeat count is handled at the descriptor level).
  pub const fn elem_byte_size(&self) -> u64 {
    match self {
      Self::Logical | Self::Bit | Self::UnsignedByte | Self::AsciiChar => 1,
      Self::Short => 2,
      Self::Int | Self::Float => 4,
      Self::Long | Self::Double | Self::ComplexFloat => 8,
      Self::ComplexDouble => 16,
    }
  }
}

/// A `TFORM` descriptor: `[repeat]code`, repeat defaulting to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TForm {
  repeat: u32,
  data_type: DataType,
}

impl TForm {
  pub const fn new(repeat: u32, data_type: DataType) -> Self {
    Self { repeat, data_type }
  }

  pub const fn scalar(data_type: DataType) -> Self {
    Self::new(1, data_type)
  }

  pub const fn repeat(&self) -> u32 {
    self.repeat
  }

  pub const fn data_type(&self) -> DataType {
    self.data_type
  }

  /// Wire bytes of the whole column in one row. Bits pack eight per byte;
  /// every other type is `repeat` times its element size.
  pub const fn total_byte_size(&self) -> u64 {
    match self.data_type {
      DataType::Bit => (self.repeat as u64).div_ceil(8),
      dt => self.repeat as u64 * dt.elem_byte_size(),
    }
  }
}

impl FromStr for TForm {
  type Err = Error;

  /// Case-insensitive; characters after the code letter (used by some
  /// writers for display hints) are ignored.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bytes = s.trim().as_bytes();
    let il = bytes.partition_point(|b| b.is_ascii_digit());
    let repeat = if il == 0 {
      1
    } else {
      // Checked to be digits; the only possible failure is an overflow.
      unsafe { std::str::from_utf8_unchecked(&bytes[..il]) }
        .parse::<u32>()
        .map_err(|_| new_invalid_tform_err(s))?
    };
    let data_type = match bytes.get(il).map(u8::to_ascii_uppercase) {
      Some(b'L') => DataType::Logical,
      Some(b'X') => DataType::Bit,
      Some(b'B') => DataType::UnsignedByte,
      Some(b'I') => DataType::Short,
      Some(b'J') => DataType::Int,
      Some(b'K') => DataType::Long,
      Some(b'A') => DataType::AsciiChar,
      Some(b'E') => DataType::Float,
      Some(b'D') => DataType::Double,
      Some(b'C') => DataType::ComplexFloat,
      Some(b'M') => DataType::ComplexDouble,
      Some(c @ (b'P' | b'Q')) => return Err(new_unsupported_tform_err(c as char)),
      _ => return Err(new_invalid_tform_err(s)),
    };
    Ok(Self { repeat, data_type })
  }
}

impl Display for TForm {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    if self.repeat != 1 {
      write!(f, "{}", self.repeat)?;
    }
    write!(f, "{}", self.data_type.code())
  }
}
