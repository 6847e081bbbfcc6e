use std::{
  io,
  num::{ParseFloatError, ParseIntError},
};

use thiserror::Error;

/// An error that can be produced while reading or writing a FITS stream.
/// Boxed so that `Result` stays a single machine word wide.
pub type Error = Box<FitsError>;

/// Coarse error category, one per failure class of the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Underlying stream failed, or ended inside a card or a stride.
  Io,
  /// Malformed 80-byte card.
  InvalidCard,
  /// Missing or contradictory mandatory keyword, or no `END` in sane bounds.
  InvalidHeader,
  /// API used out of lifecycle order.
  InvalidState,
  /// Feature outside the supported FITS subset.
  Unsupported,
  /// A card value could not be parsed as its expected type.
  InvalidValue,
}

fn bytes2string(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into()
}

pub(crate) fn new_io_err(err: io::Error) -> Error {
  FitsError::Io(err).into()
}

pub(crate) fn new_unexpected_eof(section: &'static str) -> Error {
  FitsError::Io(io::Error::new(
    io::ErrorKind::UnexpectedEof,
    format!("stream ended inside a {}", section),
  ))
  .into()
}

pub(crate) fn new_backward_seek_err(from: u64, to: u64) -> Error {
  FitsError::BackwardSeek { from, to }.into()
}

pub(crate) fn new_non_ascii_card_err(index: usize, found: u8) -> Error {
  FitsError::NonAsciiCard { index, found }.into()
}

pub(crate) fn new_invalid_keyword_byte_err(found: u8, keyword: &[u8]) -> Error {
  FitsError::InvalidKeywordByte {
    found: found as char,
    keyword: bytes2string(keyword),
  }
  .into()
}

pub(crate) fn new_string_closing_not_found_err(part_of_record: &[u8]) -> Error {
  FitsError::StringClosingNotFound {
    part_of_record: bytes2string(part_of_record),
  }
  .into()
}

pub(crate) fn new_unclassifiable_value_err(found: u8, part_of_record: &[u8]) -> Error {
  FitsError::UnclassifiableValue {
    found: found as char,
    part_of_record: bytes2string(part_of_record),
  }
  .into()
}

pub(crate) fn new_hierarch_kw_err() -> Error {
  FitsError::HierarchKeyword.into()
}

pub(crate) fn new_empty_value_err(expected: &'static str) -> Error {
  FitsError::EmptyValue { expected }.into()
}

pub(crate) fn new_invalid_logical_err(found: u8, part_of_record: &[u8]) -> Error {
  FitsError::InvalidLogicalValue {
    found: found as char,
    part_of_record: bytes2string(part_of_record),
  }
  .into()
}

pub(crate) fn new_invalid_int_err(err: ParseIntError, part_of_record: &[u8]) -> Error {
  FitsError::InvalidIntegerValue {
    err,
    part_of_record: bytes2string(part_of_record),
  }
  .into()
}

pub(crate) fn new_invalid_real_err(err: ParseFloatError, part_of_record: &[u8]) -> Error {
  FitsError::InvalidRealValue {
    err,
    part_of_record: bytes2string(part_of_record),
  }
  .into()
}

pub(crate) fn new_value_type_err(keyword: &str, expected: &'static str) -> Error {
  FitsError::ValueTypeMismatch {
    keyword: keyword.into(),
    expected,
  }
  .into()
}

pub(crate) fn new_missing_keyword_err(keyword: &str) -> Error {
  FitsError::MissingKeyword {
    keyword: keyword.into(),
  }
  .into()
}

pub(crate) fn new_unexpected_value<T: ToString, S: ToString>(expected: T, found: S) -> Error {
  FitsError::UnexpectedValue {
    expected: expected.to_string(),
    found: found.to_string(),
  }
  .into()
}

pub(crate) fn new_end_not_found_err(cards_scanned: usize) -> Error {
  FitsError::EndNotFound { cards_scanned }.into()
}

pub(crate) fn new_end_misplaced_err() -> Error {
  FitsError::EndMisplaced.into()
}

pub(crate) fn new_invalid_state_err(operation: &'static str, state: &'static str) -> Error {
  FitsError::InvalidState { operation, state }.into()
}

pub(crate) fn new_hdu_out_of_order_err(operation: &'static str) -> Error {
  FitsError::HduOutOfOrder { operation }.into()
}

pub(crate) fn new_stride_len_err(expected: u64, found: usize) -> Error {
  FitsError::StrideLengthMismatch { expected, found }.into()
}

pub(crate) fn new_unsupported_tform_err(code: char) -> Error {
  FitsError::UnsupportedColumnType { code }.into()
}

pub(crate) fn new_unsupported_xtension_err(found: &[u8]) -> Error {
  FitsError::UnsupportedXtension {
    found: bytes2string(found),
  }
  .into()
}

pub(crate) fn new_unsupported_err(what: &'static str) -> Error {
  FitsError::Unsupported { what }.into()
}

pub(crate) fn new_invalid_tform_err(found: &str) -> Error {
  FitsError::InvalidTForm {
    found: found.into(),
  }
  .into()
}

#[derive(Error, Debug)]
pub enum FitsError {
  // IO related
  #[error("I/O error: {0}.")]
  Io(#[from] io::Error),
  #[error("Backward seek rejected on a forward-only stream (from byte {from} to byte {to}).")]
  BackwardSeek { from: u64, to: u64 },

  // Card level
  #[error("Non ASCII-printable byte 0x{found:02X} at card byte {index}.")]
  NonAsciiCard { index: usize, found: u8 },
  #[error("Invalid keyword character '{found}' in \"{keyword}\".")]
  InvalidKeywordByte { found: char, keyword: String },
  #[error("String value closing single quote not found in \"{part_of_record}\".")]
  StringClosingNotFound { part_of_record: String },
  #[error("Value starting with '{found}' is neither logical, numeric nor string. In \"{part_of_record}\".")]
  UnclassifiableValue { found: char, part_of_record: String },
  #[error("HIERARCH keywords are not supported: not a valid 8-byte keyword.")]
  HierarchKeyword,

  // Value level
  #[error("Wrong card value. Expected: {expected}. Actual: empty.")]
  EmptyValue { expected: &'static str },
  #[error(
    "Invalid logical value. Expected 'T' or 'F'; Actual: '{found}'. In \"{part_of_record}\"."
  )]
  InvalidLogicalValue { found: char, part_of_record: String },
  #[error("Invalid integer value. Error: '{err:?}'. In \"{part_of_record}\".")]
  InvalidIntegerValue {
    err: ParseIntError,
    part_of_record: String,
  },
  #[error("Invalid real value. Error: '{err:?}'. In \"{part_of_record}\".")]
  InvalidRealValue {
    err: ParseFloatError,
    part_of_record: String,
  },
  #[error("Wrong type for keyword '{keyword}'. Expected: {expected}.")]
  ValueTypeMismatch {
    keyword: String,
    expected: &'static str,
  },
  #[error("Invalid TFORM descriptor \"{found}\". Expected: (\\d+)?[LXBIJKAEDCM].")]
  InvalidTForm { found: String },

  // Header level
  #[error("Mandatory keyword '{keyword}' not found.")]
  MissingKeyword { keyword: String },
  #[error("Wrong value. Expected: '{expected}'. Actual: '{found}'.")]
  UnexpectedValue { expected: String, found: String },
  #[error("No 'END' card found after scanning {cards_scanned} cards.")]
  EndNotFound { cards_scanned: usize },
  #[error("The 'END' card must appear exactly once, as the last card.")]
  EndMisplaced,

  // Lifecycle
  #[error("Operation '{operation}' not allowed in HDU state '{state}'.")]
  InvalidState {
    operation: &'static str,
    state: &'static str,
  },
  #[error("Operation '{operation}' on an HDU that is not the current one.")]
  HduOutOfOrder { operation: &'static str },
  #[error("Wrong stride length. Expected: {expected} bytes. Actual: {found} bytes.")]
  StrideLengthMismatch { expected: u64, found: usize },

  // Supported subset
  #[error("Unsupported column type '{code}' (variable-length arrays are not supported).")]
  UnsupportedColumnType { code: char },
  #[error("Unsupported extension type \"{found}\".")]
  UnsupportedXtension { found: String },
  #[error("Unsupported FITS feature: {what}.")]
  Unsupported { what: &'static str },

  // Context
  #[error("Error: {source}\nCard context: \"{record}\".")]
  WithRecordContext { record: String, source: Error },
  #[error("Error: {source}\nStream offset context: byte {offset}.")]
  WithOffsetContext { offset: u64, source: Error },
}

impl FitsError {
  /// Returns the coarse category this error belongs to.
  /// Context wrappers report the category of the wrapped error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Io(_) | Self::BackwardSeek { .. } => ErrorKind::Io,
      Self::NonAsciiCard { .. }
      | Self::InvalidKeywordByte { .. }
      | Self::StringClosingNotFound { .. }
      | Self::UnclassifiableValue { .. }
      | Self::HierarchKeyword => ErrorKind::InvalidCard,
      Self::EmptyValue { .. }
      | Self::InvalidLogicalValue { .. }
      | Self::InvalidIntegerValue { .. }
      | Self::InvalidRealValue { .. }
      | Self::ValueTypeMismatch { .. }
      | Self::InvalidTForm { .. } => ErrorKind::InvalidValue,
      Self::MissingKeyword { .. }
      | Self::UnexpectedValue { .. }
      | Self::EndNotFound { .. }
      | Self::EndMisplaced => ErrorKind::InvalidHeader,
      Self::InvalidState { .. }
      | Self::HduOutOfOrder { .. }
      | Self::StrideLengthMismatch { .. } => ErrorKind::InvalidState,
      Self::UnsupportedColumnType { .. }
      | Self::UnsupportedXtension { .. }
      | Self::Unsupported { .. } => ErrorKind::Unsupported,
      Self::WithRecordContext { source, .. } | Self::WithOffsetContext { source, .. } => {
        source.kind()
      }
    }
  }

  /// Add to the error the full 80-byte record on which it occurred.
  pub(crate) fn record_context(self, record: &[u8]) -> Error {
    Self::WithRecordContext {
      record: bytes2string(record),
      source: self.into(),
    }
    .into()
  }

  /// Add to the error the stream byte offset at which it occurred.
  pub(crate) fn offset_context(self, offset: u64) -> Error {
    Self::WithOffsetContext {
      offset,
      source: self.into(),
    }
    .into()
  }
}
