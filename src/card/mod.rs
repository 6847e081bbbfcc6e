//! Single 80-byte header record: keyword, optional value, optional comment.

use std::fmt::{self, Display, Formatter};

use crate::block::CARD_SIZE;
use crate::error::{
  new_hierarch_kw_err, new_invalid_keyword_byte_err, new_non_ascii_card_err,
  new_unclassifiable_value_err, new_value_type_err, Error,
};

pub mod collection;
pub(crate) mod read;
pub(crate) mod write;

use self::read::{
  bytes2str, numeric_token_is_real, parse_comment, parse_integer, parse_logical, parse_real,
  parse_string,
};

pub const END_KEYWORD: &str = "END";
pub const CONTINUE_KEYWORD: &str = "CONTINUE";
/// Keywords whose whole remainder is free text, with no value indicator.
pub const COMMENTARY_KEYWORDS: [&str; 3] = ["COMMENT", "HISTORY", ""];

/// A typed card value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// `T` or `F` at column 30.
  Logical(bool),
  Integer(i64),
  Real(f64),
  /// Quoted string, `''` escaping a quote.
  Str(String),
}

impl Value {
  pub fn type_name(&self) -> &'static str {
    match self {
      Self::Logical(_) => "logical",
      Self::Integer(_) => "integer",
      Self::Real(_) => "real",
      Self::Str(_) => "string",
    }
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Logical(true) => f.write_str("T"),
      Self::Logical(false) => f.write_str("F"),
      Self::Integer(v) => write!(f, "{}", v),
      Self::Real(v) => write!(f, "{}", v),
      Self::Str(v) => write!(f, "'{}'", v),
    }
  }
}

/// One 80-byte header record.
///
/// Three shapes share this struct:
/// * value cards: a value, possibly a comment;
/// * commentary cards (`COMMENT`, `HISTORY`, blank keyword): no value, the
///   free text carried in `comment`;
/// * the `END` sentinel: keyword only.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
  /// Upper case, at most 8 bytes of `[A-Z0-9_-]`.
  keyword: String,
  value: Option<Value>,
  comment: Option<String>,
}

/// Checks and normalizes a keyword: at most 8 bytes of `[A-Za-z0-9_-]`,
/// returned upper case. Comparisons anywhere in the crate are made on the
/// normalized form, so keyword matching is ASCII-case-insensitive by
/// construction and no locale is ever consulted.
fn normalize_keyword(keyword: &str) -> Result<String, Error> {
  if keyword.len() > 8 {
    return Err(new_invalid_keyword_byte_err(
      keyword.as_bytes()[8],
      keyword.as_bytes(),
    ));
  }
  for &b in keyword.as_bytes() {
    if !(b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
      return Err(new_invalid_keyword_byte_err(b, keyword.as_bytes()));
    }
  }
  Ok(keyword.to_ascii_uppercase())
}

impl Card {
  /// Build a value card.
  ///
  /// # Panics
  /// If the keyword is not made of at most 8 bytes of `[A-Za-z0-9_-]`; use
  /// [`Card::parse`] for untrusted input.
  pub fn new(keyword: &str, value: Value) -> Self {
    Self {
      keyword: normalize_keyword(keyword).unwrap_or_else(|e| panic!("{}", e)),
      value: Some(value),
      comment: None,
    }
  }

  pub fn logical(keyword: &str, value: bool) -> Self {
    Self::new(keyword, Value::Logical(value))
  }

  pub fn integer(keyword: &str, value: i64) -> Self {
    Self::new(keyword, Value::Integer(value))
  }

  pub fn real(keyword: &str, value: f64) -> Self {
    Self::new(keyword, Value::Real(value))
  }

  pub fn string<S: Into<String>>(keyword: &str, value: S) -> Self {
    Self::new(keyword, Value::Str(value.into()))
  }

  /// Build a commentary card (`COMMENT`, `HISTORY` or the blank keyword).
  ///
  /// # Panics
  /// If the keyword is not one of the commentary keywords.
  pub fn commentary<S: Into<String>>(keyword: &str, text: S) -> Self {
    let keyword = keyword.to_ascii_uppercase();
    assert!(
      COMMENTARY_KEYWORDS.contains(&keyword.as_str()),
      "not a commentary keyword: {}",
      keyword
    );
    Self {
      keyword,
      value: None,
      comment: Some(text.into()),
    }
  }

  /// The `END` sentinel card.
  pub fn end() -> Self {
    Self {
      keyword: END_KEYWORD.into(),
      value: None,
      comment: None,
    }
  }

  pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
    self.comment = Some(comment.into());
    self
  }

  pub fn keyword(&self) -> &str {
    &self.keyword
  }

  pub fn value(&self) -> Option<&Value> {
    self.value.as_ref()
  }

  pub fn comment(&self) -> Option<&str> {
    self.comment.as_deref()
  }

  pub fn is_end(&self) -> bool {
    self.keyword == END_KEYWORD && self.value.is_none() && self.comment.is_none()
  }

  pub fn is_commentary(&self) -> bool {
    self.value.is_none() && COMMENTARY_KEYWORDS.contains(&self.keyword.as_str())
  }

  pub(crate) fn is_continuation(&self) -> bool {
    self.keyword == CONTINUE_KEYWORD
  }

  /// Typed access, `InvalidValue` on another value type.
  pub fn logical_value(&self) -> Result<bool, Error> {
    match &self.value {
      Some(Value::Logical(v)) => Ok(*v),
      _ => Err(new_value_type_err(&self.keyword, "logical")),
    }
  }

  /// Typed access, `InvalidValue` on another value type.
  pub fn integer_value(&self) -> Result<i64, Error> {
    match &self.value {
      Some(Value::Integer(v)) => Ok(*v),
      _ => Err(new_value_type_err(&self.keyword, "integer")),
    }
  }

  /// Typed access; an integer value is accepted and widened.
  pub fn real_value(&self) -> Result<f64, Error> {
    match &self.value {
      Some(Value::Real(v)) => Ok(*v),
      Some(Value::Integer(v)) => Ok(*v as f64),
      _ => Err(new_value_type_err(&self.keyword, "real")),
    }
  }

  /// Typed access, `InvalidValue` on another value type.
  pub fn string_value(&self) -> Result<&str, Error> {
    match &self.value {
      Some(Value::Str(v)) => Ok(v),
      _ => Err(new_value_type_err(&self.keyword, "string")),
    }
  }

  /// Parse one 80-byte record.
  ///
  /// The record must be ASCII printable throughout (0x20 to 0x7E). The card
  /// is a value card when bytes 9-10 hold the `"= "` indicator (or for
  /// `CONTINUE`, which carries its string without the indicator), a
  /// commentary card otherwise.
  pub fn parse(record: &[u8; CARD_SIZE]) -> Result<Self, Error> {
    for (i, &b) in record.iter().enumerate() {
      if !(0x20..=0x7E).contains(&b) {
        return Err(new_non_ascii_card_err(i, b).record_context(record));
      }
    }
    let keyword_bytes = record[..8].trim_ascii_end();
    let keyword =
      normalize_keyword(bytes2str(keyword_bytes)).map_err(|e| e.record_context(record))?;
    if keyword == "HIERARCH" {
      return Err(new_hierarch_kw_err().record_context(record));
    }
    if keyword == END_KEYWORD {
      return Ok(Self::end());
    }
    let has_indicator = &record[8..10] == b"= ";
    let is_commentary_kw = COMMENTARY_KEYWORDS.contains(&keyword.as_str());
    if (has_indicator && !is_commentary_kw) || keyword == CONTINUE_KEYWORD {
      Self::parse_value_comment(keyword, &record[10..]).map_err(|e| e.record_context(record))
    } else {
      // Commentary (or unknown valueless keyword): bytes 9-80 are free text.
      let text = bytes2str(record[8..].trim_ascii_end());
      Ok(Self {
        keyword,
        value: None,
        comment: if text.is_empty() {
          None
        } else {
          Some(text.into())
        },
      })
    }
  }

  /// Value classification on the first non blank byte, per the FITS grammar:
  /// quote opens a string, `T`/`F` a logical, sign/digit/dot a number (real
  /// when the token carries `.` or an exponent marker, integer otherwise).
  fn parse_value_comment(keyword: String, part_of_record: &[u8]) -> Result<Self, Error> {
    let trimmed = part_of_record.trim_ascii_start();
    let (value, tail) = match trimmed.first().copied() {
      None => (None, trimmed),
      Some(b'/') => (None, trimmed),
      Some(b'\'') => {
        let (v, tail) = parse_string(trimmed)?;
        (Some(Value::Str(v.into_owned())), tail)
      }
      Some(b'T') | Some(b'F') => {
        let (v, tail) = parse_logical(trimmed)?;
        (Some(Value::Logical(v)), tail)
      }
      Some(c) if c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.') => {
        if numeric_token_is_real(trimmed) {
          let (v, tail) = parse_real(trimmed)?;
          (Some(Value::Real(v)), tail)
        } else {
          let (v, tail) = parse_integer(trimmed)?;
          (Some(Value::Integer(v)), tail)
        }
      }
      Some(c) => return Err(new_unclassifiable_value_err(c, part_of_record)),
    };
    Ok(Self {
      keyword,
      value,
      comment: parse_comment(tail).map(String::from),
    })
  }

  /// Serialize into exactly 80 bytes, space padded.
  pub fn serialize(&self, record: &mut [u8; CARD_SIZE]) {
    record.fill(b' ');
    if self.is_end() {
      write::write_keyword(record, END_KEYWORD);
    } else if self.is_commentary() {
      write::write_commentary(record, &self.keyword, self.comment.as_deref().unwrap_or(""));
    } else if self.value.is_none() {
      // Undefined value: the indicator, a blank value field, the comment
      // after column 30.
      write::write_keyword(record, &self.keyword);
      let value_comment = write::write_value_indicator(record);
      if let Some(comment) = self.comment.as_deref() {
        write::write_comment(&mut value_comment[write::FIXED_VALUE_WIDTH..], comment);
      }
    } else if self.is_continuation() {
      // CONTINUE carries its string value with no value indicator.
      write::write_keyword(record, &self.keyword);
      self.serialize_value(&mut record[10..]);
    } else {
      write::write_keyword(record, &self.keyword);
      let value_comment = write::write_value_indicator(record);
      self.serialize_value(value_comment);
    }
  }

  fn serialize_value(&self, value_comment: &mut [u8]) {
    let comment = self.comment.as_deref();
    match self.value.as_ref().expect("value card") {
      Value::Logical(v) => write::write_logical(value_comment, *v, comment),
      Value::Integer(v) => write::write_integer(value_comment, *v, comment),
      Value::Real(v) => write::write_real(value_comment, *v, comment),
      Value::Str(v) => write::write_string(value_comment, v, comment),
    }
  }

  pub fn serialize_to_array(&self) -> [u8; CARD_SIZE] {
    let mut record = [b' '; CARD_SIZE];
    self.serialize(&mut record);
    record
  }
}

impl Display for Card {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    let record = self.serialize_to_array();
    f.write_str(bytes2str(&record))
  }
}
