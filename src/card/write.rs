//! Serialization of card values into 80-byte records.
//!
//! Mandatory-keyword values follow the FITS fixed format: logicals at column
//! 30, numerics right justified through column 30, strings opening at column
//! 11. Values that cannot fit the fixed field degrade to the free format,
//! which the parser accepts equally.

use std::io::Write;

use log::warn;

use crate::block::CARD_SIZE;

/// Width of the fixed-format value field (card columns 11 to 30).
pub(crate) const FIXED_VALUE_WIDTH: usize = 20;

/// Longest string value fitting a single card: 70 bytes minus the quotes.
pub(crate) const MAX_STRING_VALUE_LEN: usize = 68;

const VALUE_INDICATOR: &[u8; 2] = b"= ";
const VALUE_COMMENT_SEPARATOR: &[u8; 3] = b" / ";

/// Write the keyword, left justified and space padded, in card columns 1-8.
pub(crate) fn write_keyword(record: &mut [u8; CARD_SIZE], keyword: &str) {
  debug_assert!(keyword.len() <= 8);
  record[..keyword.len()].copy_from_slice(keyword.as_bytes());
}

/// Write the `"= "` value indicator and return the 70-byte value/comment
/// field.
pub(crate) fn write_value_indicator(record: &mut [u8; CARD_SIZE]) -> &mut [u8] {
  record[8..10].copy_from_slice(VALUE_INDICATOR);
  &mut record[10..]
}

/// Append `" / "` then the comment, truncating to the space left. Too short a
/// field (less than the separator itself) drops the comment entirely.
pub(crate) fn write_comment(dest: &mut [u8], comment: &str) {
  if dest.len() > VALUE_COMMENT_SEPARATOR.len() {
    let (sep, tail) = dest.split_at_mut(VALUE_COMMENT_SEPARATOR.len());
    sep.copy_from_slice(VALUE_COMMENT_SEPARATOR);
    if comment.len() <= tail.len() {
      tail[..comment.len()].copy_from_slice(comment.as_bytes());
    } else {
      warn!(
        "Comment \"{}\" truncated to {} characters.",
        comment,
        tail.len()
      );
      tail.copy_from_slice(&comment.as_bytes()[..tail.len()]);
    }
  }
}

fn write_comment_if_any(dest: &mut [u8], comment: Option<&str>) {
  if let Some(comment) = comment {
    write_comment(dest, comment);
  }
}

/// Fixed-format logical: `T` or `F` at column 30 of the card, i.e. at byte 19
/// of the value field.
pub(crate) fn write_logical(value_comment: &mut [u8], value: bool, comment: Option<&str>) {
  let (v, c) = value_comment.split_at_mut(FIXED_VALUE_WIDTH);
  v[FIXED_VALUE_WIDTH - 1] = if value { b'T' } else { b'F' };
  write_comment_if_any(c, comment);
}

/// Fixed-format integer, right justified through column 30. The widest i64
/// (20 characters, sign included) fills the field exactly.
pub(crate) fn write_integer(value_comment: &mut [u8], value: i64, comment: Option<&str>) {
  let (v, c) = value_comment.split_at_mut(FIXED_VALUE_WIDTH);
  write!(&mut v[..], "{:>20}", value).unwrap();
  write_comment_if_any(c, comment);
}

/// Real value: fixed format (right justified through column 30) when the
/// shortest exact decimal representation fits, free format otherwise so that
/// the round trip never loses bits.
///
/// `Display` for floats never switches to scientific notation, so very large
/// or very small magnitudes are re-rendered with `{:E}` (same shortest-digit
/// guarantee). A representation with neither dot nor exponent would re-parse
/// as an integer, hence the appended `.0`.
pub(crate) fn write_real(value_comment: &mut [u8], value: f64, comment: Option<&str>) {
  let mut repr = format!("{}", value);
  if repr.len() > FIXED_VALUE_WIDTH {
    repr = format!("{:E}", value);
  }
  if repr.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
    repr.push_str(".0");
  }
  debug_assert!(repr.len() <= value_comment.len());
  if repr.len() <= FIXED_VALUE_WIDTH {
    let (v, c) = value_comment.split_at_mut(FIXED_VALUE_WIDTH);
    write!(&mut v[..], "{:>20}", repr).unwrap();
    write_comment_if_any(c, comment);
  } else {
    value_comment[..repr.len()].copy_from_slice(repr.as_bytes());
    write_comment_if_any(&mut value_comment[repr.len()..], comment);
  }
}

/// String value, quoted, opening at column 11. Values of less than 8
/// characters are space padded inside the quotes up to 8 (the FITS minimum
/// string field); single quotes are escaped by doubling. A value too long for
/// the card is truncated with a warning (long values are split over
/// `CONTINUE` cards one level above, before reaching this function).
pub(crate) fn write_string(value_comment: &mut [u8], value: &str, comment: Option<&str>) {
  let escaped;
  let mut value = if value.contains('\'') {
    escaped = value.replace('\'', "''");
    escaped.as_str()
  } else {
    value
  };
  if value.len() > MAX_STRING_VALUE_LEN {
    warn!(
      "String value \"{}\" truncated to {} characters.",
      value, MAX_STRING_VALUE_LEN
    );
    value = &value[..MAX_STRING_VALUE_LEN];
  }
  let quoted_len = value.len().max(8) + 2;
  let (v, c) = value_comment.split_at_mut(quoted_len);
  v[0] = b'\'';
  v[1..=value.len()].copy_from_slice(value.as_bytes());
  // Bytes in between stay spaces: the sub-minimum padding.
  v[quoted_len - 1] = b'\'';
  write_comment_if_any(c, comment);
}

/// Commentary card: the keyword then free text from column 9 on, truncated to
/// the card.
pub(crate) fn write_commentary(record: &mut [u8; CARD_SIZE], keyword: &str, text: &str) {
  write_keyword(record, keyword);
  let dest = &mut record[8..];
  if text.len() <= dest.len() {
    dest[..text.len()].copy_from_slice(text.as_bytes());
  } else {
    warn!(
      "Commentary text \"{}\" truncated to {} characters.",
      text,
      dest.len()
    );
    dest.copy_from_slice(&text.as_bytes()[..dest.len()]);
  }
}
