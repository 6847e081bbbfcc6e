//! Parsing of the value/comment part of a card, i.e. of the bytes located
//! after the `"= "` value indicator.
//!
//! All functions take the remaining unparsed bytes and return the parsed value
//! together with the still unparsed tail (where the comment, if any, sits).
//! Inputs are guaranteed ASCII by the record-level validation performed before
//! any of this code runs.

use std::borrow::Cow;

use crate::error::{
  new_empty_value_err, new_invalid_int_err, new_invalid_logical_err, new_invalid_real_err,
  new_string_closing_not_found_err, Error,
};

pub(crate) fn bytes2str(bytes: &[u8]) -> &str {
  // The record has been checked to be ASCII printable, so always valid UTF-8.
  unsafe { std::str::from_utf8_unchecked(bytes) }
}

/// Parse a logical value: the first non blank character, `T` or `F`.
///
/// The fixed format puts it at column 30 of the card and the free format
/// anywhere after the value indicator; scanning for the first non blank
/// character accepts both.
pub(crate) fn parse_logical(part_of_record: &[u8]) -> Result<(bool, &[u8]), Error> {
  match part_of_record.trim_ascii_start() {
    [b'T', tail @ ..] => Ok((true, tail)),
    [b'F', tail @ ..] => Ok((false, tail)),
    [c, ..] => Err(new_invalid_logical_err(*c, part_of_record)),
    [] => Err(new_empty_value_err("logical")),
  }
}

/// Returns the bytes making up the integer token, plus the unparsed tail.
fn integer_str(part_of_record: &[u8]) -> Result<(&[u8], &[u8]), Error> {
  let tail = part_of_record.trim_ascii_start();
  let token_len = tail
    .iter()
    .position(|&c| !(c.is_ascii_digit() || c == b'+' || c == b'-'))
    .unwrap_or(tail.len());
  if token_len > 0 {
    Ok(tail.split_at(token_len))
  } else {
    Err(new_empty_value_err("integer"))
  }
}

/// Parse an integer value, right justified in the fixed format, anywhere after
/// the value indicator in the free format. Leading `+` and zeros are accepted.
pub(crate) fn parse_integer(part_of_record: &[u8]) -> Result<(i64, &[u8]), Error> {
  integer_str(part_of_record).and_then(|(v, tail)| {
    bytes2str(v)
      .parse::<i64>()
      .map_err(|err| new_invalid_int_err(err, part_of_record))
      .map(|v| (v, tail))
  })
}

/// Returns the bytes making up the real token, plus the unparsed tail.
fn real_str(part_of_record: &[u8]) -> Result<(&[u8], &[u8]), Error> {
  let tail = part_of_record.trim_ascii_start();
  let token_len = tail
    .iter()
    .position(|&c| {
      !(c.is_ascii_digit()
        || c == b'+'
        || c == b'-'
        || c == b'.'
        || c == b'e'
        || c == b'E'
        || c == b'd'
        || c == b'D')
    })
    .unwrap_or(tail.len());
  if token_len > 0 {
    Ok(tail.split_at(token_len))
  } else {
    Err(new_empty_value_err("real"))
  }
}

/// Parse a real value. The FITS `D` exponent marker is accepted and treated
/// as `E` (Fortran double precision heritage).
pub(crate) fn parse_real(part_of_record: &[u8]) -> Result<(f64, &[u8]), Error> {
  real_str(part_of_record).and_then(|(v, tail)| {
    let s = bytes2str(v);
    let normalized: Cow<'_, str> = if s.contains(['d', 'D']) {
      Cow::Owned(s.replace(['d', 'D'], "E"))
    } else {
      Cow::Borrowed(s)
    };
    normalized
      .parse::<f64>()
      .map_err(|err| new_invalid_real_err(err, part_of_record))
      .map(|v| (v, tail))
  })
}

/// True when the numeric token (already known to start a number) denotes a
/// real rather than an integer.
pub(crate) fn numeric_token_is_real(part_of_record: &[u8]) -> bool {
  real_str(part_of_record)
    .map(|(token, _)| token.iter().any(|&c| matches!(c, b'.' | b'e' | b'E' | b'd' | b'D')))
    .unwrap_or(false)
}

/// Parse a string value enclosed between two single quotes `'`. Inside, a
/// quote is encoded by two successive quotes `''`. Leading spaces are
/// significant, trailing spaces are not.
///
/// A `Cow` is returned since the escaped case is the only one needing an
/// allocation.
pub(crate) fn parse_string(part_of_record: &[u8]) -> Result<(Cow<'_, str>, &[u8]), Error> {
  let mut res = Cow::default();
  let mut sub = part_of_record.trim_ascii_start();
  loop {
    if let [b'\'', tail @ ..] = sub {
      match tail.iter().position(|&b| b == b'\'') {
        Some(i) => {
          if tail.get(i + 1).map(|b| *b == b'\'').unwrap_or(false) {
            res += Cow::from(bytes2str(&tail[..=i])); // includes the first quote of the pair
            sub = &tail[i + 1..]; // starts at the second quote of the pair
          } else {
            res += Cow::from(bytes2str(&tail[..i]).trim_end());
            return Ok((res, &tail[i + 1..]));
          }
        }
        None => return Err(new_string_closing_not_found_err(part_of_record)),
      }
    } else {
      // Can be raised only at the first loop iteration.
      return Err(new_string_closing_not_found_err(part_of_record));
    }
  }
}

/// Parse the comment remaining once the value has been consumed: everything
/// after the first `/`, stripped of a single leading space and of trailing
/// blanks. Returns `None` when there is no comment.
pub(crate) fn parse_comment(part_of_record: &[u8]) -> Option<&str> {
  if let [b'/', tail @ ..] = part_of_record.trim_ascii_start() {
    let tail = tail.strip_prefix(b" ").unwrap_or(tail);
    Some(bytes2str(tail.trim_ascii_end()))
  } else {
    None
  }
}
