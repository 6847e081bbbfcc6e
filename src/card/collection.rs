//! Ordered, keyword-indexed container of cards.

use crate::card::{Card, Value, CONTINUE_KEYWORD, END_KEYWORD};
use crate::error::{new_end_misplaced_err, Error};

/// Keyword of the OGIP long-string convention marker. Its presence in a
/// collection enables `CONTINUE` assembly on read and is emitted when a
/// written value needs splitting.
pub const LONGSTRN_KEYWORD: &str = "LONGSTRN";

/// Longest raw string content of one card once the trailing `&` of a
/// continued value is accounted for.
const CONTINUED_SEGMENT_LEN: usize = super::write::MAX_STRING_VALUE_LEN - 1;

/// Sort class of a keyword: mandatory cards first in the FITS prescribed
/// order, then user cards (insertion order preserved by the stable sort),
/// then `END`.
fn sort_key(card: &Card) -> (u8, u16) {
  match card.keyword() {
    "SIMPLE" | "XTENSION" => (0, 0),
    "BITPIX" => (1, 0),
    "NAXIS" => (2, 0),
    "EXTEND" => (4, 0),
    "PCOUNT" => (5, 0),
    "GCOUNT" => (6, 0),
    "TFIELDS" => (7, 0),
    END_KEYWORD if card.is_end() => (u8::MAX, 0),
    kw => match kw.strip_prefix("NAXIS").and_then(|n| n.parse::<u16>().ok()) {
      Some(n) => (3, n),
      None => (100, 0),
    },
  }
}

/// Ordered sequence of cards with get-by-keyword (first match) and
/// set-by-keyword (replace-or-append) access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardCollection {
  cards: Vec<Card>,
}

impl CardCollection {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.cards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Card> {
    self.cards.iter()
  }

  /// Append, regardless of an already present card with the same keyword.
  pub fn push(&mut self, card: Card) {
    self.cards.push(card);
  }

  /// First card with the given keyword (ASCII-case-insensitive).
  pub fn get(&self, keyword: &str) -> Option<&Card> {
    self
      .cards
      .iter()
      .find(|card| card.keyword().eq_ignore_ascii_case(keyword))
  }

  pub fn contains(&self, keyword: &str) -> bool {
    self.get(keyword).is_some()
  }

  fn index_of(&self, keyword: &str) -> Option<usize> {
    self
      .cards
      .iter()
      .position(|card| card.keyword().eq_ignore_ascii_case(keyword))
  }

  /// Replace the first card with the same keyword, or append (before a
  /// trailing `END`, if any). Commentary cards are never replaced, always
  /// appended: a header may carry any number of them.
  pub fn set(&mut self, card: Card) {
    if card.is_commentary() {
      self.append_before_end(card);
      return;
    }
    match self.index_of(card.keyword()) {
      Some(i) => self.cards[i] = card,
      None => self.append_before_end(card),
    }
  }

  fn append_before_end(&mut self, card: Card) {
    match self.cards.last() {
      Some(last) if last.is_end() => self.cards.insert(self.cards.len() - 1, card),
      _ => self.cards.push(card),
    }
  }

  /// Remove and return the first card with the given keyword.
  pub fn remove(&mut self, keyword: &str) -> Option<Card> {
    self.index_of(keyword).map(|i| self.cards.remove(i))
  }

  /// Append the `END` sentinel if not already present.
  pub fn ensure_end(&mut self) {
    if !self.cards.iter().any(|card| card.is_end()) {
      self.cards.push(Card::end());
    }
  }

  /// A collection is valid iff exactly one `END` exists, as the last card.
  pub fn validate(&self) -> Result<(), Error> {
    let n_end = self.cards.iter().filter(|card| card.is_end()).count();
    if n_end == 1 && self.cards.last().map(Card::is_end).unwrap_or(false) {
      Ok(())
    } else {
      Err(new_end_misplaced_err())
    }
  }

  /// Stable canonical sort: mandatory cards first in the prescribed FITS
  /// order, unknown keywords keeping their relative input order, `END` last.
  pub fn sort(&mut self) {
    self.cards.sort_by_key(sort_key);
  }

  // Typed accessors. `Ok(None)` when the keyword is absent, `InvalidValue`
  // when present with another type.

  pub fn logical(&self, keyword: &str) -> Result<Option<bool>, Error> {
    self.get(keyword).map(Card::logical_value).transpose()
  }

  pub fn integer(&self, keyword: &str) -> Result<Option<i64>, Error> {
    self.get(keyword).map(Card::integer_value).transpose()
  }

  pub fn real(&self, keyword: &str) -> Result<Option<f64>, Error> {
    self.get(keyword).map(Card::real_value).transpose()
  }

  /// String accessor, applying the OGIP long-string convention: when
  /// `LONGSTRN` is present in the collection and the value ends with `&`,
  /// following `CONTINUE` cards extend it, each `&` removed.
  pub fn string(&self, keyword: &str) -> Result<Option<String>, Error> {
    let i = match self.index_of(keyword) {
      Some(i) => i,
      None => return Ok(None),
    };
    let mut value = self.cards[i].string_value()?.to_owned();
    if self.contains(LONGSTRN_KEYWORD) {
      for card in &self.cards[i + 1..] {
        if !(value.ends_with('&') && card.is_continuation()) {
          break;
        }
        value.pop();
        value.push_str(card.string_value()?);
      }
    }
    Ok(Some(value))
  }

  /// The cards as written to the stream: string values too long for one card
  /// are split into a `&`-terminated head plus `CONTINUE` cards, adding the
  /// `LONGSTRN` marker once if the collection does not carry it yet.
  pub(crate) fn expanded_cards(&self) -> Vec<Card> {
    let mut expanded = Vec::with_capacity(self.cards.len());
    let mut longstrn_needed = !self.contains(LONGSTRN_KEYWORD);
    for card in &self.cards {
      match card.value() {
        Some(Value::Str(s)) if escaped_len(s) > super::write::MAX_STRING_VALUE_LEN => {
          if longstrn_needed {
            expanded.push(
              Card::string(LONGSTRN_KEYWORD, "OGIP 1.0")
                .with_comment("Long string convention used"),
            );
            longstrn_needed = false;
          }
          split_long_string(card, &mut expanded);
        }
        _ => expanded.push(card.clone()),
      }
    }
    expanded
  }
}

impl FromIterator<Card> for CardCollection {
  fn from_iter<T: IntoIterator<Item = Card>>(iter: T) -> Self {
    Self {
      cards: iter.into_iter().collect(),
    }
  }
}

/// Serialized length of a string content, `''` escaping included.
fn escaped_len(s: &str) -> usize {
  s.len() + s.bytes().filter(|&b| b == b'\'').count()
}

/// Greedily cut `card`'s string value into segments whose escaped form plus
/// the `&` continuation marker fit one card each.
fn split_long_string(card: &Card, dest: &mut Vec<Card>) {
  let value = card.string_value().expect("checked by the caller");
  let mut segments: Vec<String> = Vec::new();
  let mut segment = String::new();
  let mut room = CONTINUED_SEGMENT_LEN;
  for c in value.chars() {
    let cost = if c == '\'' { 2 } else { c.len_utf8() };
    if cost > room {
      segments.push(std::mem::take(&mut segment));
      room = CONTINUED_SEGMENT_LEN;
    }
    segment.push(c);
    room -= cost;
  }
  segments.push(segment);
  if card.comment().is_some() {
    log::warn!(
      "Comment of the long string card '{}' dropped on splitting.",
      card.keyword()
    );
  }
  let last = segments.len() - 1;
  for (i, mut segment) in segments.into_iter().enumerate() {
    if i < last {
      segment.push('&');
    }
    dest.push(if i == 0 {
      Card::string(card.keyword(), segment)
    } else {
      Card::string(CONTINUE_KEYWORD, segment)
    });
  }
}
