//! Stride geometry and header construction for image HDUs.
//!
//! An image stride is one slice along the fastest-varying axis: `NAXIS1`
//! elements of `|BITPIX|/8` bytes each. The stride count accumulates the
//! remaining axes, `NAXIS2` through `NAXISn`.

use log::warn;

use crate::card::{collection::CardCollection, Card};
use crate::datatype::BitPix;
use crate::error::{new_missing_keyword_err, new_unexpected_value, Error};

/// Highest `NAXIS` value the FITS standard allows.
const MAX_NAXIS: i64 = 999;

/// Stride layout of an HDU data section, derived from the header cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
  /// Bytes per stride.
  pub stride_len: u64,
  /// Number of strides in the data section.
  pub total_strides: u64,
  /// Bytes of payload, padding excluded. Always `stride_len * total_strides`.
  pub data_byte_size: u64,
}

impl Geometry {
  pub(crate) const EMPTY: Self = Self {
    stride_len: 0,
    total_strides: 0,
    data_byte_size: 0,
  };
}

pub(crate) fn required_integer(cards: &CardCollection, keyword: &str) -> Result<i64, Error> {
  cards
    .integer(keyword)?
    .ok_or_else(|| new_missing_keyword_err(keyword))
}

/// Reads `BITPIX`, `NAXIS` and the `NAXISn` cards and checks their ranges.
pub(crate) fn axes(cards: &CardCollection) -> Result<(BitPix, Vec<u64>), Error> {
  let bitpix = BitPix::from_value(required_integer(cards, "BITPIX")?)?;
  let naxis = required_integer(cards, "NAXIS")?;
  if !(0..=MAX_NAXIS).contains(&naxis) {
    return Err(new_unexpected_value("NAXIS in [0, 999]", naxis));
  }
  let mut axes = Vec::with_capacity(naxis as usize);
  for i in 1..=naxis {
    let keyword = format!("NAXIS{}", i);
    let len = required_integer(cards, &keyword)?;
    if len < 0 {
      return Err(new_unexpected_value(format!("{} >= 0", keyword), len));
    }
    axes.push(len as u64);
  }
  Ok((bitpix, axes))
}

/// Computes the stride layout of an image (or axis-product generic) HDU.
/// Extensions additionally carry `PCOUNT = 0` and `GCOUNT`.
pub(crate) fn geometry(cards: &CardCollection, is_extension: bool) -> Result<Geometry, Error> {
  let (bitpix, axes) = axes(cards)?;
  if is_extension {
    let pcount = required_integer(cards, "PCOUNT")?;
    if pcount != 0 {
      return Err(new_unexpected_value("PCOUNT = 0 on an image extension", pcount));
    }
    let gcount = required_integer(cards, "GCOUNT")?;
    if gcount != 1 {
      warn!("GCOUNT = {} found, 1 expected. Value ignored.", gcount);
    }
  }
  Ok(match axes.split_first() {
    None => Geometry::EMPTY,
    Some((&naxis1, rest)) => {
      let stride_len = bitpix.byte_size() * naxis1;
      let total_strides = rest.iter().product::<u64>();
      Geometry {
        stride_len,
        total_strides,
        data_byte_size: stride_len * total_strides,
      }
    }
  })
}

fn push_axis_cards(cards: &mut CardCollection, bitpix: BitPix, axes: &[u64]) {
  cards.push(
    Card::integer("BITPIX", bitpix.i16_value() as i64).with_comment("Data element bit size"),
  );
  cards.push(Card::integer("NAXIS", axes.len() as i64).with_comment("Number of data axis"));
  for (i, &len) in axes.iter().enumerate() {
    cards.push(
      Card::integer(&format!("NAXIS{}", i + 1), len as i64)
        .with_comment(format!("Length of data axis {}", i + 1)),
    );
  }
}

/// The mandatory cards of a primary image header, in the prescribed order:
/// `SIMPLE`, `BITPIX`, `NAXIS`, `NAXISn`, `EXTEND`.
pub(crate) fn primary_cards(bitpix: BitPix, axes: &[u64]) -> CardCollection {
  assert!(axes.len() <= MAX_NAXIS as usize);
  let mut cards = CardCollection::new();
  cards.push(Card::logical("SIMPLE", true).with_comment("File conforms to FITS standard"));
  push_axis_cards(&mut cards, bitpix, axes);
  cards.push(Card::logical("EXTEND", true).with_comment("Extensions may be present"));
  cards
}

/// The mandatory cards of an `IMAGE` extension header: `XTENSION`, `BITPIX`,
/// `NAXIS`, `NAXISn`, `PCOUNT = 0`, `GCOUNT = 1`.
pub(crate) fn extension_cards(bitpix: BitPix, axes: &[u64]) -> CardCollection {
  assert!(axes.len() <= MAX_NAXIS as usize);
  let mut cards = CardCollection::new();
  cards.push(Card::string("XTENSION", "IMAGE").with_comment("Image extension"));
  push_axis_cards(&mut cards, bitpix, axes);
  cards.push(Card::integer("PCOUNT", 0).with_comment("No additional parameters"));
  cards.push(Card::integer("GCOUNT", 1).with_comment("One data group"));
  cards
}
