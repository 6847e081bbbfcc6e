//! Header/Data Units: the common lifecycle state machine plus the per-kind
//! stride strategies.
//!
//! An HDU is a header of cards followed by a data section streamed in
//! strides, both padded to 2880-byte blocks. The lifecycle is strictly
//! `Start -> Header -> Strides -> Done`; cards are mutable only in `Start`,
//! stride I/O is legal only between the header and the last stride. HDUs are
//! detached descriptors: stream operations borrow the owning reader/writer
//! explicitly, and a sequence number keeps them honest about which HDU is the
//! current one.

use std::io::Write;

use log::warn;

use crate::block::{BlockSource, BLOCK_SIZE, CARD_SIZE, DATA_PAD_BYTE, HEADER_PAD_BYTE};
use crate::card::{collection::CardCollection, Card};
use crate::codec::BitCodec;
use crate::datatype::BitPix;
use crate::error::{
  new_end_not_found_err, new_hdu_out_of_order_err, new_invalid_state_err, new_missing_keyword_err,
  new_stride_len_err, new_unexpected_value, new_unsupported_xtension_err, Error,
};
use crate::file::{FitsReader, FitsWriter};
use crate::hdu::bintable::{Column, ColumnSpec, FieldValue};
use crate::hdu::image::Geometry;

pub mod bintable;
pub mod image;

/// Upper bound on the number of cards scanned before giving up on `END`.
const MAX_HEADER_CARDS: usize = 10_000;

/// Lifecycle state of an HDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduState {
  /// Created; cards are mutable; nothing touched the stream yet.
  Start,
  /// Header read or written; the data section is next.
  Header,
  /// At least one stride consumed or produced.
  Strides,
  /// All strides and the trailing pad block consumed or produced.
  Done,
}

impl HduState {
  pub(crate) const fn name(&self) -> &'static str {
    match self {
      Self::Start => "Start",
      Self::Header => "Header",
      Self::Strides => "Strides",
      Self::Done => "Done",
    }
  }
}

/// Kind of an HDU, driving its stride strategy and keyword views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
  /// First HDU of a file: `SIMPLE = T`, image semantics.
  PrimaryImage,
  /// `XTENSION = 'IMAGE   '`.
  ImageExtension,
  /// `XTENSION = 'BINTABLE'`.
  BinaryTable,
  /// Axis-product view with no `SIMPLE`/`XTENSION` requirement. Used through
  /// prototypes to force a raw look at any HDU.
  Generic,
}

impl HduKind {
  pub const fn is_image(&self) -> bool {
    matches!(self, Self::PrimaryImage | Self::ImageExtension)
  }
}

/// Decide the concrete HDU kind from freshly read header cards: `SIMPLE`
/// means primary, else `XTENSION` names the extension type.
pub(crate) fn dispatch_kind(cards: &CardCollection) -> Result<HduKind, Error> {
  if cards.contains("SIMPLE") {
    if !cards.logical("SIMPLE")?.unwrap_or(false) {
      warn!("SIMPLE = F: non conformant file, parsed as a standard FITS anyway.");
    }
    return Ok(HduKind::PrimaryImage);
  }
  match cards.string("XTENSION")? {
    Some(xtension) => match xtension.trim_end() {
      "IMAGE" => Ok(HduKind::ImageExtension),
      "BINTABLE" => Ok(HduKind::BinaryTable),
      other => Err(new_unsupported_xtension_err(other.as_bytes())),
    },
    None => Err(new_missing_keyword_err("XTENSION")),
  }
}

/// Read cards block by block until the `END` card, `first_block` having
/// already been pulled from the stream. On return the source sits on the
/// first data byte (headers end on a block boundary by construction).
pub(crate) fn read_header_cards<S: BlockSource>(
  source: &mut S,
  mut block: [u8; BLOCK_SIZE],
  header_position: u64,
) -> Result<CardCollection, Error> {
  let mut cards = CardCollection::new();
  loop {
    for record in block.chunks_exact(CARD_SIZE) {
      let record: &[u8; CARD_SIZE] = record.try_into().unwrap();
      let offset = header_position + (cards.len() * CARD_SIZE) as u64;
      let card = Card::parse(record).map_err(|e| (*e).offset_context(offset))?;
      let is_end = card.is_end();
      cards.push(card);
      if is_end {
        return Ok(cards);
      }
      if cards.len() >= MAX_HEADER_CARDS {
        return Err(new_end_not_found_err(cards.len()));
      }
    }
    // An end of stream here is inside the header: a plain I/O error.
    source.read_exact(&mut block)?;
  }
}

/// One Header/Data Unit.
///
/// The shared base (cards, positions, lifecycle, stride counters) is common
/// to every kind; the kind selects the stride geometry and the keyword
/// validation applied when the header is read or written.
#[derive(Debug)]
pub struct Hdu {
  kind: HduKind,
  state: HduState,
  cards: CardCollection,
  /// Binary table column descriptors; empty for every other kind.
  columns: Vec<Column>,
  /// Byte offset of the first header block. Always block aligned.
  header_position: u64,
  /// Byte offset of the first data byte. Always block aligned.
  data_position: u64,
  stride_len: u64,
  total_strides: u64,
  stride_counter: u64,
  /// Position in the owning file's HDU sequence, set on attach. A detached
  /// snapshot (a clone) carries `None` and cannot touch the stream.
  seq: Option<usize>,
}

/// A clone is a detached snapshot of the metadata: it keeps cards, geometry
/// and lifecycle state but drops the sequence number, so no stream operation
/// will ever accept it.
impl Clone for Hdu {
  fn clone(&self) -> Self {
    Self {
      kind: self.kind,
      state: self.state,
      cards: self.cards.clone(),
      columns: self.columns.clone(),
      header_position: self.header_position,
      data_position: self.data_position,
      stride_len: self.stride_len,
      total_strides: self.total_strides,
      stride_counter: self.stride_counter,
      seq: None,
    }
  }
}

impl Hdu {
  fn from_cards_internal(kind: HduKind, cards: CardCollection) -> Self {
    Self {
      kind,
      state: HduState::Start,
      cards,
      columns: Vec::new(),
      header_position: 0,
      data_position: 0,
      stride_len: 0,
      total_strides: 0,
      stride_counter: 0,
      seq: None,
    }
  }

  /// A primary image HDU to be written: `SIMPLE = T`, `BITPIX`, `NAXIS`,
  /// `NAXISn`, `EXTEND = T`.
  pub fn new_primary(bitpix: BitPix, axes: &[u64]) -> Self {
    Self::from_cards_internal(HduKind::PrimaryImage, image::primary_cards(bitpix, axes))
  }

  /// An `IMAGE` extension HDU to be written.
  pub fn new_image_extension(bitpix: BitPix, axes: &[u64]) -> Self {
    Self::from_cards_internal(HduKind::ImageExtension, image::extension_cards(bitpix, axes))
  }

  /// A `BINTABLE` extension HDU to be written: one row per stride.
  pub fn new_binary_table(n_rows: u64, columns: &[ColumnSpec]) -> Self {
    Self::from_cards_internal(HduKind::BinaryTable, bintable::table_cards(n_rows, columns))
  }

  /// An empty HDU of the given kind. The main use is as a prototype handed
  /// to [`FitsReader::push_prototype`], `HduKind::Generic` in particular
  /// forcing the axis-product view on any extension.
  pub fn new_prototype(kind: HduKind) -> Self {
    Self::from_cards_internal(kind, CardCollection::new())
  }

  /// An HDU to be written from caller-assembled cards. The mandatory cards
  /// are validated when the header is written.
  pub fn from_cards(kind: HduKind, cards: CardCollection) -> Self {
    Self::from_cards_internal(kind, cards)
  }

  // Plain accessors.

  pub fn kind(&self) -> HduKind {
    self.kind
  }

  pub fn state(&self) -> HduState {
    self.state
  }

  pub fn cards(&self) -> &CardCollection {
    &self.cards
  }

  /// Column descriptors of a binary table, in column order. Empty for the
  /// other kinds.
  pub fn columns(&self) -> &[Column] {
    &self.columns
  }

  /// Byte offset of the header in the stream.
  pub fn header_position(&self) -> u64 {
    self.header_position
  }

  /// Byte offset of the data section in the stream.
  pub fn data_position(&self) -> u64 {
    self.data_position
  }

  /// Bytes per stride: one `NAXIS1` slice of an image, one row of a table.
  pub fn stride_length(&self) -> u64 {
    self.stride_len
  }

  pub fn total_strides(&self) -> u64 {
    self.total_strides
  }

  /// Strides consumed or produced so far.
  pub fn stride_counter(&self) -> u64 {
    self.stride_counter
  }

  /// Bytes of data payload, block padding excluded.
  pub fn data_byte_size(&self) -> u64 {
    self.stride_len * self.total_strides
  }

  // Mandatory keyword accessors.

  pub fn simple(&self) -> Result<Option<bool>, Error> {
    self.cards.logical("SIMPLE")
  }

  pub fn xtension(&self) -> Result<Option<String>, Error> {
    self.cards.string("XTENSION")
  }

  pub fn bitpix(&self) -> Result<BitPix, Error> {
    BitPix::from_value(image::required_integer(&self.cards, "BITPIX")?)
  }

  pub fn naxis(&self) -> Result<u32, Error> {
    let naxis = image::required_integer(&self.cards, "NAXIS")?;
    if (0..=999).contains(&naxis) {
      Ok(naxis as u32)
    } else {
      Err(new_unexpected_value("NAXIS in [0, 999]", naxis))
    }
  }

  /// The `NAXISi` card value, `i` in `[1, NAXIS]`.
  pub fn naxis_n(&self, i: u32) -> Result<u64, Error> {
    let keyword = format!("NAXIS{}", i);
    let len = image::required_integer(&self.cards, &keyword)?;
    if len >= 0 {
      Ok(len as u64)
    } else {
      Err(new_unexpected_value(format!("{} >= 0", keyword), len))
    }
  }

  pub fn extend(&self) -> Result<Option<bool>, Error> {
    self.cards.logical("EXTEND")
  }

  pub fn extname(&self) -> Result<Option<String>, Error> {
    self.cards.string("EXTNAME")
  }

  // Card mutation, legal while the header has not been read or written.

  /// Replace-or-append a card. `InvalidState` once the HDU left `Start`.
  pub fn set_card(&mut self, card: Card) -> Result<(), Error> {
    self.check_mutable("set_card")?;
    self.cards.set(card);
    Ok(())
  }

  /// Remove the first card with the given keyword. `InvalidState` once the
  /// HDU left `Start`.
  pub fn remove_card(&mut self, keyword: &str) -> Result<Option<Card>, Error> {
    self.check_mutable("remove_card")?;
    Ok(self.cards.remove(keyword))
  }

  fn check_mutable(&self, operation: &'static str) -> Result<(), Error> {
    match self.state {
      HduState::Start => Ok(()),
      state => Err(new_invalid_state_err(operation, state.name())),
    }
  }

  /// Decode every column of a raw table row (as returned by
  /// [`Hdu::read_stride`]).
  pub fn decode_row(&self, row: &[u8], codec: BitCodec) -> Result<Vec<FieldValue>, Error> {
    self
      .columns
      .iter()
      .map(|column| column.decode_field(row, codec))
      .collect()
  }

  /// Compute and install the stride geometry from the current cards, after
  /// the kind-specific mandatory keyword checks.
  fn apply_geometry(&mut self) -> Result<(), Error> {
    let geometry = match self.kind {
      HduKind::PrimaryImage => {
        // EXTEND belongs to the mandatory primary keywords.
        self
          .cards
          .logical("EXTEND")?
          .ok_or_else(|| new_missing_keyword_err("EXTEND"))?;
        image::geometry(&self.cards, false)?
      }
      HduKind::ImageExtension => image::geometry(&self.cards, true)?,
      HduKind::Generic => image::geometry(&self.cards, false)?,
      HduKind::BinaryTable => {
        let (geometry, columns) = bintable::geometry(&self.cards)?;
        self.columns = columns;
        geometry
      }
    };
    let Geometry {
      stride_len,
      total_strides,
      ..
    } = geometry;
    self.stride_len = stride_len;
    self.total_strides = total_strides;
    self.stride_counter = 0;
    Ok(())
  }

  // Read side.

  /// Install freshly read header cards; the HDU becomes immutable.
  pub(crate) fn attach_read(
    &mut self,
    seq: usize,
    header_position: u64,
    data_position: u64,
    cards: CardCollection,
  ) -> Result<(), Error> {
    self.check_mutable("attach prototype")?;
    debug_assert_eq!(header_position % BLOCK_SIZE as u64, 0);
    debug_assert_eq!(data_position % BLOCK_SIZE as u64, 0);
    self.cards = cards;
    self.apply_geometry()?;
    self.header_position = header_position;
    self.data_position = data_position;
    self.seq = Some(seq);
    self.state = if self.total_strides == 0 {
      // No stride and no pad block: the data section is empty.
      HduState::Done
    } else {
      HduState::Header
    };
    Ok(())
  }

  /// Read the next stride into a fresh buffer of `stride_length()` bytes.
  pub fn read_stride<S: BlockSource>(
    &mut self,
    reader: &mut FitsReader<S>,
  ) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0_u8; self.stride_len as usize];
    self.read_stride_into(reader, &mut buf)?;
    Ok(buf)
  }

  /// Read the next stride into a caller buffer of exactly `stride_length()`
  /// bytes. Reading the last stride also consumes the trailing pad block, so
  /// the stream is left block aligned.
  pub fn read_stride_into<S: BlockSource>(
    &mut self,
    reader: &mut FitsReader<S>,
    buf: &mut [u8],
  ) -> Result<(), Error> {
    reader.check_open("read_stride")?;
    self.check_striding("read_stride")?;
    reader.check_current(self.seq, "read_stride")?;
    if buf.len() as u64 != self.stride_len {
      return Err(new_stride_len_err(self.stride_len, buf.len()));
    }
    let offset = reader.source.position();
    reader
      .source
      .read_exact(buf)
      .map_err(|e| (*e).offset_context(offset))?;
    self.state = HduState::Strides;
    self.stride_counter += 1;
    if self.stride_counter == self.total_strides {
      reader.source.pad_to_block()?;
      self.state = HduState::Done;
      reader.clear_current();
    }
    Ok(())
  }

  /// Skip the remaining strides and the trailing pad. A no-op on a `Done`
  /// HDU; `InvalidState` before the header has been read.
  pub fn read_to_finish<S: BlockSource>(
    &mut self,
    reader: &mut FitsReader<S>,
  ) -> Result<(), Error> {
    if self.state == HduState::Done {
      return Ok(());
    }
    reader.check_open("read_to_finish")?;
    if self.state == HduState::Start {
      return Err(new_invalid_state_err("read_to_finish", self.state.name()));
    }
    reader.check_current(self.seq, "read_to_finish")?;
    let remaining = (self.total_strides - self.stride_counter) * self.stride_len;
    reader.source.skip_forward(remaining)?;
    reader.source.pad_to_block()?;
    self.stride_counter = self.total_strides;
    self.state = HduState::Done;
    reader.clear_current();
    Ok(())
  }

  // Write side.

  /// Write the header: mandatory cards validated and sorted, `END` ensured,
  /// every card emitted, the last block space padded. The HDU becomes
  /// immutable and its stride geometry is locked in.
  pub fn write_header<W: Write>(&mut self, writer: &mut FitsWriter<W>) -> Result<(), Error> {
    writer.check_open("write_header")?;
    self.check_mutable("write_header")?;
    writer.check_no_pending()?;
    self.check_write_dispatch_cards(writer.next_seq)?;
    self.cards.ensure_end();
    self.cards.sort();
    self.cards.validate()?;
    self.apply_geometry()?;
    self.header_position = writer.sink.position();
    debug_assert_eq!(self.header_position % BLOCK_SIZE as u64, 0);
    for card in self.cards.expanded_cards() {
      writer.sink.write_all(&card.serialize_to_array())?;
    }
    writer.sink.pad_to_block(HEADER_PAD_BYTE)?;
    self.data_position = writer.sink.position();
    self.seq = Some(writer.next_seq);
    writer.next_seq += 1;
    if self.total_strides == 0 {
      self.state = HduState::Done;
    } else {
      self.state = HduState::Header;
      writer.pending = self.seq;
    }
    Ok(())
  }

  /// A primary HDU (and only the first HDU) carries `SIMPLE`; extensions
  /// carry `XTENSION` and no `SIMPLE`.
  fn check_write_dispatch_cards(&self, seq: usize) -> Result<(), Error> {
    if seq == 0 {
      if !self.cards.contains("SIMPLE") {
        return Err(new_missing_keyword_err("SIMPLE"));
      }
    } else {
      if self.cards.contains("SIMPLE") {
        return Err(new_unexpected_value("no SIMPLE card on an extension", "SIMPLE"));
      }
      if !self.cards.contains("XTENSION") {
        return Err(new_missing_keyword_err("XTENSION"));
      }
    }
    Ok(())
  }

  /// Write one stride of exactly `stride_length()` bytes. Writing the last
  /// stride also emits the trailing zero pad, leaving the stream block
  /// aligned.
  pub fn write_stride<W: Write>(
    &mut self,
    writer: &mut FitsWriter<W>,
    data: &[u8],
  ) -> Result<(), Error> {
    writer.check_open("write_stride")?;
    self.check_striding("write_stride")?;
    if self.seq != writer.pending {
      return Err(new_hdu_out_of_order_err("write_stride"));
    }
    if data.len() as u64 != self.stride_len {
      return Err(new_stride_len_err(self.stride_len, data.len()));
    }
    writer.sink.write_all(data)?;
    self.state = HduState::Strides;
    self.stride_counter += 1;
    if self.stride_counter == self.total_strides {
      writer.sink.pad_to_block(DATA_PAD_BYTE)?;
      self.state = HduState::Done;
      writer.pending = None;
    }
    Ok(())
  }

  fn check_striding(&self, operation: &'static str) -> Result<(), Error> {
    match self.state {
      HduState::Header | HduState::Strides => Ok(()),
      // Start: the header has not been processed. Done: one stride past
      // `total_strides`.
      state => Err(new_invalid_state_err(operation, state.name())),
    }
  }
}
