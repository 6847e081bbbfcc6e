//! Reader and writer over a sequence of HDUs.
//!
//! The open mode is the type: [`FitsReader`] iterates HDUs with
//! [`FitsReader::advance`], [`FitsWriter`] receives them in order through
//! [`FitsWriter::append`] and per-HDU stride writes. Both exclusively own
//! their stream for their lifetime.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use crate::block::{
  check_forward, padded_byte_len, BlockSource, BlockWriter, ForwardSource, SeekSource, BLOCK_SIZE,
  DATA_PAD_BYTE,
};
use crate::codec::{BitCodec, Endianness};
use crate::error::{new_hdu_out_of_order_err, new_invalid_state_err, new_io_err, Error};
use crate::hdu::{dispatch_kind, read_header_cards, Hdu};

/// The HDU whose data section the stream currently sits in (or before).
pub(crate) struct CurrentHdu {
  pub(crate) seq: usize,
  /// End of the padded data section: where the next header starts.
  pub(crate) data_end: u64,
}

/// Sequential FITS reader: one [`advance`](Self::advance) call per HDU.
///
/// HDUs come out as detached descriptors; their stride reads borrow this
/// reader explicitly. Advancing finishes the current HDU by skipping whatever
/// the caller did not consume.
pub struct FitsReader<S> {
  pub(crate) source: S,
  codec: BitCodec,
  next_seq: usize,
  pub(crate) current: Option<CurrentHdu>,
  prototypes: VecDeque<Hdu>,
  /// Metadata snapshots of the HDUs produced so far, in order.
  hdus: Vec<Hdu>,
  closed: bool,
}

impl FitsReader<SeekSource<BufReader<File>>> {
  /// Open a file for reading, big-endian wire (the FITS default).
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    Self::open_with(path, Endianness::default())
  }

  pub fn open_with<P: AsRef<Path>>(path: P, endianness: Endianness) -> Result<Self, Error> {
    File::open(path)
      .map_err(new_io_err)
      .map(|file| Self::new(SeekSource::new(BufReader::new(file)), endianness))
  }
}

impl<R: Read + Seek> FitsReader<SeekSource<R>> {
  /// Wrap an externally supplied seekable stream, positioned on byte 0 of
  /// the FITS data. The stream is handed back by [`Self::into_inner`], never
  /// closed by the reader.
  pub fn from_seekable(reader: R) -> Self {
    Self::new(SeekSource::new(reader), Endianness::default())
  }
}

impl<R: Read> FitsReader<ForwardSource<R>> {
  /// Wrap an externally supplied forward-only stream (socket, pipe, ...).
  /// Skipping is emulated by consuming, positions stay exact.
  pub fn from_reader(reader: R) -> Self {
    Self::from_reader_with(reader, Endianness::default())
  }

  pub fn from_reader_with(reader: R, endianness: Endianness) -> Self {
    Self::new(ForwardSource::new(reader), endianness)
  }
}

impl<S: BlockSource> FitsReader<S> {
  pub fn new(source: S, endianness: Endianness) -> Self {
    Self {
      source,
      codec: BitCodec::new(endianness),
      next_seq: 0,
      current: None,
      prototypes: VecDeque::new(),
      hdus: Vec::new(),
      closed: false,
    }
  }

  /// The codec decoding this file's data sections, for per-field decoding.
  pub fn codec(&self) -> BitCodec {
    self.codec
  }

  /// Logical byte offset in the stream.
  pub fn position(&self) -> u64 {
    self.source.position()
  }

  /// Metadata snapshots of the HDUs produced so far, in file order.
  pub fn hdus(&self) -> &[Hdu] {
    &self.hdus
  }

  /// Queue a prototype: the next [`advance`](Self::advance) calls will fill
  /// the queued HDUs (in order) instead of dispatching on
  /// `SIMPLE`/`XTENSION`. This is how a caller forces its own type choice,
  /// e.g. a [`HduKind::Generic`](crate::hdu::HduKind::Generic) raw view.
  pub fn push_prototype(&mut self, hdu: Hdu) {
    self.prototypes.push_back(hdu);
  }

  /// Produce the next HDU, or `None` on a clean end of stream at an HDU
  /// boundary.
  ///
  /// If the previous HDU is not `Done`, its remaining strides and padding
  /// are skipped first (the caller's descriptor, if still around, turns
  /// stale and refuses further stride reads). The returned HDU has its
  /// header fully read; its data section is pending.
  pub fn advance(&mut self) -> Result<Option<Hdu>, Error> {
    self.check_open("advance")?;
    if let Some(current) = self.current.take() {
      let remaining = check_forward(self.source.position(), current.data_end)?;
      self.source.skip_forward(remaining)?;
    }
    let header_position = self.source.position();
    debug_assert_eq!(header_position % BLOCK_SIZE as u64, 0);
    let mut block = [0_u8; BLOCK_SIZE];
    if !self.source.read_exact_or_eof(&mut block)? {
      return Ok(None);
    }
    let cards = read_header_cards(&mut self.source, block, header_position)?;
    let data_position = self.source.position();
    let mut hdu = match self.prototypes.pop_front() {
      Some(prototype) => prototype,
      None => Hdu::new_prototype(
        dispatch_kind(&cards).map_err(|e| (*e).offset_context(header_position))?,
      ),
    };
    let seq = self.next_seq;
    hdu
      .attach_read(seq, header_position, data_position, cards)
      .map_err(|e| (*e).offset_context(header_position))?;
    self.next_seq += 1;
    self.current = Some(CurrentHdu {
      seq,
      data_end: data_position + padded_byte_len(hdu.data_byte_size()),
    });
    self.hdus.push(hdu.clone());
    Ok(Some(hdu))
  }

  /// Close the reader. Idempotent; the second call is a no-op. Further
  /// operations fail with `InvalidState`. An externally supplied stream is
  /// released through [`Self::into_inner`], never closed here.
  pub fn close(&mut self) -> Result<(), Error> {
    self.closed = true;
    Ok(())
  }

  /// Hand the underlying source back.
  pub fn into_inner(self) -> S {
    self.source
  }

  pub(crate) fn check_open(&self, operation: &'static str) -> Result<(), Error> {
    if self.closed {
      Err(new_invalid_state_err(operation, "Closed"))
    } else {
      Ok(())
    }
  }

  /// An HDU may touch the stream only while it is the reader's current one.
  pub(crate) fn check_current(
    &self,
    seq: Option<usize>,
    operation: &'static str,
  ) -> Result<(), Error> {
    match (seq, &self.current) {
      (Some(seq), Some(current)) if current.seq == seq => Ok(()),
      _ => Err(new_hdu_out_of_order_err(operation)),
    }
  }

  pub(crate) fn clear_current(&mut self) {
    self.current = None;
  }
}

/// Sequential FITS writer: append an HDU header, stream its strides, repeat.
pub struct FitsWriter<W: Write> {
  pub(crate) sink: BlockWriter<W>,
  codec: BitCodec,
  pub(crate) next_seq: usize,
  /// Sequence number of the HDU whose strides are being written, if any.
  pub(crate) pending: Option<usize>,
  closed: bool,
}

impl FitsWriter<BufWriter<File>> {
  /// Create (truncate) a file for writing, big-endian wire.
  pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    Self::create_with(path, Endianness::default())
  }

  pub fn create_with<P: AsRef<Path>>(path: P, endianness: Endianness) -> Result<Self, Error> {
    File::create(path)
      .map_err(new_io_err)
      .map(|file| Self::new(BufWriter::new(file), endianness))
  }
}

impl<W: Write> FitsWriter<W> {
  /// Wrap an externally supplied sink. The sink is handed back by
  /// [`Self::into_inner`], never closed by the writer.
  pub fn from_writer(writer: W) -> Self {
    Self::new(writer, Endianness::default())
  }

  pub fn from_writer_with(writer: W, endianness: Endianness) -> Self {
    Self::new(writer, endianness)
  }

  pub fn new(writer: W, endianness: Endianness) -> Self {
    Self {
      sink: BlockWriter::new(writer),
      codec: BitCodec::new(endianness),
      next_seq: 0,
      pending: None,
      closed: false,
    }
  }

  /// The codec for encoding stride data, symmetric with the read side.
  pub fn codec(&self) -> BitCodec {
    self.codec
  }

  /// Logical byte offset in the stream.
  pub fn position(&self) -> u64 {
    self.sink.position()
  }

  /// Write the header of the next HDU (same as
  /// [`Hdu::write_header`]). The previous HDU must have received all its
  /// strides.
  pub fn append(&mut self, hdu: &mut Hdu) -> Result<(), Error> {
    hdu.write_header(self)
  }

  /// Pad the current data block with zeros, flush, and mark the writer
  /// closed. Idempotent; the second call is a no-op. An externally supplied
  /// sink is released through [`Self::into_inner`], never closed here.
  pub fn close(&mut self) -> Result<(), Error> {
    if !self.closed {
      self.sink.pad_to_block(DATA_PAD_BYTE)?;
      self.sink.flush()?;
      self.pending = None;
      self.closed = true;
    }
    Ok(())
  }

  /// Close (pad and flush) and hand the underlying sink back.
  pub fn into_inner(mut self) -> Result<W, Error> {
    self.close()?;
    Ok(self.sink.into_inner())
  }

  pub(crate) fn check_open(&self, operation: &'static str) -> Result<(), Error> {
    if self.closed {
      Err(new_invalid_state_err(operation, "Closed"))
    } else {
      Ok(())
    }
  }

  pub(crate) fn check_no_pending(&self) -> Result<(), Error> {
    if self.pending.is_some() {
      Err(new_hdu_out_of_order_err("write_header"))
    } else {
      Ok(())
    }
  }
}
