//! Block-aligned framing over raw byte streams.
//!
//! Every FITS section (header or data) occupies an integer number of 2880-byte
//! blocks. This module wraps the underlying stream with the logical-position
//! bookkeeping needed to keep that invariant on both ingest and emit, whether
//! or not the stream can seek.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{new_backward_seek_err, new_io_err, new_unexpected_eof, Error};

/// FITS block size, in bytes. Every section is padded to a multiple of it.
pub const BLOCK_SIZE: usize = 2880;

/// FITS card (keyword record) size, in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Fill byte of the trailing part of the last header block (ASCII space).
pub const HEADER_PAD_BYTE: u8 = b' ';

/// Fill byte of the trailing part of the last data block.
pub const DATA_PAD_BYTE: u8 = 0x00;

/// Returns the number of blocks needed to hold `n_bytes` bytes (0 for 0).
pub const fn blocks_needed(n_bytes: u64) -> u64 {
  n_bytes.div_ceil(BLOCK_SIZE as u64)
}

/// Returns the total byte length, in whole blocks, needed to hold `n_bytes`.
pub const fn padded_byte_len(n_bytes: u64) -> u64 {
  blocks_needed(n_bytes) * BLOCK_SIZE as u64
}

/// Returns the number of fill bytes between `position` and the next block
/// boundary, i.e. `0` when the position is already aligned.
pub(crate) const fn pad_len(position: u64) -> u64 {
  (BLOCK_SIZE as u64 - position % BLOCK_SIZE as u64) % BLOCK_SIZE as u64
}

/// Read side of the block stream: a byte source with a logical position and
/// forward-only skipping.
///
/// Two implementations exist: [`SeekSource`] for streams that can seek (a
/// skip is a true seek) and [`ForwardSource`] for streams that cannot (a skip
/// consumes and discards). Both yield byte-identical reads on the same input.
pub trait BlockSource {
  /// Fill `buf` entirely. The stream ending mid-buffer is an I/O error.
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error>;

  /// Fill `buf` entirely, unless the stream is already depleted **before the
  /// first byte**, in which case `Ok(false)` is returned and nothing is
  /// consumed. The stream ending mid-buffer is still an I/O error.
  ///
  /// This is what makes the end-of-stream at an HDU boundary a regular
  /// terminator rather than an error.
  fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, Error>;

  /// Advance the position by `n` bytes without handing the bytes out.
  fn skip_forward(&mut self, n: u64) -> Result<(), Error>;

  /// Logical byte offset from the origin of the stream.
  fn position(&self) -> u64;

  /// Advance to the next 2880-byte boundary (no-op when already aligned).
  fn pad_to_block(&mut self) -> Result<(), Error> {
    let n = pad_len(self.position());
    if n > 0 {
      self.skip_forward(n)?;
    }
    debug_assert_eq!(self.position() % BLOCK_SIZE as u64, 0);
    Ok(())
  }
}

/// Loop over `read`, retrying on interrupts. Returns the number of bytes
/// obtained, which is lower than `buf.len()` only at end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, Error> {
  let mut filled = 0;
  while filled < buf.len() {
    match reader.read(&mut buf[filled..]) {
      Ok(0) => break,
      Ok(n) => filled += n,
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => return Err(new_io_err(e)),
    }
  }
  Ok(filled)
}

/// Pass-through block source over a seekable stream.
pub struct SeekSource<R> {
  inner: R,
  position: u64,
}

impl<R: Read + Seek> SeekSource<R> {
  /// The current position of `inner` becomes the stream origin; it must be
  /// block aligned (byte 0 of a file, in practice).
  pub fn new(inner: R) -> Self {
    Self { inner, position: 0 }
  }

  pub fn into_inner(self) -> R {
    self.inner
  }
}

impl<R: Read + Seek> BlockSource for SeekSource<R> {
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
    self
      .inner
      .read_exact(buf)
      .map_err(new_io_err)
      .map(|()| self.position += buf.len() as u64)
  }

  fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, Error> {
    match read_full(&mut self.inner, buf)? {
      0 => Ok(false),
      n if n == buf.len() => {
        self.position += n as u64;
        Ok(true)
      }
      _ => Err(new_unexpected_eof("block")),
    }
  }

  fn skip_forward(&mut self, n: u64) -> Result<(), Error> {
    if n > 0 {
      self
        .inner
        .seek(SeekFrom::Current(n as i64))
        .map_err(new_io_err)?;
      self.position += n;
    }
    Ok(())
  }

  fn position(&self) -> u64 {
    self.position
  }
}

/// Block source over a stream that cannot seek (socket, pipe, ...).
///
/// The logical position is a counter incremented by every read; skipping
/// forward consumes and discards. Skipping backward is impossible and the
/// API offers no way to ask for it.
pub struct ForwardSource<R> {
  inner: R,
  position: u64,
}

impl<R: Read> ForwardSource<R> {
  pub fn new(inner: R) -> Self {
    Self { inner, position: 0 }
  }

  pub fn into_inner(self) -> R {
    self.inner
  }
}

impl<R: Read> BlockSource for ForwardSource<R> {
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
    self
      .inner
      .read_exact(buf)
      .map_err(new_io_err)
      .map(|()| self.position += buf.len() as u64)
  }

  fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, Error> {
    match read_full(&mut self.inner, buf)? {
      0 => Ok(false),
      n if n == buf.len() => {
        self.position += n as u64;
        Ok(true)
      }
      _ => Err(new_unexpected_eof("block")),
    }
  }

  fn skip_forward(&mut self, mut n: u64) -> Result<(), Error> {
    let mut scratch = [0_u8; BLOCK_SIZE];
    while n > 0 {
      let chunk = n.min(BLOCK_SIZE as u64) as usize;
      self
        .inner
        .read_exact(&mut scratch[..chunk])
        .map_err(new_io_err)?;
      self.position += chunk as u64;
      n -= chunk as u64;
    }
    Ok(())
  }

  fn position(&self) -> u64 {
    self.position
  }
}

/// Write side of the block stream.
///
/// Writing is strictly sequential in both the seekable and the unseekable
/// case, so a single implementation serves both: the position counter always
/// equals the true stream position. "Seeking forward" is emitting fill bytes,
/// which is exactly the padding operation.
pub struct BlockWriter<W> {
  inner: W,
  position: u64,
}

impl<W: Write> BlockWriter<W> {
  pub fn new(inner: W) -> Self {
    Self { inner, position: 0 }
  }

  pub fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
    self
      .inner
      .write_all(buf)
      .map_err(new_io_err)
      .map(|()| self.position += buf.len() as u64)
  }

  /// Logical byte offset from the origin of the stream.
  pub fn position(&self) -> u64 {
    self.position
  }

  /// Emit `fill` bytes up to the next 2880-byte boundary (no-op when already
  /// aligned). Headers pad with `HEADER_PAD_BYTE`, data with `DATA_PAD_BYTE`.
  pub fn pad_to_block(&mut self, fill: u8) -> Result<(), Error> {
    let mut n = pad_len(self.position);
    let scratch = [fill; CARD_SIZE];
    while n > 0 {
      let chunk = n.min(CARD_SIZE as u64) as usize;
      self.write_all(&scratch[..chunk])?;
      n -= chunk as u64;
    }
    debug_assert_eq!(self.position % BLOCK_SIZE as u64, 0);
    Ok(())
  }

  pub fn flush(&mut self) -> Result<(), Error> {
    self.inner.flush().map_err(new_io_err)
  }

  pub fn into_inner(self) -> W {
    self.inner
  }
}

/// Rejects a request to move the stream backward. Kept as a function so the
/// forward-only error is produced consistently by the callers that detect
/// the condition from positions.
pub(crate) fn check_forward(from: u64, to: u64) -> Result<u64, Error> {
  if to < from {
    Err(new_backward_seek_err(from, to))
  } else {
    Ok(to - from)
  }
}

/// Hides `Seek` so that tests exercise the forward-only code paths on plain
/// in-memory buffers.
#[cfg(test)]
pub(crate) struct ReadOnly<R>(pub R);

#[cfg(test)]
impl<R: Read> Read for ReadOnly<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;

  #[test]
  fn test_padding_math() {
    assert_eq!(blocks_needed(0), 0);
    assert_eq!(blocks_needed(1), 1);
    assert_eq!(blocks_needed(2880), 1);
    assert_eq!(blocks_needed(2881), 2);
    assert_eq!(padded_byte_len(0), 0);
    assert_eq!(padded_byte_len(12), 2880);
    assert_eq!(padded_byte_len(5760), 5760);
    assert_eq!(pad_len(0), 0);
    assert_eq!(pad_len(2880), 0);
    assert_eq!(pad_len(1), 2879);
    assert_eq!(pad_len(2879), 1);
  }

  #[test]
  fn test_seek_source_skip_and_position() {
    let data: Vec<u8> = (0..=255).cycle().take(6000).map(|v| v as u8).collect();
    let mut src = SeekSource::new(Cursor::new(data.clone()));
    let mut buf = [0_u8; 16];
    src.read_exact(&mut buf).unwrap();
    assert_eq!(src.position(), 16);
    assert_eq!(&buf[..], &data[..16]);
    src.skip_forward(100).unwrap();
    assert_eq!(src.position(), 116);
    src.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[..], &data[116..132]);
  }

  #[test]
  fn test_forward_source_matches_seek_source() {
    let data: Vec<u8> = (0..6000_u32).map(|v| (v % 251) as u8).collect();
    let mut seek = SeekSource::new(Cursor::new(data.clone()));
    let mut fwd = ForwardSource::new(ReadOnly(Cursor::new(data)));
    for (skip, read) in [(0_u64, 80_usize), (2800, 80), (3, 2877)] {
      seek.skip_forward(skip).unwrap();
      fwd.skip_forward(skip).unwrap();
      let mut b1 = vec![0_u8; read];
      let mut b2 = vec![0_u8; read];
      seek.read_exact(&mut b1).unwrap();
      fwd.read_exact(&mut b2).unwrap();
      assert_eq!(b1, b2);
      assert_eq!(seek.position(), fwd.position());
    }
  }

  #[test]
  fn test_pad_to_block_aligns_read_side() {
    let data = vec![0_u8; 2 * BLOCK_SIZE];
    let mut src = ForwardSource::new(ReadOnly(Cursor::new(data)));
    let mut buf = [0_u8; 100];
    src.read_exact(&mut buf).unwrap();
    src.pad_to_block().unwrap();
    assert_eq!(src.position(), BLOCK_SIZE as u64);
    // Aligned: a second call must not move.
    src.pad_to_block().unwrap();
    assert_eq!(src.position(), BLOCK_SIZE as u64);
  }

  #[test]
  fn test_read_exact_or_eof() {
    let mut src = ForwardSource::new(ReadOnly(Cursor::new(vec![7_u8; BLOCK_SIZE])));
    let mut block = [0_u8; BLOCK_SIZE];
    assert!(src.read_exact_or_eof(&mut block).unwrap());
    assert!(!src.read_exact_or_eof(&mut block).unwrap());
    // A truncated block is an I/O error, not a clean end.
    let mut src = ForwardSource::new(ReadOnly(Cursor::new(vec![7_u8; 100])));
    assert!(src.read_exact_or_eof(&mut block).is_err());
  }

  #[test]
  fn test_writer_pad_fill_bytes() {
    let mut writer = BlockWriter::new(Vec::new());
    writer.write_all(&[1, 2, 3]).unwrap();
    writer.pad_to_block(HEADER_PAD_BYTE).unwrap();
    assert_eq!(writer.position(), BLOCK_SIZE as u64);
    let bytes = writer.into_inner();
    assert_eq!(bytes.len(), BLOCK_SIZE);
    assert_eq!(&bytes[..3], &[1, 2, 3]);
    assert!(bytes[3..].iter().all(|&b| b == b' '));
  }

  #[test]
  fn test_writer_pad_on_boundary_is_noop() {
    let mut writer = BlockWriter::new(Vec::new());
    writer.write_all(&vec![0xFF_u8; BLOCK_SIZE]).unwrap();
    writer.pad_to_block(DATA_PAD_BYTE).unwrap();
    assert_eq!(writer.position(), BLOCK_SIZE as u64);
  }

  #[test]
  fn test_check_forward() {
    assert_eq!(check_forward(10, 30).unwrap(), 20);
    assert!(check_forward(30, 10).is_err());
  }
}
