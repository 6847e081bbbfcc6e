//! Streaming reader/writer for the FITS binary container format.
//!
//! A FITS file is a sequence of Header/Data Units: an ASCII header of
//! 80-byte cards followed by an optional big-endian binary payload, both
//! padded to 2880-byte blocks. This crate exposes the file incrementally:
//! iterate HDUs with [`FitsReader::advance`], inspect header cards, and
//! stream the payload stride by stride (one image row or one table row at a
//! time) without ever materializing a full data section. Writing is the
//! mirror image through [`FitsWriter`].
//!
//! Sources do not need to seek: a socket or pipe goes through
//! [`FitsReader::from_reader`], which tracks positions and skips by
//! consuming.
//!
//! ```no_run
//! use fitstream::{FitsReader, Error};
//!
//! fn main() -> Result<(), Error> {
//!   let mut reader = FitsReader::open("image.fits")?;
//!   while let Some(mut hdu) = reader.advance()? {
//!     println!("{:?}: {} strides of {} bytes", hdu.kind(), hdu.total_strides(), hdu.stride_length());
//!     for _ in 0..hdu.total_strides() {
//!       let stride = hdu.read_stride(&mut reader)?;
//!       // process one row/plane...
//!       let _ = stride;
//!     }
//!   }
//!   Ok(())
//! }
//! ```

pub mod block;
pub mod card;
pub mod codec;
pub mod datatype;
pub mod error;
pub mod file;
pub mod hdu;

pub use crate::block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, DATA_PAD_BYTE, HEADER_PAD_BYTE};
pub use crate::card::{collection::CardCollection, Card, Value};
pub use crate::codec::{BitCodec, Complex32, Complex64, Endianness};
pub use crate::datatype::{BitPix, DataType, TForm};
pub use crate::error::{Error, ErrorKind, FitsError};
pub use crate::file::{FitsReader, FitsWriter};
pub use crate::hdu::{
  bintable::{Column, ColumnSpec, FieldValue},
  Hdu, HduKind, HduState,
};
