//! Whole-file round trips through in-memory buffers: write, inspect the raw
//! bytes, read back, both over seekable and forward-only streams.

use std::io::{self, Cursor, Read};

use fitstream::{
  BitPix, Card, CardCollection, ColumnSpec, DataType, ErrorKind, FieldValue, FitsReader,
  FitsWriter, Hdu, HduKind, HduState, TForm, BLOCK_SIZE,
};

/// Hides `Seek`, so the reader has to go through its forward-only path.
struct ReadOnly<R>(R);

impl<R: Read> Read for ReadOnly<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }
}

fn write_minimal_image() -> Vec<u8> {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::new_primary(BitPix::I16, &[3, 2]);
  writer.append(&mut hdu).unwrap();
  hdu
    .write_stride(&mut writer, &[1, 2, 3, 4, 5, 6])
    .unwrap();
  hdu
    .write_stride(&mut writer, &[7, 8, 9, 10, 11, 12])
    .unwrap();
  assert_eq!(hdu.state(), HduState::Done);
  writer.into_inner().unwrap()
}

#[test]
fn test_empty_primary_is_one_space_padded_block() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::new_primary(BitPix::U8, &[]);
  writer.append(&mut hdu).unwrap();
  assert_eq!(hdu.state(), HduState::Done);
  writer.close().unwrap();
  let bytes = writer.into_inner().unwrap();
  assert_eq!(bytes.len(), BLOCK_SIZE);
  // First card is SIMPLE = T with its comment, fixed format.
  assert_eq!(
    &bytes[..30],
    b"SIMPLE  =                    T".as_slice()
  );
  assert_eq!(&bytes[30..33], b" / ");
  // The last byte of the header block is a space, not a zero.
  assert_eq!(bytes[BLOCK_SIZE - 1], b' ');
  // An END card is present.
  let cards: Vec<&[u8]> = bytes.chunks(80).collect();
  assert!(cards.iter().any(|card| card.starts_with(b"END     ")));
}

#[test]
fn test_minimal_image_layout() {
  let bytes = write_minimal_image();
  assert_eq!(bytes.len(), 2 * BLOCK_SIZE);
  // Data block: 12 payload bytes then 2868 zeros.
  let data = &bytes[BLOCK_SIZE..];
  assert_eq!(&data[..12], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
  assert!(data[12..].iter().all(|&b| b == 0));
}

#[test]
fn test_minimal_image_round_trip() {
  let bytes = write_minimal_image();
  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let mut hdu = reader.advance().unwrap().unwrap();
  assert_eq!(hdu.kind(), HduKind::PrimaryImage);
  assert_eq!(hdu.bitpix().unwrap(), BitPix::I16);
  assert_eq!(hdu.naxis().unwrap(), 2);
  assert_eq!(hdu.stride_length(), 6);
  assert_eq!(hdu.total_strides(), 2);
  assert_eq!(hdu.header_position(), 0);
  assert_eq!(hdu.data_position(), BLOCK_SIZE as u64);
  assert_eq!(hdu.read_stride(&mut reader).unwrap(), [1, 2, 3, 4, 5, 6]);
  assert_eq!(
    hdu.read_stride(&mut reader).unwrap(),
    [7, 8, 9, 10, 11, 12]
  );
  assert_eq!(hdu.state(), HduState::Done);
  // Stream left block aligned after the trailing pad.
  assert_eq!(reader.position() % BLOCK_SIZE as u64, 0);
  assert!(reader.advance().unwrap().is_none());
}

#[test]
fn test_unseekable_source_reads_identical() {
  let bytes = write_minimal_image();
  let mut seekable = FitsReader::from_seekable(Cursor::new(bytes.clone()));
  let mut forward = FitsReader::from_reader(ReadOnly(Cursor::new(bytes)));
  let mut hdu_s = seekable.advance().unwrap().unwrap();
  let mut hdu_f = forward.advance().unwrap().unwrap();
  for _ in 0..2 {
    assert_eq!(
      hdu_s.read_stride(&mut seekable).unwrap(),
      hdu_f.read_stride(&mut forward).unwrap()
    );
  }
  assert!(seekable.advance().unwrap().is_none());
  assert!(forward.advance().unwrap().is_none());
}

#[test]
fn test_unseekable_source_skips_unread_data() {
  // Two HDUs; the first one's data is never read, so advancing must skip it
  // by consuming on the forward-only path.
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::U8, &[BLOCK_SIZE as u64 + 1]);
  writer.append(&mut primary).unwrap();
  primary
    .write_stride(&mut writer, &vec![0xAB_u8; BLOCK_SIZE + 1])
    .unwrap();
  let mut image = Hdu::new_image_extension(BitPix::U8, &[4]);
  image.set_card(Card::string("EXTNAME", "SECOND")).unwrap();
  writer.append(&mut image).unwrap();
  image.write_stride(&mut writer, &[9, 9, 9, 9]).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_reader(ReadOnly(Cursor::new(bytes)));
  let first = reader.advance().unwrap().unwrap();
  assert_eq!(first.kind(), HduKind::PrimaryImage);
  let mut second = reader.advance().unwrap().unwrap();
  assert_eq!(second.kind(), HduKind::ImageExtension);
  assert_eq!(second.extname().unwrap().as_deref(), Some("SECOND"));
  assert_eq!(second.read_stride(&mut reader).unwrap(), [9, 9, 9, 9]);
  assert!(reader.advance().unwrap().is_none());
}

fn binary_table_cards() -> CardCollection {
  let mut cards = CardCollection::new();
  cards.push(Card::string("XTENSION", "BINTABLE"));
  cards.push(Card::integer("BITPIX", 8));
  cards.push(Card::integer("NAXIS", 2));
  cards.push(Card::integer("NAXIS1", 12));
  cards.push(Card::integer("NAXIS2", 3));
  cards.push(Card::integer("PCOUNT", 0));
  cards.push(Card::integer("GCOUNT", 1));
  cards.push(Card::integer("TFIELDS", 2));
  cards.push(Card::string("TFORM1", "1J"));
  cards.push(Card::string("TFORM2", "1D"));
  cards
}

#[test]
fn test_binary_table_stride_geometry_and_decode() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::U8, &[]);
  writer.append(&mut primary).unwrap();
  let mut table = Hdu::from_cards(HduKind::BinaryTable, binary_table_cards());
  writer.append(&mut table).unwrap();
  assert_eq!(table.stride_length(), 12);
  assert_eq!(table.total_strides(), 3);
  let codec = writer.codec();
  for i in 0..3_i32 {
    let mut row = Vec::new();
    row.extend_from_slice(&codec.encode_i32(i));
    row.extend_from_slice(&codec.encode_f64(f64::from(i) * 0.5));
    table.write_stride(&mut writer, &row).unwrap();
  }
  let bytes = writer.into_inner().unwrap();
  assert_eq!(bytes.len() % BLOCK_SIZE, 0);

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  reader.advance().unwrap().unwrap();
  let mut table = reader.advance().unwrap().unwrap();
  assert_eq!(table.kind(), HduKind::BinaryTable);
  assert_eq!(table.stride_length(), 12);
  assert_eq!(table.total_strides(), 3);
  assert_eq!(table.columns().len(), 2);
  for i in 0..3_i32 {
    let row = table.read_stride(&mut reader).unwrap();
    let fields = table.decode_row(&row, reader.codec()).unwrap();
    assert_eq!(
      fields,
      [
        FieldValue::Int(i),
        FieldValue::Double(f64::from(i) * 0.5)
      ]
    );
  }
  assert!(reader.advance().unwrap().is_none());
}

#[test]
fn test_long_string_continuation() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::new_primary(BitPix::U8, &[]);
  hdu
    .set_card(Card::string("LONGSTRN", "OGIP 1.0"))
    .unwrap();
  hdu.set_card(Card::string("SVALUE", "foo&")).unwrap();
  hdu.set_card(Card::string("CONTINUE", "bar")).unwrap();
  writer.append(&mut hdu).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let hdu = reader.advance().unwrap().unwrap();
  assert_eq!(
    hdu.cards().string("SVALUE").unwrap().as_deref(),
    Some("foobar")
  );
}

#[test]
fn test_long_string_split_on_write() {
  let long: String = ('a'..='z').cycle().take(200).collect();
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::new_primary(BitPix::U8, &[]);
  hdu.set_card(Card::string("SVALUE", long.clone())).unwrap();
  writer.append(&mut hdu).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let hdu = reader.advance().unwrap().unwrap();
  // The writer added the LONGSTRN marker and split over CONTINUE cards.
  assert!(hdu.cards().contains("LONGSTRN"));
  assert_eq!(hdu.cards().string("SVALUE").unwrap().unwrap(), long);
}

#[test]
fn test_lifecycle_violations() {
  let bytes = write_minimal_image();
  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let mut hdu = reader.advance().unwrap().unwrap();
  // Cards are frozen once the header has been read.
  assert_eq!(
    hdu
      .set_card(Card::integer("LATE", 1))
      .unwrap_err()
      .kind(),
    ErrorKind::InvalidState
  );
  hdu.read_stride(&mut reader).unwrap();
  hdu.read_stride(&mut reader).unwrap();
  // One stride past total_strides.
  assert_eq!(
    hdu.read_stride(&mut reader).unwrap_err().kind(),
    ErrorKind::InvalidState
  );
}

#[test]
fn test_stride_on_unread_header_is_invalid_state() {
  let mut reader = FitsReader::from_seekable(Cursor::new(Vec::new()));
  let mut hdu = Hdu::new_prototype(HduKind::Generic);
  assert_eq!(
    hdu.read_stride(&mut reader).unwrap_err().kind(),
    ErrorKind::InvalidState
  );
}

#[test]
fn test_stale_hdu_rejected_after_advance() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::I16, &[2, 2]);
  writer.append(&mut primary).unwrap();
  primary.write_stride(&mut writer, &[0; 4]).unwrap();
  primary.write_stride(&mut writer, &[0; 4]).unwrap();
  let mut image = Hdu::new_image_extension(BitPix::U8, &[2]);
  writer.append(&mut image).unwrap();
  image.write_stride(&mut writer, &[1, 2]).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let mut stale = reader.advance().unwrap().unwrap();
  stale.read_stride(&mut reader).unwrap();
  // Advancing finishes the first HDU; its descriptor turns stale.
  let _second = reader.advance().unwrap().unwrap();
  assert_eq!(
    stale.read_stride(&mut reader).unwrap_err().kind(),
    ErrorKind::InvalidState
  );
}

#[test]
fn test_read_to_finish_then_idempotent() {
  let bytes = write_minimal_image();
  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let mut hdu = reader.advance().unwrap().unwrap();
  hdu.read_stride(&mut reader).unwrap();
  hdu.read_to_finish(&mut reader).unwrap();
  assert_eq!(hdu.state(), HduState::Done);
  assert_eq!(hdu.stride_counter(), hdu.total_strides());
  // No-op the second time.
  hdu.read_to_finish(&mut reader).unwrap();
  assert!(reader.advance().unwrap().is_none());
}

#[test]
fn test_close_is_idempotent() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::new_primary(BitPix::U8, &[]);
  writer.append(&mut hdu).unwrap();
  writer.close().unwrap();
  writer.close().unwrap();
  assert_eq!(
    writer.append(&mut Hdu::new_primary(BitPix::U8, &[])).unwrap_err().kind(),
    ErrorKind::InvalidState
  );

  let mut reader = FitsReader::from_seekable(Cursor::new(Vec::new()));
  reader.close().unwrap();
  reader.close().unwrap();
  assert_eq!(reader.advance().unwrap_err().kind(), ErrorKind::InvalidState);
}

#[test]
fn test_writer_close_pads_partial_data() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::new_primary(BitPix::U8, &[8, 4]);
  writer.append(&mut hdu).unwrap();
  // Only one of the four declared strides is written before closing.
  hdu.write_stride(&mut writer, &[1; 8]).unwrap();
  writer.close().unwrap();
  let bytes = writer.into_inner().unwrap();
  assert_eq!(bytes.len(), 2 * BLOCK_SIZE);
  assert!(bytes[BLOCK_SIZE + 8..].iter().all(|&b| b == 0));
}

#[test]
fn test_writer_rejects_out_of_order_and_wrong_stride() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::U8, &[4]);
  writer.append(&mut primary).unwrap();
  // The primary still expects a stride: no new header yet.
  let mut next = Hdu::new_image_extension(BitPix::U8, &[1]);
  assert_eq!(
    writer.append(&mut next).unwrap_err().kind(),
    ErrorKind::InvalidState
  );
  // Wrong stride length.
  assert_eq!(
    primary.write_stride(&mut writer, &[0; 3]).unwrap_err().kind(),
    ErrorKind::InvalidState
  );
  primary.write_stride(&mut writer, &[0; 4]).unwrap();
  writer.close().unwrap();
}

#[test]
fn test_primary_without_extend_rejected_on_write() {
  let mut cards = CardCollection::new();
  cards.push(Card::logical("SIMPLE", true));
  cards.push(Card::integer("BITPIX", 8));
  cards.push(Card::integer("NAXIS", 0));
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::from_cards(HduKind::PrimaryImage, cards);
  assert_eq!(
    writer.append(&mut hdu).unwrap_err().kind(),
    ErrorKind::InvalidHeader
  );
}

#[test]
fn test_primary_without_extend_rejected_on_read() {
  // A Generic HDU is not held to the primary keyword set, so it can emit a
  // primary-looking header lacking EXTEND; reading it back as a primary
  // must flag the missing mandatory keyword.
  let mut cards = CardCollection::new();
  cards.push(Card::logical("SIMPLE", true));
  cards.push(Card::integer("BITPIX", 8));
  cards.push(Card::integer("NAXIS", 0));
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut hdu = Hdu::from_cards(HduKind::Generic, cards);
  writer.append(&mut hdu).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  assert_eq!(reader.advance().unwrap_err().kind(), ErrorKind::InvalidHeader);
}

#[test]
fn test_writer_rejects_extension_first() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut image = Hdu::new_image_extension(BitPix::U8, &[1]);
  assert_eq!(
    writer.append(&mut image).unwrap_err().kind(),
    ErrorKind::InvalidHeader
  );
}

#[test]
fn test_generic_prototype_forces_raw_view() {
  // A binary table read through a Generic prototype: plain axis-product
  // strides, no column parsing, no XTENSION requirement.
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::U8, &[]);
  writer.append(&mut primary).unwrap();
  let mut table = Hdu::from_cards(HduKind::BinaryTable, binary_table_cards());
  writer.append(&mut table).unwrap();
  for _ in 0..3 {
    table.write_stride(&mut writer, &[7; 12]).unwrap();
  }
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  reader.push_prototype(Hdu::new_prototype(HduKind::Generic));
  reader.push_prototype(Hdu::new_prototype(HduKind::Generic));
  let first = reader.advance().unwrap().unwrap();
  assert_eq!(first.kind(), HduKind::Generic);
  let mut second = reader.advance().unwrap().unwrap();
  assert_eq!(second.kind(), HduKind::Generic);
  assert_eq!(second.stride_length(), 12);
  assert_eq!(second.total_strides(), 3);
  assert!(second.columns().is_empty());
  assert_eq!(second.read_stride(&mut reader).unwrap(), [7; 12]);
}

#[test]
fn test_unsupported_extension_type() {
  // An ASCII TABLE extension is outside the supported subset.
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::U8, &[]);
  writer.append(&mut primary).unwrap();
  let mut cards = CardCollection::new();
  cards.push(Card::string("XTENSION", "TABLE"));
  cards.push(Card::integer("BITPIX", 8));
  cards.push(Card::integer("NAXIS", 2));
  cards.push(Card::integer("NAXIS1", 10));
  cards.push(Card::integer("NAXIS2", 1));
  cards.push(Card::integer("PCOUNT", 0));
  cards.push(Card::integer("GCOUNT", 1));
  let mut table = Hdu::from_cards(HduKind::Generic, cards);
  writer.append(&mut table).unwrap();
  table.write_stride(&mut writer, &[b'x'; 10]).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  reader.advance().unwrap().unwrap();
  assert_eq!(reader.advance().unwrap_err().kind(), ErrorKind::Unsupported);
  // A Generic prototype makes the same HDU readable.
  let mut reader = FitsReader::from_seekable(Cursor::new({
    let mut writer = FitsWriter::from_writer(Vec::new());
    let mut primary = Hdu::new_primary(BitPix::U8, &[]);
    writer.append(&mut primary).unwrap();
    let mut cards = CardCollection::new();
    cards.push(Card::string("XTENSION", "TABLE"));
    cards.push(Card::integer("BITPIX", 8));
    cards.push(Card::integer("NAXIS", 2));
    cards.push(Card::integer("NAXIS1", 10));
    cards.push(Card::integer("NAXIS2", 1));
    cards.push(Card::integer("PCOUNT", 0));
    cards.push(Card::integer("GCOUNT", 1));
    let mut table = Hdu::from_cards(HduKind::Generic, cards);
    writer.append(&mut table).unwrap();
    table.write_stride(&mut writer, &[b'x'; 10]).unwrap();
    writer.into_inner().unwrap()
  }));
  reader.advance().unwrap().unwrap();
  reader.push_prototype(Hdu::new_prototype(HduKind::Generic));
  let mut ascii = reader.advance().unwrap().unwrap();
  assert_eq!(ascii.read_stride(&mut reader).unwrap(), [b'x'; 10]);
}

#[test]
fn test_truncated_stream_is_io_error() {
  let mut bytes = write_minimal_image();
  // Cut inside the data section.
  bytes.truncate(BLOCK_SIZE + 5);
  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  let mut hdu = reader.advance().unwrap().unwrap();
  let mut err = None;
  for _ in 0..2 {
    match hdu.read_stride(&mut reader) {
      Ok(_) => {}
      Err(e) => {
        err = Some(e);
        break;
      }
    }
  }
  assert_eq!(err.expect("truncation must surface").kind(), ErrorKind::Io);

  // Cut inside the header.
  let mut bytes = write_minimal_image();
  bytes.truncate(100);
  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  assert_eq!(reader.advance().unwrap_err().kind(), ErrorKind::Io);
}

#[test]
fn test_hdu_snapshot_list() {
  let bytes = write_minimal_image();
  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  reader.advance().unwrap().unwrap();
  assert_eq!(reader.hdus().len(), 1);
  assert_eq!(reader.hdus()[0].kind(), HduKind::PrimaryImage);
  assert_eq!(reader.hdus()[0].stride_length(), 6);
}

#[test]
fn test_scaled_and_null_columns_through_file() {
  let mut writer = FitsWriter::from_writer(Vec::new());
  let mut primary = Hdu::new_primary(BitPix::U8, &[]);
  writer.append(&mut primary).unwrap();
  let specs = [
    ColumnSpec::new(TForm::scalar(DataType::Short))
      .with_name("COUNTS")
      .with_null(-32768),
    ColumnSpec::new(TForm::scalar(DataType::Short))
      .with_name("TEMP")
      .with_scaling(0.01, 273.15),
  ];
  let mut table = Hdu::new_binary_table(2, &specs);
  writer.append(&mut table).unwrap();
  let codec = writer.codec();
  let mut row = Vec::new();
  row.extend_from_slice(&codec.encode_i16(-32768));
  row.extend_from_slice(&codec.encode_i16(100));
  table.write_stride(&mut writer, &row).unwrap();
  let mut row = Vec::new();
  row.extend_from_slice(&codec.encode_i16(7));
  row.extend_from_slice(&codec.encode_i16(-100));
  table.write_stride(&mut writer, &row).unwrap();
  let bytes = writer.into_inner().unwrap();

  let mut reader = FitsReader::from_seekable(Cursor::new(bytes));
  reader.advance().unwrap().unwrap();
  let mut table = reader.advance().unwrap().unwrap();
  assert_eq!(table.columns()[0].name(), Some("COUNTS"));
  let row = table.read_stride(&mut reader).unwrap();
  let fields = table.decode_row(&row, reader.codec()).unwrap();
  assert_eq!(fields[0], FieldValue::Null);
  assert_eq!(fields[1], FieldValue::Scaled(0.01 * 100.0 + 273.15));
  let row = table.read_stride(&mut reader).unwrap();
  let fields = table.decode_row(&row, reader.codec()).unwrap();
  assert_eq!(fields[0], FieldValue::Short(7));
  assert_eq!(fields[1], FieldValue::Scaled(0.01 * -100.0 + 273.15));
}
