//! Binary table (`BINTABLE`) columns: `TFORMn` descriptors, the per-column
//! auxiliary keywords, and field decoding from raw row bytes.

use log::warn;

use crate::card::{collection::CardCollection, Card};
use crate::codec::{BitCodec, Complex32, Complex64};
use crate::datatype::{DataType, TForm};
use crate::error::{
  new_missing_keyword_err, new_stride_len_err, new_unexpected_value, new_unsupported_err, Error,
};
use crate::hdu::image::{required_integer, Geometry};

/// Highest `TFIELDS` value the FITS standard allows.
const MAX_TFIELDS: i64 = 999;

/// One column of a binary table, built from `TFORMn` and its auxiliary
/// keywords. Columns are numbered from 1, per FITS.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
  index: u16,
  tform: TForm,
  /// Byte offset of the column within a row.
  byte_offset: u64,
  /// `TTYPEn`: column name.
  name: Option<String>,
  /// `TNULLn`: integer sentinel decoded as [`FieldValue::Null`].
  null: Option<i64>,
  /// `TSCALn`: effective = wire * scale + zero, when either is present.
  scale: Option<f64>,
  /// `TZEROn`.
  zero: Option<f64>,
  /// `TDIMn`, preserved as an opaque string.
  dim: Option<String>,
  /// `TUNITn`, preserved as an opaque string.
  unit: Option<String>,
}

impl Column {
  /// 1-based column number.
  pub fn index(&self) -> u16 {
    self.index
  }

  pub fn tform(&self) -> TForm {
    self.tform
  }

  pub fn byte_offset(&self) -> u64 {
    self.byte_offset
  }

  /// Wire bytes of this column in one row.
  pub fn byte_size(&self) -> u64 {
    self.tform.total_byte_size()
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn null(&self) -> Option<i64> {
    self.null
  }

  pub fn dim(&self) -> Option<&str> {
    self.dim.as_deref()
  }

  pub fn unit(&self) -> Option<&str> {
    self.unit.as_deref()
  }

  fn has_scaling(&self) -> bool {
    self.scale.is_some() || self.zero.is_some()
  }

  fn apply_scaling(&self, wire: f64) -> f64 {
    wire * self.scale.unwrap_or(1.0) + self.zero.unwrap_or(0.0)
  }

  /// Decode this column's field from the raw bytes of one row (one stride).
  ///
  /// Integer wire values matching `TNULLn` decode as [`FieldValue::Null`];
  /// when `TSCALn`/`TZEROn` is present the effective value is returned as
  /// [`FieldValue::Scaled`]. A repeat count above 1 yields an array (a
  /// string for `A`, the packed bytes for `X`).
  pub fn decode_field(&self, row: &[u8], codec: BitCodec) -> Result<FieldValue, Error> {
    let from = self.byte_offset as usize;
    let to = from + self.byte_size() as usize;
    if row.len() < to {
      return Err(new_stride_len_err(to as u64, row.len()));
    }
    let bytes = &row[from..to];
    let repeat = self.tform.repeat() as usize;
    match self.tform.data_type() {
      DataType::AsciiChar => {
        let s = String::from_utf8_lossy(bytes);
        Ok(FieldValue::Ascii(s.trim_end_matches([' ', '\0']).to_owned()))
      }
      DataType::Bit => Ok(FieldValue::Bits(bytes.to_vec())),
      dt => {
        let elem_size = dt.elem_byte_size() as usize;
        let mut elems = bytes
          .chunks_exact(elem_size)
          .map(|chunk| self.decode_element(dt, chunk, codec));
        match repeat {
          0 => Ok(FieldValue::Array(Vec::new())),
          1 => Ok(elems.next().expect("sized above")),
          _ => Ok(FieldValue::Array(elems.collect())),
        }
      }
    }
  }

  fn decode_element(&self, dt: DataType, bytes: &[u8], codec: BitCodec) -> FieldValue {
    // Integer types go through the null sentinel then the scaling transform;
    // floats only through the scaling; the remaining types through neither.
    match dt {
      DataType::Logical => match bytes[0] {
        b'T' => FieldValue::Logical(true),
        b'F' => FieldValue::Logical(false),
        _ => FieldValue::Null,
      },
      DataType::UnsignedByte => self.integer_element(bytes[0] as i64, FieldValue::UnsignedByte(bytes[0])),
      DataType::Short => {
        let v = codec.decode_i16(bytes.try_into().unwrap());
        self.integer_element(v as i64, FieldValue::Short(v))
      }
      DataType::Int => {
        let v = codec.decode_i32(bytes.try_into().unwrap());
        self.integer_element(v as i64, FieldValue::Int(v))
      }
      DataType::Long => {
        let v = codec.decode_i64(bytes.try_into().unwrap());
        self.integer_element(v, FieldValue::Long(v))
      }
      DataType::Float => {
        let v = codec.decode_f32(bytes.try_into().unwrap());
        if self.has_scaling() {
          FieldValue::Scaled(self.apply_scaling(v as f64))
        } else {
          FieldValue::Float(v)
        }
      }
      DataType::Double => {
        let v = codec.decode_f64(bytes.try_into().unwrap());
        if self.has_scaling() {
          FieldValue::Scaled(self.apply_scaling(v))
        } else {
          FieldValue::Double(v)
        }
      }
      DataType::ComplexFloat => {
        FieldValue::ComplexFloat(codec.decode_complex32(bytes.try_into().unwrap()))
      }
      DataType::ComplexDouble => {
        FieldValue::ComplexDouble(codec.decode_complex64(bytes.try_into().unwrap()))
      }
      // Dispatched at the whole-field level, before per-element decoding.
      DataType::Bit | DataType::AsciiChar => unreachable!(),
    }
  }

  fn integer_element(&self, wire: i64, raw: FieldValue) -> FieldValue {
    if self.null == Some(wire) {
      FieldValue::Null
    } else if self.has_scaling() {
      FieldValue::Scaled(self.apply_scaling(wire as f64))
    } else {
      raw
    }
  }
}

/// A decoded binary table field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  /// The `TNULLn` sentinel, or an undefined logical.
  Null,
  Logical(bool),
  /// Packed bits of an `X` column, 8 per byte, as stored.
  Bits(Vec<u8>),
  UnsignedByte(u8),
  Short(i16),
  Int(i32),
  Long(i64),
  /// `A` column content, trailing blanks and NULs stripped.
  Ascii(String),
  Float(f32),
  Double(f64),
  ComplexFloat(Complex32),
  ComplexDouble(Complex64),
  /// Effective value after the `TSCALn`/`TZEROn` transform.
  Scaled(f64),
  /// Repeat counts other than 1 (`A` and `X` excepted).
  Array(Vec<FieldValue>),
}

/// Description of one column of a table to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
  tform: TForm,
  name: Option<String>,
  unit: Option<String>,
  null: Option<i64>,
  scale: Option<f64>,
  zero: Option<f64>,
}

impl ColumnSpec {
  pub fn new(tform: TForm) -> Self {
    Self {
      tform,
      name: None,
      unit: None,
      null: None,
      scale: None,
      zero: None,
    }
  }

  pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
    self.unit = Some(unit.into());
    self
  }

  pub fn with_null(mut self, null: i64) -> Self {
    self.null = Some(null);
    self
  }

  pub fn with_scaling(mut self, scale: f64, zero: f64) -> Self {
    self.scale = Some(scale);
    self.zero = Some(zero);
    self
  }
}

/// Parse the `TFIELDS` columns of a binary table header. The row offset of
/// each column is the cumulated width of the preceding ones.
pub(crate) fn parse_columns(cards: &CardCollection) -> Result<Vec<Column>, Error> {
  let tfields = required_integer(cards, "TFIELDS")?;
  if !(0..=MAX_TFIELDS).contains(&tfields) {
    return Err(new_unexpected_value("TFIELDS in [0, 999]", tfields));
  }
  let mut columns = Vec::with_capacity(tfields as usize);
  let mut byte_offset = 0_u64;
  for n in 1..=tfields {
    let keyword = format!("TFORM{}", n);
    let tform = cards
      .string(&keyword)?
      .ok_or_else(|| new_missing_keyword_err(&keyword))?
      .trim()
      .parse::<TForm>()?;
    let column = Column {
      index: n as u16,
      tform,
      byte_offset,
      name: cards.string(&format!("TTYPE{}", n))?,
      null: cards.integer(&format!("TNULL{}", n))?,
      scale: cards.real(&format!("TSCAL{}", n))?,
      zero: cards.real(&format!("TZERO{}", n))?,
      dim: cards.string(&format!("TDIM{}", n))?,
      unit: cards.string(&format!("TUNIT{}", n))?,
    };
    byte_offset += column.byte_size();
    columns.push(column);
  }
  Ok(columns)
}

/// Computes the row layout of a binary table: the stride is one row of
/// `NAXIS1` bytes, the stride count is the `NAXIS2` row count.
pub(crate) fn geometry(cards: &CardCollection) -> Result<(Geometry, Vec<Column>), Error> {
  let bitpix = required_integer(cards, "BITPIX")?;
  if bitpix != 8 {
    return Err(new_unexpected_value("BITPIX = 8 on a binary table", bitpix));
  }
  let naxis = required_integer(cards, "NAXIS")?;
  if naxis != 2 {
    return Err(new_unexpected_value("NAXIS = 2 on a binary table", naxis));
  }
  let naxis1 = required_integer(cards, "NAXIS1")?;
  let naxis2 = required_integer(cards, "NAXIS2")?;
  if naxis1 < 0 || naxis2 < 0 {
    return Err(new_unexpected_value("NAXIS1 >= 0 and NAXIS2 >= 0", format!("{}x{}", naxis1, naxis2)));
  }
  let pcount = required_integer(cards, "PCOUNT")?;
  if pcount != 0 {
    return Err(new_unsupported_err("heap data (PCOUNT > 0)"));
  }
  let gcount = required_integer(cards, "GCOUNT")?;
  if gcount != 1 {
    warn!("GCOUNT = {} found, 1 expected. Value ignored.", gcount);
  }
  let columns = parse_columns(cards)?;
  let row_byte_size: u64 = columns.iter().map(Column::byte_size).sum();
  if row_byte_size != naxis1 as u64 {
    // NAXIS1 governs the stride, per the standard.
    warn!(
      "Sum of column widths ({}) differs from NAXIS1 ({}).",
      row_byte_size, naxis1
    );
  }
  Ok((
    Geometry {
      stride_len: naxis1 as u64,
      total_strides: naxis2 as u64,
      data_byte_size: (naxis1 * naxis2) as u64,
    },
    columns,
  ))
}

/// The cards of a binary table header: the mandatory prefix then the
/// per-column keywords, `TFORMn` first.
pub(crate) fn table_cards(n_rows: u64, specs: &[ColumnSpec]) -> CardCollection {
  assert!(specs.len() <= MAX_TFIELDS as usize);
  let row_byte_size: u64 = specs.iter().map(|s| s.tform.total_byte_size()).sum();
  let mut cards = CardCollection::new();
  cards.push(Card::string("XTENSION", "BINTABLE").with_comment("Binary table extension"));
  cards.push(Card::integer("BITPIX", 8).with_comment("Data element bit size"));
  cards.push(Card::integer("NAXIS", 2).with_comment("Number of data axis"));
  cards.push(Card::integer("NAXIS1", row_byte_size as i64).with_comment("Row byte size"));
  cards.push(Card::integer("NAXIS2", n_rows as i64).with_comment("Number of rows"));
  cards.push(Card::integer("PCOUNT", 0).with_comment("Heap byte size"));
  cards.push(Card::integer("GCOUNT", 1).with_comment("Number of random groups"));
  cards.push(Card::integer("TFIELDS", specs.len() as i64).with_comment("Number of columns"));
  for (i, spec) in specs.iter().enumerate() {
    let n = i + 1;
    cards.push(
      Card::string(&format!("TFORM{}", n), spec.tform.to_string())
        .with_comment(format!("Column {} data type", n)),
    );
    if let Some(name) = &spec.name {
      cards.push(
        Card::string(&format!("TTYPE{}", n), name.as_str())
          .with_comment(format!("Column {} name", n)),
      );
    }
    if let Some(unit) = &spec.unit {
      cards.push(
        Card::string(&format!("TUNIT{}", n), unit.as_str())
          .with_comment(format!("Column {} unit", n)),
      );
    }
    if let Some(null) = spec.null {
      cards.push(
        Card::integer(&format!("TNULL{}", n), null)
          .with_comment(format!("Null value of column {}", n)),
      );
    }
    if let Some(scale) = spec.scale {
      cards.push(
        Card::real(&format!("TSCAL{}", n), scale)
          .with_comment(format!("Scaling of column {}", n)),
      );
    }
    if let Some(zero) = spec.zero {
      cards.push(
        Card::real(&format!("TZERO{}", n), zero)
          .with_comment(format!("Offset of column {}", n)),
      );
    }
  }
  cards
}
