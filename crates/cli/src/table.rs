use std::{error::Error, path::PathBuf};

use clap::Args;

use fitstream::{FieldValue, FitsReader, HduKind};

#[derive(Debug, Clone, Args)]
pub struct Table {
  /// Path of the input file.
  #[clap(value_name = "FILE")]
  pub input: PathBuf,
  /// Index of the HDU to be printed (0 is the primary HDU).
  #[clap(value_name = "HDU", default_value = "1")]
  pub hdu: usize,
}

impl Table {
  pub fn exec(self) -> Result<(), Box<dyn Error>> {
    let mut reader = FitsReader::open(&self.input)?;
    let mut i = 0;
    while let Some(mut hdu) = reader.advance()? {
      if i != self.hdu {
        i += 1;
        continue;
      }
      if hdu.kind() != HduKind::BinaryTable {
        return Err(format!("HDU[{}] is not a binary table", self.hdu).into());
      }
      let names: Vec<String> = hdu
        .columns()
        .iter()
        .map(|c| c.name().unwrap_or("").to_owned())
        .collect();
      println!("{}", names.join(","));
      for _ in 0..hdu.total_strides() {
        let row = hdu.read_stride(&mut reader)?;
        let fields = hdu.decode_row(&row, reader.codec())?;
        let rendered: Vec<String> = fields.iter().map(fmt_field).collect();
        println!("{}", rendered.join(","));
      }
      return Ok(());
    }
    Err(format!("HDU[{}] not found", self.hdu).into())
  }
}

fn fmt_field(field: &FieldValue) -> String {
  match field {
    FieldValue::Null => String::new(),
    FieldValue::Logical(v) => if *v { "T" } else { "F" }.to_owned(),
    FieldValue::Bits(bytes) => bytes.iter().map(|b| format!("{:08b}", b)).collect(),
    FieldValue::UnsignedByte(v) => v.to_string(),
    FieldValue::Short(v) => v.to_string(),
    FieldValue::Int(v) => v.to_string(),
    FieldValue::Long(v) => v.to_string(),
    FieldValue::Ascii(s) => s.clone(),
    FieldValue::Float(v) => v.to_string(),
    FieldValue::Double(v) => v.to_string(),
    FieldValue::ComplexFloat(c) => format!("{}+{}i", c.re, c.im),
    FieldValue::ComplexDouble(c) => format!("{}+{}i", c.re, c.im),
    FieldValue::Scaled(v) => v.to_string(),
    FieldValue::Array(fields) => {
      let rendered: Vec<String> = fields.iter().map(fmt_field).collect();
      format!("[{}]", rendered.join(" "))
    }
  }
}
