use std::{error::Error, path::PathBuf};

use clap::Args;

use fitstream::{FitsReader, Hdu, HduKind};

#[derive(Debug, Clone, Args)]
pub struct Struct {
  /// Path of the input file.
  #[clap(value_name = "FILE")]
  pub input: PathBuf,
}

impl Struct {
  pub fn exec(self) -> Result<(), Box<dyn Error>> {
    let mut reader = FitsReader::open(&self.input)?;
    let mut i = 0;
    while let Some(hdu) = reader.advance()? {
      print_hdu_struct(i, &hdu)?;
      i += 1;
    }
    Ok(())
  }
}

fn print_hdu_struct(i: usize, hdu: &Hdu) -> Result<(), Box<dyn Error>> {
  println!("HDU[{}]:", i);
  println!(
    " * HEAD starting byte: {}; n_cards: {}.",
    hdu.header_position(),
    hdu.cards().len()
  );
  println!(
    " * DATA starting byte: {}; byte size: {}; strides: {} x {} bytes.",
    hdu.data_position(),
    hdu.data_byte_size(),
    hdu.total_strides(),
    hdu.stride_length()
  );
  match hdu.kind() {
    HduKind::PrimaryImage | HduKind::ImageExtension => {
      print_hdu_type(if hdu.kind() == HduKind::PrimaryImage {
        "PRIMARY"
      } else {
        "IMAGE"
      });
      println!(
        "   + bitpix: {}; naxis: {}; dimensions: {}.",
        hdu.bitpix()?.i16_value(),
        hdu.naxis()?,
        get_dims(hdu)?
      );
    }
    HduKind::BinaryTable => {
      print_hdu_type("BINTABLE");
      println!(
        "   + n_cols: {}; n_rows: {}; row_byte_size: {}.",
        hdu.columns().len(),
        hdu.total_strides(),
        hdu.stride_length()
      );
      for column in hdu.columns() {
        println!(
          "   + col {}: '{}' {}{}",
          column.index(),
          column.name().unwrap_or(""),
          column.tform(),
          column
            .unit()
            .map(|u| format!(" [{}]", u))
            .unwrap_or_default()
        );
      }
    }
    HduKind::Generic => {
      print_hdu_type("GENERIC");
    }
  }
  if let Some(extname) = hdu.extname()? {
    println!("   + extname: '{}'.", extname);
  }
  Ok(())
}

fn print_hdu_type(hdu_type: &str) {
  println!(" * TYPE: {}", hdu_type);
}

fn get_dims(hdu: &Hdu) -> Result<String, Box<dyn Error>> {
  let mut dims = Vec::with_capacity(hdu.naxis()? as usize);
  for i in 1..=hdu.naxis()? {
    dims.push(hdu.naxis_n(i)?.to_string());
  }
  Ok(if dims.is_empty() {
    String::from("0")
  } else {
    dims.join("x")
  })
}
