use std::{error::Error, path::PathBuf};

use clap::Args;

use fitstream::FitsReader;

#[derive(Debug, Clone, Args)]
pub struct Head {
  /// Path of the input file.
  #[clap(value_name = "FILE")]
  pub input: PathBuf,
}

impl Head {
  pub fn exec(self) -> Result<(), Box<dyn Error>> {
    let mut reader = FitsReader::open(&self.input)?;
    let mut i = 0;
    while let Some(hdu) = reader.advance()? {
      println!("HDU[{}]:", i);
      for card in hdu.cards().iter() {
        println!("{}", card);
      }
      println!();
      i += 1;
    }
    Ok(())
  }
}
