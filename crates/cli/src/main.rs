extern crate fitstream_cli;

use std::error::Error;

use clap::Parser;

use fitstream_cli::{head::Head, r#struct::Struct, table::Table};

/// Inspect FITS files on the command line.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
  /// Read and print the structure of a FITS file
  #[clap(name = "struct")]
  Struct(Struct),
  /// Read and print the headers of all the HDUs in a FITS file
  #[clap(name = "head")]
  Head(Head),
  /// Print the decoded rows of a binary table HDU
  #[clap(name = "table")]
  Table(Table),
}

impl Args {
  fn exec(self) -> Result<(), Box<dyn Error>> {
    match self {
      Self::Struct(args) => args.exec(),
      Self::Head(args) => args.exec(),
      Self::Table(args) => args.exec(),
    }
  }
}

fn main() {
  env_logger::init();
  let args = Args::parse();
  if let Err(e) = args.exec() {
    eprintln!("Error: {}", e);
    std::process::exit(1);
  }
}
