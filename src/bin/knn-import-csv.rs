// Convert MNIST images from csv (label, then 784 pixels per row) to the binary dataset format
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use knn_mnist::dataset::Dataset;
use knn_mnist::{logging, KnnError, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Convert an MNIST csv file to the binary dataset format")]
struct Args {
    /// Print progress information to stderr
    #[arg(short = 'v')]
    verbose: bool,

    /// Input csv file, no header
    input: PathBuf,

    /// Output dataset file
    output: PathBuf,
}

fn run(args: &Args) -> Result<usize> {
    let file = File::open(&args.input).map_err(|e| KnnError::io(&args.input, e))?;
    let dataset = Dataset::from_csv(BufReader::new(file))?;
    info!(items = dataset.len(), input = %args.input.display(), "parsed csv");
    dataset.save(&args.output)?;
    Ok(dataset.len())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    logging::init(args.verbose);

    match run(&args) {
        Ok(items) => {
            println!("{}", items);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            e.exit_code()
        }
    }
}
