// Print both distances between the first two images of a dataset file
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use knn_mnist::dataset::Dataset;
use knn_mnist::distance::Metric;
use knn_mnist::{logging, KnnError, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Distances between the first two images of a dataset")]
struct Args {
    /// Dataset in the binary format, with at least two images
    dataset: PathBuf,
}

fn run(args: &Args) -> Result<(f64, f64)> {
    let data = Dataset::load(&args.dataset)?;
    if data.len() < 2 {
        return Err(KnnError::MalformedInput(format!(
            "{} holds {} images, need at least 2",
            args.dataset.display(),
            data.len()
        )));
    }
    let (a, b) = (data.image(0), data.image(1));
    Ok((Metric::Cosine.distance(a, b), Metric::Euclidean.distance(a, b)))
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
    logging::init(false);

    match run(&args) {
        Ok((cosine, euclidean)) => {
            println!("Cosine distance = {:.6}", cosine);
            println!("Euclidean distance = {:.6}", euclidean);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            e.exit_code()
        }
    }
}
