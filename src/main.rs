use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use knn_mnist::coordinator::{Coordinator, RunConfig};
use knn_mnist::dataset::Dataset;
use knn_mnist::distance::Metric;
use knn_mnist::{logging, Result};

/// Classify a test set of 28x28 digit images by k-nearest-neighbour voting
/// against a training set, spread across several workers.
///
/// Prints the number of correct predictions on success.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Print progress information to stderr
    #[arg(short = 'v')]
    verbose: bool,

    /// Number of nearest neighbours that vote on each prediction
    #[arg(short = 'K', value_name = "NUM", default_value_t = 1)]
    k: usize,

    /// Distance metric: euclidean or cosine, or a prefix such as "eucl" or "cos"
    #[arg(short = 'd', value_name = "METRIC", default_value = "euclidean")]
    metric: String,

    /// Number of workers classifying test images in parallel
    #[arg(short = 'p', value_name = "NUM_PROCS", default_value_t = 1)]
    num_procs: usize,

    /// Training images and labels, in the binary dataset format
    training: PathBuf,

    /// Testing images and labels, in the binary dataset format
    testing: PathBuf,
}

fn run(args: &Args) -> Result<usize> {
    // Configuration is checked before any data is read
    let metric = Metric::from_selector(&args.metric)?;
    let config = RunConfig::new(args.k, metric, args.num_procs)?;

    debug!("loading datasets");
    let training = Dataset::load(&args.training)?;
    let testing = Dataset::load(&args.testing)?;

    let total = Coordinator::new(config, &training, &testing).run()?;
    info!("number of correct predictions: {}", total);
    Ok(total)
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
        Ok(total) => {
            println!("{}", total);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_worker_failure() {
                eprintln!("problem reading or writing between coordinator and workers");
            }
            eprintln!("error: {}", e);
            e.exit_code()
        }
    }
}
