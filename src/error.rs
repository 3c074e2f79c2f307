use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnnError>;

/// Everything that can stop a classification run. All of them are fatal.
#[derive(Debug, Error)]
pub enum KnnError {
    /// A dataset stream is truncated or holds values outside the layout.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// K, the worker count or the metric name cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A protocol message could not be delivered.
    #[error("channel failure on worker {worker}: {reason}")]
    ChannelFailure { worker: usize, reason: String },

    /// A worker ended without reporting, or reported that it failed.
    #[error("worker {worker} terminated abnormally: {reason}")]
    WorkerAbnormalTermination { worker: usize, reason: String },

    /// The worker pool could not be started.
    #[error("could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read failed: {0}")]
    Stream(#[source] io::Error),

    #[error("CSV import failed: {0}")]
    Csv(#[from] csv::Error),
}

impl KnnError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        KnnError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error. Every failure exits with 1.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }

    /// Whether a worker-side failure caused this error.
    pub fn is_worker_failure(&self) -> bool {
        matches!(
            self,
            KnnError::ChannelFailure { .. } | KnnError::WorkerAbnormalTermination { .. }
        )
    }
}
