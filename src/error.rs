//! Error type shared by every stage of the preparation pipeline.

use thiserror::Error;

/// Everything that can abort a run. None of these are retryable: the
/// caller fixes the input or parameters and runs the pipeline again.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Invalid parameters, caught before any corpus scan starts.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The corpus produced no tokens.
    #[error("empty corpus: no tokens found")]
    EmptyCorpus,

    /// A derived value would be non-finite (log of a non-positive value,
    /// division by zero).
    #[error("numeric domain error: {message}")]
    NumericDomain { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("npy write error: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("npy read error: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PrepError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn numeric_domain(message: impl Into<String>) -> Self {
        Self::NumericDomain {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
