use crate::error::Result;

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Console subscriber filtered by `RUST_LOG` (info by default). With a
/// `log_file` every event is also appended to that file, without colors.
pub fn subscriber(log_file: Option<&str>) -> Result<impl Subscriber + Send + Sync + 'static> {

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = File::options().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer))
}
