use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Also append plain-text logs to this file.
    pub file: Option<PathBuf>,
    pub disabled: bool,
}

/// Installs the global `tracing` subscriber: stdout, plus the log file if set.
pub fn init(settings: &LogSettings) -> Result<()> {
    let level = if settings.disabled {
        LevelFilter::OFF
    } else {
        LevelFilter::INFO
    };

    let file_layer = match &settings.file {
        Some(path) if !settings.disabled => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .with(level)
        .init();
    Ok(())
}
