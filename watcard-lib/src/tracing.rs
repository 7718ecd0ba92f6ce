use crate::config::LogConfig;
use anyhow::Context;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, registry};

/// Installs the subscriber for the current thread. Events go to stderr and,
/// when `config.file` is set, are also appended to that file.
///
/// Logging stops when the returned guard is dropped.
pub fn init_tracing(config: &LogConfig) -> Result<DefaultGuard, anyhow::Error> {
    let level = LevelFilter::from_str(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Unable to open log file {}", path.display()))?;
            Some(
                fmt::Layer::default()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    let subscriber = registry::Registry::default()
        .with(level)
        .with(fmt::Layer::default().with_writer(std::io::stderr))
        .with(file_layer);
    Ok(tracing::subscriber::set_default(subscriber))
}
