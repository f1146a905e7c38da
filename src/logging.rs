use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use crate::config::{self, LogConfig};

pub const LOG_ENV: &str = "BLOG_TUI_LOG";

/// Directives appended to every filter so HTTP internals stay quiet.
const QUIET_TARGETS: [&str; 4] = ["reqwest=warn", "hyper=warn", "hyper_util=warn", "rustls=warn"];

/// The terminal belongs to the UI, so logs go to a file. Returns the path
/// being written.
pub fn init(cfg: &LogConfig) -> Result<PathBuf> {
    let path = match &cfg.file {
        Some(path) => path.clone(),
        None => config::default_log_path().context("logging: resolve default log path")?,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("logging: open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(cfg)?)
        .with_writer(Mutex::new(file))
        .with_timer(ChronoLocal::rfc_3339())
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("logging: install subscriber: {err}"))?;

    Ok(path)
}

fn build_filter(cfg: &LogConfig) -> Result<EnvFilter> {
    let base = match std::env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => cfg.level.clone(),
    };
    let mut filter =
        EnvFilter::try_new(&base).with_context(|| format!("logging: invalid filter {base:?}"))?;
    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}
