use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::blog;
use crate::config;
use crate::data::{self, MutationService, PostService};
use crate::logging;
use crate::storage;
use crate::sync::Synchronizer;
use crate::ui;
use crate::view::ViewState;

/// Values taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub base_url: Option<String>,
    pub config_file: Option<PathBuf>,
}

pub fn run(launch: LaunchOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: launch.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    let config_path = launch.config_file.clone().or_else(config::default_path);
    let display_path = friendly_path(config_path.as_ref());

    let log_path = logging::init(&cfg.log).context("initialise logging")?;
    tracing::info!(version = crate::VERSION, log = %log_path.display(), "starting");

    let store = storage::Store::open(storage::Options {
        path: cfg.storage.path.clone(),
    })
    .context("open storage")?;

    let stored = match store.base_url() {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("failed to read stored base address: {err:#}");
            None
        }
    };
    let base_url = resolve_base_url(launch.base_url.as_deref(), stored, &cfg.api.base_url);

    let client = blog::Client::new(blog::ClientConfig {
        user_agent: cfg.api.user_agent.clone(),
        timeout: cfg.api.timeout,
        http_client: None,
    })
    .context("build HTTP client")?;
    let client = Arc::new(client);
    let posts: Arc<dyn PostService + Send + Sync> =
        Arc::new(data::BlogPostService::new(client.clone()));
    let mutations: Arc<dyn MutationService + Send + Sync> =
        Arc::new(data::BlogMutationService::new(client));

    let status = match &base_url {
        Some(url) => format!("Using API at {url}."),
        None => "Set the API base address under Settings to get started.".to_string(),
    };
    let options = ui::Options {
        status_message: status,
        initial_fetch: base_url.is_some(),
        view: ViewState::with_base_url(base_url.unwrap_or_default()),
        synchronizer: Synchronizer::new(posts, mutations, Some(store.clone())),
        config_path: display_path,
    };

    let mut model = ui::Model::new(options);
    let result = model.run();
    drop(model);

    if let Err(err) = store.close() {
        tracing::warn!("failed to close storage: {err:#}");
    }
    tracing::info!("exiting");
    result
}

/// Command line first, then the stored preference, then configuration.
fn resolve_base_url(
    cli: Option<&str>,
    stored: Option<String>,
    configured: &str,
) -> Option<String> {
    let non_empty = |value: &str| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };
    cli.and_then(non_empty)
        .or_else(|| stored.as_deref().and_then(non_empty))
        .or_else(|| non_empty(configured))
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/blog-tui/config.yaml".to_string()
    }
}
