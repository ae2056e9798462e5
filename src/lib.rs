pub mod cli;
pub mod converter;
pub mod core;
pub mod providers;
pub mod store;

use crate::converter::Converter;
use crate::core::config::AppConfig;
use crate::core::{HistorySink, SnapshotStore, UnitRegistry};
use crate::providers::{CachingRateProvider, ExchangeRateApiProvider, RateProviderOptions};
use crate::store::{DataStore, MemoryHistory, MemorySnapshotStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert {
        category: String,
        value: String,
        from: String,
        to: String,
    },
    Units {
        category: String,
    },
    Categories,
    Rates {
        refresh: bool,
    },
    History {
        clear: bool,
        limit: Option<usize>,
    },
}

/// Everything a command needs, wired from one config.
pub struct App {
    pub config: AppConfig,
    pub converter: Converter,
    pub history: Arc<dyn HistorySink>,
}

fn open_stores(config: &AppConfig) -> (Arc<dyn SnapshotStore>, Arc<dyn HistorySink>) {
    let limit = config.history.limit;
    let disk = config
        .default_data_path()
        .and_then(|path| DataStore::open(&path))
        .and_then(|data| Ok((data.snapshot_store()?, data.history(limit)?)));
    match disk {
        Ok((snapshots, history)) => {
            let snapshots: Arc<dyn SnapshotStore> = Arc::new(snapshots);
            let history: Arc<dyn HistorySink> = Arc::new(history);
            (snapshots, history)
        }
        Err(e) => {
            warn!(error = %e, "Data store unavailable, keeping rates and history in memory");
            let snapshots: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
            let history: Arc<dyn HistorySink> = Arc::new(MemoryHistory::new(limit));
            (snapshots, history)
        }
    }
}

pub async fn build_app(config: AppConfig) -> Result<App> {
    let api = &config.currency.provider;
    let source = ExchangeRateApiProvider::new(
        &api.base_url,
        api.api_key.as_deref(),
        Duration::from_secs(api.timeout_secs),
    )?;
    let options = RateProviderOptions::from_config(&config.currency)?;
    let (snapshots, history) = open_stores(&config);

    let rates = CachingRateProvider::new(Arc::new(source), snapshots, options);
    rates.initialize().await;

    let mut converter = Converter::new(UnitRegistry::builtin(), rates, config.currency.precision);
    if config.history.enabled {
        converter = converter.with_history(Arc::clone(&history));
    }

    Ok(App {
        config,
        converter,
        history,
    })
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("convbuddy starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = build_app(config).await?;

    match command {
        AppCommand::Convert {
            category,
            value,
            from,
            to,
        } => {
            let result = cli::convert::run(&app.converter, &category, &value, &from, &to).await;
            app.converter.flush_history().await;
            result
        }
        AppCommand::Units { category } => cli::units::run(&app.converter, &category).await,
        AppCommand::Categories => cli::units::run_categories(&app.converter),
        AppCommand::Rates { refresh } => cli::rates::run(&app.converter, refresh).await,
        AppCommand::History { clear, limit } => {
            let limit = limit.unwrap_or(app.config.history.limit);
            cli::history::run(app.history.as_ref(), clear, limit).await
        }
    }
}
