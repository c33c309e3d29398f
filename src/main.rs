use crate::config::{AppConfig, LogFormat};
use crate::db::{init_db, Database, SqliteHistoryStore};
use crate::responses::error_to_response;
use crate::router::{handle, App};
use crate::tesla::TeslaClient;
use crate::tracker::OrderTracker;
use astra::Server;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod db;
mod domain;
mod errors;
mod responses;
mod router;
mod tesla;
mod tracker;

#[cfg(test)]
mod tests;

fn main() {
    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(cfg.log_format);

    if let Err(e) = run(cfg) {
        error!(error = %e, "server failed to start");
        std::process::exit(1);
    }
}

fn run(cfg: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rules = Arc::new(cfg.load_rules()?);
    info!(ignored = rules.ignore.len(), labels = rules.labels.len(), "diff rules loaded");
    if rules.ignore.is_empty() {
        warn!("ignore list is empty, volatile vendor fields will show up as changes");
    }

    let db = Database::new(&cfg.db_path);
    init_db(&db)?;

    let app = App {
        tracker: OrderTracker::new(SqliteHistoryStore::new(db), rules),
        vendor: Arc::new(TeslaClient::new(cfg.tesla.clone())?),
    };

    info!(addr = %cfg.bind_addr, workers = cfg.max_workers, "starting server");
    let server = Server::bind(&cfg.bind_addr).max_workers(cfg.max_workers);

    server.serve(move |req, _info| match handle(req, &app) {
        Ok(resp) => resp,
        Err(err) => error_to_response(err),
    })?;

    info!("server shut down cleanly");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_ansi(false)).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}
