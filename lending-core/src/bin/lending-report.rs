//! Print a lending dashboard for the library stored under `LENDING_DATA_DIR`,
//! with the engine's Prometheus metrics in text format

use chrono::Utc;
use lending_core::{Config, Library};

fn main() -> anyhow::Result<()> {
    let config = match std::env::var("LENDING_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        data_dir = %config.data_dir.display(),
        "Opening library"
    );

    let library = Library::open(&config)?;
    let now = Utc::now();
    let reports = library.reports();

    let overdue: Vec<_> = reports.overdue_loans(now).into_iter().cloned().collect();
    let report = serde_json::json!({
        "dashboard": reports.dashboard(now),
        "overdue": overdue,
        "metrics": library.metrics().export()?,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(overdue = overdue.len(), "Report written");
    Ok(())
}
