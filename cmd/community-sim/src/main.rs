//! # Community simulator
//!
//! Drives the whole subsystem with many concurrent users, then audits every
//! post and comment: each stored karma must equal the sum of the deltas the
//! vote engine reported for it.
//!
//! ```bash
//! community-sim
//! COMMUNITY__SIMULATION__USERS=32 COMMUNITY__LOG__FORMAT=json community-sim
//! COMMUNITY__STORAGE__BACKEND=sqlite cargo run -p community-sim --features db-sqlite
//! ```
//!
//! The JSON report goes to stdout, logs to stderr. The process exits non-zero
//! when the audit finds a mismatch or an internal error.

mod simulation;

use std::sync::Arc;

use anyhow::{bail, Result};
use configs::{LogFormat, LogSettings, Settings, StorageBackend, StorageSettings};
use services::Community;
use storage_adapters::MemoryStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::simulation::Simulation;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    info!(
        backend = ?settings.storage.backend,
        users = settings.simulation.users,
        rounds = settings.simulation.rounds,
        "starting community simulation"
    );

    let community = build_community(&settings.storage).await?;
    let report = Simulation::new(community, &settings).run().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_consistent() {
        warn!(
            mismatches = report.mismatches.len(),
            internal_errors = report.internal_errors(),
            "audit failed"
        );
        bail!("karma audit failed");
    }
    info!(audited = report.audited_targets, "audit passed");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

async fn build_community(storage: &StorageSettings) -> Result<Community> {
    match storage.backend {
        StorageBackend::Memory => Ok(Community::new(Arc::new(MemoryStore::new()))),
        #[cfg(feature = "db-sqlite")]
        StorageBackend::Sqlite => {
            use secrecy::ExposeSecret;
            let store = storage_adapters::SqliteStore::connect(storage.database_url.expose_secret()).await?;
            Ok(Community::new(Arc::new(store)))
        }
        #[cfg(not(feature = "db-sqlite"))]
        StorageBackend::Sqlite => bail!("sqlite backend requested but built without the `db-sqlite` feature"),
    }
}
