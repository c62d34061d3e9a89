//!
//! tagwire server bootstrap
//! ------------------------
//! Builds the store, schema and authenticator from a `ServerConfig` and runs
//! one pgwire accept loop per listen address until one of them fails.
//!
//! Responsibilities:
//! - Store seeding: optional demo dataset and NDJSON data file.
//! - Authenticator selection (trust or argon2 password table).
//! - Startup inventory logs.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::info;

use crate::config::ServerConfig;
use crate::pgwire_server::{self, PgwireContext, WireSettings};
use crate::storage::{create_demo_dataset, MemoryStore, SharedStore};

pub mod exec;
pub mod query;
pub mod schema;

use exec::ExecContext;
use schema::TableSchema;

/// Demo series length: one hour of per-second samples.
const DEMO_SECONDS: usize = 3600;

/// Build the in-memory store described by `cfg`.
pub fn build_store(cfg: &ServerConfig) -> anyhow::Result<MemoryStore> {
    let store = MemoryStore::new();
    if cfg.demo {
        create_demo_dataset(&store, DEMO_SECONDS, chrono::Utc::now());
    }
    if let Some(path) = &cfg.data_file {
        let n = store.load_ndjson(path)
            .with_context(|| format!("While loading data file {}", path.display()))?;
        info!(target: "startup", "loaded {} points from {}", n, path.display());
    }
    info!(target: "startup", "store ready: {} tags, {} points", store.tag_count(), store.point_count());
    Ok(store)
}

/// Shared per-connection context for the given config and store.
pub fn build_context(cfg: &ServerConfig, store: SharedStore) -> anyhow::Result<Arc<PgwireContext>> {
    let auth = cfg.build_authenticator().context("While building authenticator")?;
    Ok(Arc::new(PgwireContext {
        exec: ExecContext::new(store, TableSchema::new(cfg.table.clone())),
        auth,
        settings: WireSettings::from_config(cfg),
    }))
}

/// Serve on already-bound listeners, all sharing one context. Returns when any
/// listener fails to accept; the others are stopped with it.
pub async fn run_on_listeners(cfg: &ServerConfig, listeners: Vec<TcpListener>, store: SharedStore) -> anyhow::Result<()> {
    cfg.validate()?;
    if listeners.is_empty() { anyhow::bail!("no listeners to serve"); }
    let ctx = build_context(cfg, store)?;
    let mut tasks = JoinSet::new();
    for listener in listeners {
        info!(
            target: "startup",
            "tagwire pgwire on {} table='{}' auth={:?} max_frame={} idle_timeout={:?}",
            listener.local_addr()?, cfg.table, cfg.auth, cfg.max_frame_len, cfg.idle_timeout_secs
        );
        tasks.spawn(pgwire_server::serve(listener, ctx.clone()));
    }
    match tasks.join_next().await {
        Some(done) => done.context("pgwire listener task panicked")?,
        None => Ok(()),
    }
}

/// Validate `cfg`, build the store, bind every listen address and serve.
pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    cfg.validate()?;
    let store = SharedStore::new(build_store(&cfg)?);
    let mut listeners = Vec::new();
    for addr in cfg.listen_addrs()? {
        let listener = TcpListener::bind(addr).await
            .with_context(|| format!("Failed to bind pgwire listener on {}", addr))?;
        listeners.push(listener);
    }
    run_on_listeners(&cfg, listeners, store).await
}
