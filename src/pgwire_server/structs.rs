use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::security::Authenticator;
use crate::server::exec::ExecContext;

/// Inbound tagged message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnPhase {
    AwaitingStartup,
    Authenticating,
    ReadyForQuery,
    ProcessingQuery,
    /// An extended-protocol message was refused; the rest of the batch is dropped until Sync.
    DiscardingUntilSync,
    Closed,
}

pub struct ConnState {
    pub conn_id: u64,
    pub peer: String,
    pub phase: ConnPhase,
    pub user: String,
    pub database: String,
    pub client_encoding: String,
    pub application_name: Option<String>,
    pub startup_params: HashMap<String, String>,
    pub process_id: i32,
    pub secret_key: i32,
    pub queries_served: u64,
}

impl ConnState {
    pub fn new(conn_id: u64, peer: &str) -> Self {
        Self {
            conn_id,
            peer: peer.to_string(),
            phase: ConnPhase::AwaitingStartup,
            user: String::new(),
            database: String::new(),
            client_encoding: "UTF8".to_string(),
            application_name: None,
            startup_params: HashMap::new(),
            process_id: (conn_id & 0x7FFF_FFFF) as i32,
            secret_key: 0,
            queries_served: 0,
        }
    }
}

/// RowDescription field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: i32,
    pub column_id: i16,
    pub type_oid: i32,
    pub type_len: i16,
    pub type_modifier: i32,
    pub format: i16,
}

/// Wire-level knobs taken from `ServerConfig`.
#[derive(Debug, Clone)]
pub struct WireSettings {
    pub max_frame_len: usize,
    pub idle_timeout: Option<Duration>,
    pub server_version: String,
}

impl WireSettings {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self {
            max_frame_len: cfg.max_frame_len,
            idle_timeout: cfg.idle_timeout(),
            server_version: cfg.server_version.clone(),
        }
    }
}

impl Default for WireSettings {
    fn default() -> Self { Self::from_config(&ServerConfig::default()) }
}

/// Shared, read-only state handed to every connection task.
pub struct PgwireContext {
    pub exec: ExecContext,
    pub auth: Arc<dyn Authenticator>,
    pub settings: WireSettings,
}
