use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use tagwire::config::{ServerConfig, DEFAULT_LISTEN};

const USAGE: &str = "tagwire server\n\nUSAGE:\n  tagwire_server [OPTIONS]\n\nOPTIONS:\n  --listen ADDR         Listen address, repeatable (env: TAGWIRE_LISTEN=a,b, default 127.0.0.1:5433)\n  --pg-port N           Override the port of every listen address (env: TAGWIRE_PG_PORT)\n  --trust               Accept any user without a password (env: TAGWIRE_TRUST)\n  --password-auth       Require cleartext passwords checked against --user entries\n  --user NAME:PASSWORD  Add a user; implies --password-auth (env: TAGWIRE_USERS=a:pw,b:pw)\n  --table NAME          Exposed table name (env: TAGWIRE_TABLE, default example)\n  --max-frame BYTES     Largest accepted frontend message (env: TAGWIRE_MAX_FRAME)\n  --idle-timeout SECS   Close idle sessions, 0 disables (env: TAGWIRE_IDLE_TIMEOUT_SECS)\n  --server-version V    Reported server_version (default 14.0)\n  --demo | --no-demo    Seed the demo dataset (env: TAGWIRE_DEMO, default off)\n  --data-file PATH      Load points from an NDJSON file (env: TAGWIRE_DATA_FILE)\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // CLI arguments override environment
    let mut cfg = ServerConfig::from_env()?;
    cfg.apply_args(args.get(1..).unwrap_or(&[]))?;

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "tagwire",
        "tagwire starting: RUST_LOG='{}', listen={:?} (default {}), table='{}', demo={}",
        rust_log, cfg.listen, DEFAULT_LISTEN, cfg.table, cfg.demo
    );

    tagwire::server::run_with_config(cfg).await
}
