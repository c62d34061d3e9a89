//!
//! tagwire configuration
//! ---------------------
//! `ServerConfig` is resolved in three layers: built-in defaults, then
//! `TAGWIRE_*` environment variables, then command-line flags of the server
//! binary. Later layers override earlier ones field by field.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::security::{Authenticator, PasswordAuthenticator, TrustAuthenticator};
use crate::server::schema::DEFAULT_TABLE;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5433";
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;
pub const DEFAULT_SERVER_VERSION: &str = "14.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode { Trust, Password }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Every address is served with the same store and settings.
    pub listen: Vec<String>,
    pub auth: AuthMode,
    /// user -> plaintext password or argon2 PHC hash
    pub users: BTreeMap<String, String>,
    pub table: String,
    pub max_frame_len: usize,
    /// Seconds a connection may sit in ReadyForQuery; `None` disables the timeout.
    pub idle_timeout_secs: Option<u64>,
    pub server_version: String,
    pub demo: bool,
    pub data_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: vec![DEFAULT_LISTEN.to_string()],
            auth: AuthMode::Trust,
            users: BTreeMap::new(),
            table: DEFAULT_TABLE.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            idle_timeout_secs: None,
            server_version: DEFAULT_SERVER_VERSION.to_string(),
            demo: false,
            data_file: None,
        }
    }
}

pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `alice:secret,bob:$argon2id$...`; the password part may itself contain ':'.
pub fn parse_users(s: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (user, secret) = entry.split_once(':')
            .ok_or_else(|| anyhow!("user entry '{}' is not NAME:PASSWORD", entry))?;
        if user.is_empty() { bail!("user entry '{}' has an empty name", entry); }
        out.insert(user.to_string(), secret.to_string());
    }
    Ok(out)
}

/// Comma-separated listen addresses; a leading `tcp://` is accepted.
pub fn parse_listen(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| a.strip_prefix("tcp://").unwrap_or(a).to_string())
        .collect()
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1).map(|s| s.as_str()).ok_or_else(|| anyhow!("{} requires a value", flag))
}

impl ServerConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_with(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Overlay variables from `get`; unset variables leave fields untouched.
    pub fn apply_env_with<F: Fn(&str) -> Option<String>>(&mut self, get: F) -> Result<()> {
        if let Some(v) = get("TAGWIRE_LISTEN") { self.listen = parse_listen(&v); }
        if let Some(v) = get("TAGWIRE_PG_PORT") {
            let port = v.parse::<u16>().with_context(|| format!("TAGWIRE_PG_PORT '{}'", v))?;
            self.set_port(port)?;
        }
        if let Some(v) = get("TAGWIRE_USERS") {
            self.users = parse_users(&v).context("TAGWIRE_USERS")?;
            if !self.users.is_empty() { self.auth = AuthMode::Password; }
        }
        if let Some(v) = get("TAGWIRE_TRUST") {
            match parse_bool_str(&v) {
                Some(true) => self.auth = AuthMode::Trust,
                Some(false) => self.auth = AuthMode::Password,
                None => bail!("TAGWIRE_TRUST '{}' is not a boolean", v),
            }
        }
        if let Some(v) = get("TAGWIRE_TABLE") { self.table = v; }
        if let Some(v) = get("TAGWIRE_MAX_FRAME") {
            self.max_frame_len = v.parse::<usize>().with_context(|| format!("TAGWIRE_MAX_FRAME '{}'", v))?;
        }
        if let Some(v) = get("TAGWIRE_IDLE_TIMEOUT_SECS") {
            let secs = v.parse::<u64>().with_context(|| format!("TAGWIRE_IDLE_TIMEOUT_SECS '{}'", v))?;
            self.idle_timeout_secs = if secs == 0 { None } else { Some(secs) };
        }
        if let Some(v) = get("TAGWIRE_DEMO") {
            self.demo = parse_bool_str(&v).ok_or_else(|| anyhow!("TAGWIRE_DEMO '{}' is not a boolean", v))?;
        }
        if let Some(v) = get("TAGWIRE_DATA_FILE") { self.data_file = Some(PathBuf::from(v)); }
        Ok(())
    }

    /// Overlay command-line flags (`args` excludes the program name).
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let mut i = 0;
        // the first --listen replaces the configured list, later ones add to it
        let mut listen_from_args = false;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--listen" => {
                    let addrs = parse_listen(flag_value(args, i, flag)?);
                    if !listen_from_args { self.listen.clear(); listen_from_args = true; }
                    self.listen.extend(addrs);
                    i += 1;
                }
                "--pg-port" => {
                    let v = flag_value(args, i, flag)?;
                    let port = v.parse::<u16>().with_context(|| format!("--pg-port '{}'", v))?;
                    self.set_port(port)?;
                    i += 1;
                }
                "--trust" => self.auth = AuthMode::Trust,
                "--password-auth" => self.auth = AuthMode::Password,
                "--user" => {
                    let users = parse_users(flag_value(args, i, flag)?)?;
                    self.users.extend(users);
                    self.auth = AuthMode::Password;
                    i += 1;
                }
                "--table" => { self.table = flag_value(args, i, flag)?.to_string(); i += 1; }
                "--max-frame" => {
                    let v = flag_value(args, i, flag)?;
                    self.max_frame_len = v.parse::<usize>().with_context(|| format!("--max-frame '{}'", v))?;
                    i += 1;
                }
                "--idle-timeout" => {
                    let v = flag_value(args, i, flag)?;
                    let secs = v.parse::<u64>().with_context(|| format!("--idle-timeout '{}'", v))?;
                    self.idle_timeout_secs = if secs == 0 { None } else { Some(secs) };
                    i += 1;
                }
                "--server-version" => { self.server_version = flag_value(args, i, flag)?.to_string(); i += 1; }
                "--demo" => self.demo = true,
                "--no-demo" => self.demo = false,
                "--data-file" => { self.data_file = Some(PathBuf::from(flag_value(args, i, flag)?)); i += 1; }
                other => bail!("unknown argument '{}'", other),
            }
            i += 1;
        }
        Ok(())
    }

    /// Override the port of every listen address.
    fn set_port(&mut self, port: u16) -> Result<()> {
        let mut addrs = self.listen_addrs()?;
        for a in &mut addrs { a.set_port(port); }
        self.listen = addrs.iter().map(SocketAddr::to_string).collect();
        Ok(())
    }

    pub fn listen_addrs(&self) -> Result<Vec<SocketAddr>> {
        if self.listen.is_empty() { bail!("no listen address configured"); }
        self.listen.iter()
            .map(|a| a.parse::<SocketAddr>().with_context(|| format!("invalid listen address '{}'", a)))
            .collect()
    }

    pub fn idle_timeout(&self) -> Option<Duration> { self.idle_timeout_secs.map(Duration::from_secs) }

    pub fn build_authenticator(&self) -> Result<Arc<dyn Authenticator>> {
        match self.auth {
            AuthMode::Trust => Ok(Arc::new(TrustAuthenticator)),
            AuthMode::Password => {
                if self.users.is_empty() { bail!("password authentication requires at least one user"); }
                let mut auth = PasswordAuthenticator::new();
                for (user, secret) in &self.users { auth.add_user(user, secret)?; }
                debug!(target: "startup", "password authentication with {} user(s)", auth.user_count());
                Ok(Arc::new(auth))
            }
        }
    }

    /// Validate values the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.listen_addrs()?;
        if self.table.is_empty() { bail!("table name must not be empty"); }
        if self.max_frame_len < 64 { bail!("max frame length {} is too small", self.max_frame_len); }
        if self.max_frame_len > i32::MAX as usize { bail!("max frame length {} exceeds the protocol limit", self.max_frame_len); }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.listen, vec!["127.0.0.1:5433"]);
        assert_eq!(c.auth, AuthMode::Trust);
        assert_eq!(c.table, "example");
        assert_eq!(c.max_frame_len, 1 << 20);
        assert!(c.idle_timeout().is_none());
        c.validate().unwrap();
    }

    #[test]
    fn env_overlay() {
        let mut c = ServerConfig::default();
        c.apply_env_with(env_of(&[
            ("TAGWIRE_PG_PORT", "6543"),
            ("TAGWIRE_USERS", "alice:pw, bob:x:y"),
            ("TAGWIRE_TABLE", "tags"),
            ("TAGWIRE_IDLE_TIMEOUT_SECS", "30"),
            ("TAGWIRE_DEMO", "yes"),
        ])).unwrap();
        assert_eq!(c.listen, vec!["127.0.0.1:6543"]);
        assert_eq!(c.auth, AuthMode::Password);
        assert_eq!(c.users.get("bob").map(String::as_str), Some("x:y"));
        assert_eq!(c.table, "tags");
        assert_eq!(c.idle_timeout(), Some(Duration::from_secs(30)));
        assert!(c.demo);
    }

    #[test]
    fn trust_env_overrides_users() {
        let mut c = ServerConfig::default();
        c.apply_env_with(env_of(&[("TAGWIRE_USERS", "a:b"), ("TAGWIRE_TRUST", "on")])).unwrap();
        assert_eq!(c.auth, AuthMode::Trust);
        assert!(c.apply_env_with(env_of(&[("TAGWIRE_TRUST", "maybe")])).is_err());
    }

    #[test]
    fn args_override_env() {
        let mut c = ServerConfig::default();
        c.apply_env_with(env_of(&[("TAGWIRE_TABLE", "from_env")])).unwrap();
        let args: Vec<String> = ["--table", "from_cli", "--listen", "0.0.0.0:7000", "--pg-port", "7001", "--demo", "--user", "carol:pw"]
            .iter().map(|s| s.to_string()).collect();
        c.apply_args(&args).unwrap();
        assert_eq!(c.table, "from_cli");
        assert_eq!(c.listen, vec!["0.0.0.0:7001"]);
        assert!(c.demo);
        assert_eq!(c.auth, AuthMode::Password);
        assert!(c.build_authenticator().unwrap().requires_password());
    }

    #[test]
    fn bad_args() {
        let mut c = ServerConfig::default();
        assert!(c.apply_args(&["--pg-port".to_string()]).is_err());
        assert!(c.apply_args(&["--bogus".to_string()]).is_err());
        assert!(parse_users("nocolon").is_err());
    }

    #[test]
    fn password_mode_without_users_is_rejected() {
        let c = ServerConfig { auth: AuthMode::Password, ..ServerConfig::default() };
        assert!(c.build_authenticator().is_err());
    }

    #[test]
    fn password_mode_with_users_builds() {
        let mut c = ServerConfig { auth: AuthMode::Password, ..ServerConfig::default() };
        c.users = parse_users("alice:pw,bob:pw2").unwrap();
        let auth = c.build_authenticator().unwrap();
        assert!(auth.requires_password());
    }

    #[test]
    fn several_listen_addresses() {
        let mut c = ServerConfig::default();
        c.apply_env_with(env_of(&[("TAGWIRE_LISTEN", "tcp://127.0.0.1:5433, [::1]:5433")])).unwrap();
        assert_eq!(c.listen, vec!["127.0.0.1:5433", "[::1]:5433"]);
        assert_eq!(c.listen_addrs().unwrap().len(), 2);

        let args: Vec<String> = ["--listen", "0.0.0.0:7000", "--listen", "tcp://127.0.0.2:7000", "--pg-port", "7100"]
            .iter().map(|s| s.to_string()).collect();
        c.apply_args(&args).unwrap();
        assert_eq!(c.listen, vec!["0.0.0.0:7100", "127.0.0.2:7100"]);
        c.validate().unwrap();

        c.listen.clear();
        assert!(c.validate().is_err());
        c.listen = vec!["not-an-address".to_string()];
        assert!(c.validate().is_err());
    }
}
