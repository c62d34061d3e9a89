//! Unified application error model and its pgwire mapping.
//! Every failure a client can observe is an `AppError`; the pgwire frontend turns it
//! into an ErrorResponse with a SQLSTATE from a fixed vocabulary.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind { Table, Column }

impl Display for IdentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentKind::Table => write!(f, "relation"),
            IdentKind::Column => write!(f, "column"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    /// Malformed or oversized frame. Connection-fatal.
    #[error("{0}")]
    Framing(String),
    /// Extended-protocol (or copy) message received in simple-query mode.
    #[error("unsupported protocol mode: {0}")]
    ProtocolMode(String),
    /// Simple-query payload that is not a terminated string (`invalid_text` = bad UTF-8).
    #[error("{message}")]
    MalformedMessage { message: String, invalid_text: bool },
    /// Grammar violation; `position` is a 1-based character offset into the query.
    #[error("syntax error at or near position {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("{kind} \"{name}\" does not exist")]
    UnknownIdentifier { kind: IdentKind, name: String },
    #[error("predicate on column \"{column}\" is not supported; only equality on \"{key}\" is allowed")]
    UnsupportedPredicate { column: String, key: String },
    /// Store collaborator failure. The detail is logged, not sent.
    #[error("internal error while reading the time-series store")]
    Store(String),
    #[error("{message}")]
    Auth { code: &'static str, message: String },
    #[error("{message}")]
    Startup { code: &'static str, message: String },
    /// A result shape the wire format cannot carry.
    #[error("{0}")]
    ProgramLimit(String),
    #[error("terminating connection due to idle-session timeout")]
    IdleTimeout,
}

impl AppError {
    pub fn framing<S: Into<String>>(msg: S) -> Self { AppError::Framing(msg.into()) }
    pub fn protocol_mode<S: Into<String>>(msg: S) -> Self { AppError::ProtocolMode(msg.into()) }
    pub fn malformed<S: Into<String>>(msg: S) -> Self { AppError::MalformedMessage { message: msg.into(), invalid_text: false } }
    pub fn invalid_text<S: Into<String>>(msg: S) -> Self { AppError::MalformedMessage { message: msg.into(), invalid_text: true } }
    pub fn syntax<S: Into<String>>(position: usize, msg: S) -> Self { AppError::Syntax { position, message: msg.into() } }
    pub fn unknown_table<S: Into<String>>(name: S) -> Self { AppError::UnknownIdentifier { kind: IdentKind::Table, name: name.into() } }
    pub fn unknown_column<S: Into<String>>(name: S) -> Self { AppError::UnknownIdentifier { kind: IdentKind::Column, name: name.into() } }
    pub fn store<S: Into<String>>(msg: S) -> Self { AppError::Store(msg.into()) }
    pub fn auth_failed(user: &str) -> Self {
        AppError::Auth { code: "28P01", message: format!("password authentication failed for user \"{}\"", user) }
    }
    pub fn startup<S: Into<String>>(code: &'static str, msg: S) -> Self { AppError::Startup { code, message: msg.into() } }
    pub fn program_limit<S: Into<String>>(msg: S) -> Self { AppError::ProgramLimit(msg.into()) }

    /// Pgwire mapping: return (sqlstate, severity, message)
    pub fn pgwire_fields(&self) -> (&'static str, &'static str, String) {
        let msg = self.to_string();
        match self {
            AppError::Framing(_) => ("08P01", "FATAL", msg),                 // protocol_violation
            AppError::ProtocolMode(_) => ("0A000", "ERROR", msg),            // feature_not_supported
            AppError::MalformedMessage { invalid_text: true, .. } => ("22021", "ERROR", msg), // character_not_in_repertoire
            AppError::MalformedMessage { .. } => ("08P01", "ERROR", msg),
            AppError::Syntax { message, .. } => ("42601", "ERROR", message.clone()),
            AppError::UnknownIdentifier { kind: IdentKind::Table, .. } => ("42P01", "ERROR", msg), // undefined_table
            AppError::UnknownIdentifier { kind: IdentKind::Column, .. } => ("42703", "ERROR", msg), // undefined_column
            AppError::UnsupportedPredicate { .. } => ("0A000", "ERROR", msg),
            AppError::Store(_) => ("XX000", "ERROR", msg),                   // internal_error
            AppError::Auth { code, .. } | AppError::Startup { code, .. } => (code, "FATAL", msg),
            AppError::ProgramLimit(_) => ("54011", "ERROR", msg),             // too_many_columns
            AppError::IdleTimeout => ("57P05", "FATAL", msg),                // idle_session_timeout
        }
    }

    /// Fatal errors close the connection after the ErrorResponse is delivered.
    pub fn is_fatal(&self) -> bool { self.pgwire_fields().1 == "FATAL" }

    /// Error cursor position for the ErrorResponse `P` field.
    pub fn position(&self) -> Option<usize> {
        match self {
            AppError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
