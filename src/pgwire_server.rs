//! PostgreSQL wire-protocol frontend, simple-query sub-protocol only.
//! - Startup: SSL/GSS refused with 'N', cancel requests closed, trust or cleartext password auth
//! - Simple query: parse, execute against the tag store, stream rows as text
//! - Extended protocol and COPY: one ErrorResponse per batch, then discard until Sync

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub mod encodedecode;
pub mod misc;
pub mod oids;
pub mod parse;
pub mod security;
pub mod send;
pub mod structs;

use crate::error::AppError;
use crate::server::exec::{execute_query, QueryOutcome};
use encodedecode::encode_result_set;
use misc::*;
use parse::*;
use security::{read_password_message, request_password, send_auth_ok_and_params};
use send::*;
use structs::*;

pub use structs::{PgwireContext, WireSettings};

/// Accept loop over an already-bound listener; one task per connection.
pub async fn serve(listener: TcpListener, ctx: Arc<PgwireContext>) -> Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let ctx = ctx.clone();
        let conn_id = CONN_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = socket.set_nodelay(true) {
            debug!(target: "pgwire", "conn_id={} set_nodelay failed: {}", conn_id, e);
        }
        tokio::spawn(async move {
            if let Err(e) = handle_conn(socket, &ctx, conn_id, &peer.to_string()).await {
                error!(target: "pgwire", "conn_id={} peer={} error: {:#}", conn_id, peer, e);
            }
        });
    }
}

/// Drive one connection from the startup packet to close.
pub async fn handle_conn<S>(socket: S, ctx: &PgwireContext, conn_id: u64, peer: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(target: "pgwire", "conn_id={} new connection established from {}", conn_id, peer);
    let mut socket = BufWriter::new(socket);
    let mut state = ConnState::new(conn_id, peer);
    let result = match startup(&mut socket, ctx, &mut state).await {
        Ok(true) => run_query_loop(&mut socket, ctx, &mut state).await,
        Ok(false) => Ok(()),
        Err(e) => Err(e),
    };
    state.phase = ConnPhase::Closed;
    let _ = socket.shutdown().await;
    debug!(target: "pgwire", "conn_id={} closed after {} queries", conn_id, state.queries_served);
    result
}

/// Report a protocol error to the client. Fatal errors are delivered and end the
/// session (`Ok(false)`); recoverable ones are sent as ERROR (`Ok(true)`).
/// Anything that is not an `AppError` is a transport failure and is handed back.
async fn fail<S: AsyncWrite + Unpin>(socket: &mut S, state: &ConnState, e: anyhow::Error) -> Result<bool> {
    match e.downcast_ref::<AppError>() {
        Some(app) if app.is_fatal() => {
            warn!(target: "pgwire", "conn_id={} fatal: {}", state.conn_id, app);
            send_fatal(socket, app).await;
            Ok(false)
        }
        Some(app) => {
            info!(target: "pgwire", "conn_id={} error: {}", state.conn_id, app);
            send_error_response(socket, app).await?;
            socket.flush().await?;
            Ok(true)
        }
        None => Err(e),
    }
}

/// Startup cannot resume after an error, recoverable or not.
async fn fail_startup<S: AsyncWrite + Unpin>(socket: &mut S, state: &ConnState, e: anyhow::Error) -> Result<bool> {
    fail(socket, state, e).await?;
    Ok(false)
}

/// Startup and authentication. `Ok(true)` when the session reached ReadyForQuery.
async fn startup<S>(socket: &mut BufWriter<S>, ctx: &PgwireContext, state: &mut ConnState) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut refused_encryption = false;
    let (minor, params) = loop {
        let body = match read_startup_packet(socket).await {
            Ok(Some(b)) => b,
            Ok(None) => {
                debug!(target: "pgwire", "conn_id={} closed before startup", state.conn_id);
                return Ok(false);
            }
            Err(e) => return fail_startup(socket, state, e).await,
        };
        if pgwire_trace_enabled() {
            debug!(target: "pgwire", "conn_id={} startup packet len={}, first={} bytes: {}", state.conn_id, body.len() + 4, body.len().min(32), hex_dump_prefix(&body, 32));
        }
        match parse_startup_packet(&body) {
            Ok(StartupRequest::Ssl) | Ok(StartupRequest::GssEnc) if !refused_encryption => {
                debug!(target: "pgwire", "conn_id={} SSL/GSSENC request detected, refusing with 'N'", state.conn_id);
                socket.write_all(b"N").await?;
                socket.flush().await?;
                refused_encryption = true;
            }
            Ok(StartupRequest::Ssl) | Ok(StartupRequest::GssEnc) => {
                return fail_startup(socket, state, AppError::startup("08P01", "encryption negotiation requested twice").into()).await;
            }
            Ok(StartupRequest::Cancel { process_id, .. }) => {
                // no in-flight cancellation; the request is acknowledged by closing
                debug!(target: "pgwire", "conn_id={} cancel request for pid={}, closing", state.conn_id, process_id);
                return Ok(false);
            }
            Ok(StartupRequest::Startup { minor, params, .. }) => break (minor, params),
            Err(app) => return fail_startup(socket, state, app.into()).await,
        }
    };

    for (k, v) in &params {
        match k.as_str() {
            "user" => state.user = v.clone(),
            "database" => state.database = v.clone(),
            "client_encoding" => state.client_encoding = v.clone(),
            "application_name" => state.application_name = Some(v.clone()),
            _ => {}
        }
        state.startup_params.insert(k.clone(), v.clone());
    }
    debug!(target: "pgwire", "conn_id={} startup params parsed, user='{}' (keys={:?})", state.conn_id, state.user, state.startup_params.keys().collect::<Vec<_>>());
    if state.user.is_empty() {
        return fail_startup(socket, state, AppError::Auth { code: "28000", message: "no PostgreSQL user name specified in startup packet".into() }.into()).await;
    }
    if state.database.is_empty() { state.database = state.user.clone(); }
    if !is_utf8_encoding_name(&state.client_encoding) {
        let msg = format!("invalid value for parameter \"client_encoding\": \"{}\"", state.client_encoding);
        return fail_startup(socket, state, AppError::startup("22023", msg).into()).await;
    }

    let unrecognized = unrecognized_protocol_options(&params);
    if minor > 0 || !unrecognized.is_empty() {
        debug!(target: "pgwire", "conn_id={} negotiating protocol 3.{} down to 3.0 (unrecognized={:?})", state.conn_id, minor, unrecognized);
        send_messages(socket, &[BackendMessage::NegotiateProtocolVersion { newest_minor: 0, unrecognized }]).await?;
    }

    state.phase = ConnPhase::Authenticating;
    if ctx.auth.requires_password() {
        request_password(socket).await?;
        let password = match read_password_message(socket, ctx.settings.max_frame_len).await {
            Ok(p) => p,
            Err(e) => return fail_startup(socket, state, e).await,
        };
        debug!(target: "pgwire", "conn_id={} password received, authenticating user '{}'", state.conn_id, state.user);
        let ok = match ctx.auth.authenticate(&state.user, &password) {
            Ok(ok) => ok,
            Err(e) => {
                error!(target: "pgwire", "conn_id={} credential store error: {:#}", state.conn_id, e);
                false
            }
        };
        if !ok {
            info!(target: "pgwire", "conn_id={} authentication failed for user '{}'", state.conn_id, state.user);
            return fail_startup(socket, state, AppError::auth_failed(&state.user).into()).await;
        }
        debug!(target: "pgwire", "conn_id={} authentication successful for user '{}'", state.conn_id, state.user);
    } else {
        debug!(target: "pgwire", "conn_id={} trust mode; skipping password auth for user '{}'", state.conn_id, state.user);
    }

    state.secret_key = random_secret_key()?;
    send_auth_ok_and_params(socket, state, &ctx.settings).await?;
    state.phase = ConnPhase::ReadyForQuery;
    info!(target: "pgwire", "conn_id={} peer={} user='{}' database='{}' ready", state.conn_id, state.peer, state.user, state.database);
    Ok(true)
}

async fn run_query_loop<S>(socket: &mut BufWriter<S>, ctx: &PgwireContext, state: &mut ConnState) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(target: "pgwire", "conn_id={} entering query loop", state.conn_id);
    loop {
        let read = read_frame(socket, ctx.settings.max_frame_len);
        let next = match ctx.settings.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(r) => r,
                Err(_) => {
                    info!(target: "pgwire", "conn_id={} idle for {:?}, closing", state.conn_id, limit);
                    send_fatal(socket, &AppError::IdleTimeout).await;
                    return Ok(());
                }
            },
            None => read.await,
        };
        let frame = match next {
            Ok(Some(f)) => f,
            Ok(None) => {
                debug!(target: "pgwire", "conn_id={} connection closed by client", state.conn_id);
                return Ok(());
            }
            Err(e) => {
                if fail(socket, state, e).await? {
                    send_ready_with_status(socket, b'I').await?;
                    continue;
                }
                return Ok(());
            }
        };
        debug!(target: "pgwire", "conn_id={} received message type '{}' ({}), len={}", state.conn_id, frame.tag as char, frontend_message_name(frame.tag), frame.payload.len());

        match (state.phase, frame.tag) {
            (_, b'Q') => {
                state.phase = ConnPhase::ProcessingQuery;
                handle_query(socket, ctx, state, &frame.payload).await?;
                state.phase = ConnPhase::ReadyForQuery;
            }
            (_, b'X') => {
                debug!(target: "pgwire", "conn_id={} received Terminate message, closing connection", state.conn_id);
                return Ok(());
            }
            (ConnPhase::DiscardingUntilSync, b'S') => {
                state.phase = ConnPhase::ReadyForQuery;
                send_ready_with_status(socket, b'I').await?;
            }
            (_, b'S') => {
                send_error_response(socket, &AppError::protocol_mode("Sync received outside an extended-protocol batch")).await?;
                send_ready_with_status(socket, b'I').await?;
            }
            (ConnPhase::DiscardingUntilSync, b'P' | b'B' | b'D' | b'E' | b'C' | b'H' | b'd' | b'c' | b'f') => {
                debug!(target: "pgwire", "conn_id={} discarding {} until Sync", state.conn_id, frontend_message_name(frame.tag));
            }
            (_, b'P' | b'B' | b'D' | b'E' | b'C' | b'H' | b'd' | b'c' | b'f') => {
                let name = frontend_message_name(frame.tag);
                info!(target: "pgwire", "conn_id={} rejected {} message; only the simple query protocol is supported", state.conn_id, name);
                let err = AppError::protocol_mode(format!("{} message received; only the simple query protocol is supported", name));
                send_error_response(socket, &err).await?;
                socket.flush().await?;
                state.phase = ConnPhase::DiscardingUntilSync;
            }
            (_, other) => {
                if pgwire_trace_enabled() {
                    debug!(target: "pgwire", "conn_id={} unknown frame payload (first 64 bytes): {}", state.conn_id, hex_dump_prefix(&frame.payload, 64));
                }
                let err = AppError::framing(format!("invalid frontend message type {}", other));
                warn!(target: "pgwire", "conn_id={} {}", state.conn_id, err);
                send_fatal(socket, &err).await;
                return Ok(());
            }
        }
    }
}

/// Simple Query cycle: always a full result or an error, then ReadyForQuery.
async fn handle_query<S>(socket: &mut BufWriter<S>, ctx: &PgwireContext, state: &mut ConnState, payload: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    state.queries_served += 1;
    let outcome = decode_query_text(payload).and_then(|sql| {
        debug!(target: "pgwire", "conn_id={} simple query: {}", state.conn_id, sql);
        execute_query(&ctx.exec, &sql)
    });
    match outcome {
        Ok(QueryOutcome::Rows(rs)) => {
            debug!(target: "pgwire", "conn_id={} sending {} rows x {} columns", state.conn_id, rs.row_count(), rs.columns.len());
            // nothing is written when a message cannot be encoded
            if let Err(e) = send_messages(socket, &encode_result_set(&rs)).await {
                match e.downcast_ref::<AppError>() {
                    Some(app) => send_error_response(socket, app).await?,
                    None => return Err(e),
                }
            }
        }
        Ok(QueryOutcome::Command(tag)) => {
            send_messages(socket, &[BackendMessage::CommandComplete(tag.to_string())]).await?;
        }
        Ok(QueryOutcome::Empty) => {
            send_messages(socket, &[BackendMessage::EmptyQueryResponse]).await?;
        }
        Err(e) => {
            info!(target: "pgwire", "conn_id={} query failed: {}", state.conn_id, e);
            send_error_response(socket, &e).await?;
        }
    }
    send_ready_with_status(socket, b'I').await
}
