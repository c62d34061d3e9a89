use anyhow::{anyhow, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::AppError;
use crate::pgwire_server::misc::*;
use crate::pgwire_server::parse::decode_password;
use crate::pgwire_server::send::{send_messages, send_ready_with_status, BackendMessage};
use crate::pgwire_server::structs::{ConnState, WireSettings};

pub async fn request_password<S: AsyncWrite + Unpin>(socket: &mut S) -> Result<()> {
    // AuthenticationCleartextPassword (code 3)
    send_messages(socket, &[BackendMessage::AuthenticationCleartextPassword]).await?;
    socket.flush().await?;
    Ok(())
}

/// Read the client's `p` response. Any other message is a protocol violation.
pub async fn read_password_message<S: AsyncRead + Unpin>(socket: &mut S, max_len: usize) -> Result<String> {
    let frame = read_frame(socket, max_len).await?
        .ok_or_else(|| anyhow!("connection closed during authentication"))?;
    if frame.tag != b'p' {
        return Err(AppError::framing(format!(
            "expected password response, got message type \"{}\"", frame.tag as char)).into());
    }
    Ok(decode_password(&frame.payload))
}

/// AuthenticationOk, the ParameterStatus banner, BackendKeyData, ReadyForQuery.
pub async fn send_auth_ok_and_params<S: AsyncWrite + Unpin>(socket: &mut S, state: &ConnState, settings: &WireSettings) -> Result<()> {
    let mut msgs = vec![BackendMessage::AuthenticationOk];
    let mut param = |name: &str, value: &str| msgs.push(BackendMessage::ParameterStatus { name: name.to_string(), value: value.to_string() });
    param("server_version", &settings.server_version);
    param("server_encoding", "UTF8");
    param("client_encoding", "UTF8");
    param("DateStyle", "ISO, MDY");
    param("integer_datetimes", "on");
    param("standard_conforming_strings", "on");
    param("TimeZone", "UTC");
    param("is_superuser", "off");
    param("session_authorization", &state.user);
    if let Some(app_name) = &state.application_name {
        param("application_name", app_name);
    }
    msgs.push(BackendMessage::BackendKeyData { process_id: state.process_id, secret_key: state.secret_key });
    debug!(target: "pgwire", "conn_id={} sending AuthenticationOk, {} ParameterStatus, BackendKeyData (pid={})",
        state.conn_id, msgs.len() - 2, state.process_id);
    send_messages(socket, &msgs).await?;
    // ReadyForQuery (always idle right after startup)
    send_ready_with_status(socket, b'I').await
}
