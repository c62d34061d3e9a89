use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::error::AppError;
use crate::pgwire_server::structs::FieldDescription;

/// Outbound protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: i32, secret_key: i32 },
    NegotiateProtocolVersion { newest_minor: i32, unrecognized: Vec<String> },
    ReadyForQuery(u8),
    RowDescription(Vec<FieldDescription>),
    DataRow(Vec<Option<String>>),
    CommandComplete(String),
    EmptyQueryResponse,
    ErrorResponse { severity: &'static str, code: &'static str, message: String, position: Option<usize> },
}

fn put_cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

impl BackendMessage {
    pub fn tag(&self) -> u8 {
        match self {
            BackendMessage::AuthenticationOk | BackendMessage::AuthenticationCleartextPassword => b'R',
            BackendMessage::ParameterStatus { .. } => b'S',
            BackendMessage::BackendKeyData { .. } => b'K',
            BackendMessage::NegotiateProtocolVersion { .. } => b'v',
            BackendMessage::ReadyForQuery(_) => b'Z',
            BackendMessage::RowDescription(_) => b'T',
            BackendMessage::DataRow(_) => b'D',
            BackendMessage::CommandComplete(_) => b'C',
            BackendMessage::EmptyQueryResponse => b'I',
            BackendMessage::ErrorResponse { .. } => b'E',
        }
    }

    /// Append tag, length and payload to `buf`. On error `buf` is left as it was.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), AppError> {
        let start = buf.len();
        let res = self.encode_at(buf, start);
        if res.is_err() { buf.truncate(start); }
        res
    }

    fn encode_at(&self, buf: &mut Vec<u8>, start: usize) -> Result<(), AppError> {
        buf.push(self.tag());
        buf.extend_from_slice(&[0u8; 4]); // length, patched below
        match self {
            BackendMessage::AuthenticationOk => buf.extend_from_slice(&0i32.to_be_bytes()),
            BackendMessage::AuthenticationCleartextPassword => buf.extend_from_slice(&3i32.to_be_bytes()),
            BackendMessage::ParameterStatus { name, value } => { put_cstr(buf, name); put_cstr(buf, value); }
            BackendMessage::BackendKeyData { process_id, secret_key } => {
                buf.extend_from_slice(&process_id.to_be_bytes());
                buf.extend_from_slice(&secret_key.to_be_bytes());
            }
            BackendMessage::NegotiateProtocolVersion { newest_minor, unrecognized } => {
                buf.extend_from_slice(&newest_minor.to_be_bytes());
                buf.extend_from_slice(&(unrecognized.len() as i32).to_be_bytes());
                for opt in unrecognized { put_cstr(buf, opt); }
            }
            BackendMessage::ReadyForQuery(status) => buf.push(*status),
            BackendMessage::RowDescription(fields) => {
                buf.extend_from_slice(&field_count(fields.len())?.to_be_bytes());
                for f in fields {
                    put_cstr(buf, &f.name);
                    buf.extend_from_slice(&f.table_oid.to_be_bytes());
                    buf.extend_from_slice(&f.column_id.to_be_bytes());
                    buf.extend_from_slice(&f.type_oid.to_be_bytes());
                    buf.extend_from_slice(&f.type_len.to_be_bytes());
                    buf.extend_from_slice(&f.type_modifier.to_be_bytes());
                    buf.extend_from_slice(&f.format.to_be_bytes());
                }
            }
            BackendMessage::DataRow(cells) => {
                buf.extend_from_slice(&field_count(cells.len())?.to_be_bytes());
                for cell in cells {
                    match cell {
                        None => buf.extend_from_slice(&(-1i32).to_be_bytes()),
                        Some(s) => {
                            let len = i32::try_from(s.len())
                                .map_err(|_| AppError::program_limit(format!("field value of {} bytes is too large", s.len())))?;
                            buf.extend_from_slice(&len.to_be_bytes());
                            buf.extend_from_slice(s.as_bytes());
                        }
                    }
                }
            }
            BackendMessage::CommandComplete(tag) => put_cstr(buf, tag),
            BackendMessage::EmptyQueryResponse => {}
            BackendMessage::ErrorResponse { severity, code, message, position } => {
                buf.push(b'S'); put_cstr(buf, severity);
                buf.push(b'V'); put_cstr(buf, severity);
                buf.push(b'C'); put_cstr(buf, code);
                buf.push(b'M'); put_cstr(buf, message);
                if let Some(p) = position { buf.push(b'P'); put_cstr(buf, &p.to_string()); }
                buf.push(0);
            }
        }
        let len = i32::try_from(buf.len() - start - 1)
            .map_err(|_| AppError::program_limit(format!("{} message exceeds the protocol size limit", self.tag() as char)))?;
        buf[start + 1..start + 5].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }
}

/// Column count of a RowDescription or DataRow; the wire field is an int16.
fn field_count(n: usize) -> Result<i16, AppError> {
    i16::try_from(n).map_err(|_| AppError::program_limit(format!("{} columns do not fit in a row description", n)))
}

/// Error Reporter: the ErrorResponse for any `AppError`.
pub fn report(err: &AppError) -> BackendMessage {
    let (code, severity, message) = err.pgwire_fields();
    BackendMessage::ErrorResponse { severity, code, message, position: err.position() }
}

pub async fn send_messages<S: AsyncWrite + Unpin>(socket: &mut S, msgs: &[BackendMessage]) -> Result<()> {
    let mut buf = Vec::with_capacity(64 * msgs.len().max(1));
    for m in msgs { m.encode(&mut buf)?; }
    debug!(target: "pgwire", "sending {} message(s), {} bytes", msgs.len(), buf.len());
    socket.write_all(&buf).await?;
    Ok(())
}

pub async fn send_error_response<S: AsyncWrite + Unpin>(socket: &mut S, err: &AppError) -> Result<()> {
    let (code, severity, message) = err.pgwire_fields();
    debug!(target: "pgwire", "sending ErrorResponse severity={} code={} message='{}'", severity, code, message);
    send_messages(socket, &[report(err)]).await
}

pub async fn send_ready_with_status<S: AsyncWrite + Unpin>(socket: &mut S, status: u8) -> Result<()> {
    debug!(target: "pgwire", "sending ReadyForQuery (status='{}')", status as char);
    if crate::pgwire_server::misc::pgwire_trace_enabled() {
        crate::tprintln!("pgwire ReadyForQuery status='{}'", status as char);
    }
    send_messages(socket, &[BackendMessage::ReadyForQuery(status)]).await?;
    if let Err(e) = socket.flush().await { error!(target: "pgwire", "flush ReadyForQuery failed: {}", e); return Err(e.into()); }
    Ok(())
}

/// Deliver a fatal ErrorResponse and flush; write failures are only logged
/// since the connection is being torn down anyway.
pub async fn send_fatal<S: AsyncWrite + Unpin>(socket: &mut S, err: &AppError) {
    if let Err(e) = send_error_response(socket, err).await {
        debug!(target: "pgwire", "could not deliver fatal error: {}", e);
        return;
    }
    if let Err(e) = socket.flush().await {
        debug!(target: "pgwire", "could not flush fatal error: {}", e);
    }
}
