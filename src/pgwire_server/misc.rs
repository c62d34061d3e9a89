use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use std::sync::atomic::AtomicU64;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::AppError;
use crate::pgwire_server::structs::Frame;

pub const PROTOCOL_VERSION_3: u32 = 196608; // 3.0
pub const SSL_REQUEST_CODE: u32 = 80877103;
pub const GSSENC_REQUEST_CODE: u32 = 80877104;
pub const CANCEL_REQUEST_CODE: u32 = 80877102;

/// Startup packets (length word included) must fall inside this range.
pub const MIN_STARTUP_LEN: usize = 8;
pub const MAX_STARTUP_LEN: usize = 10_000;

pub static CONN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

static PGWIRE_TRACE: Lazy<bool> = Lazy::new(|| {
    std::env::var("TAGWIRE_PGWIRE_TRACE").map(|v| {
        let s = v.to_lowercase();
        s == "1" || s == "true" || s == "yes" || s == "on"
    }).unwrap_or(false)
});

pub fn pgwire_trace_enabled() -> bool { *PGWIRE_TRACE }

pub fn hex_dump_prefix(data: &[u8], max: usize) -> String {
    let take = data.len().min(max);
    data.iter().take(take).map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

pub async fn read_u32<S: AsyncRead + Unpin>(socket: &mut S) -> Result<u32> {
    let mut b = [0u8; 4]; socket.read_exact(&mut b).await?; Ok(u32::from_be_bytes(b))
}

/// Read one byte, or `None` on a clean EOF.
async fn read_tag<S: AsyncRead + Unpin>(socket: &mut S) -> Result<Option<u8>> {
    let mut tag = [0u8; 1];
    let n = socket.read(&mut tag).await?;
    if n == 0 { Ok(None) } else { Ok(Some(tag[0])) }
}

/// Untagged startup-phase packet: returns the body after the length word, or
/// `None` when the peer closed before sending anything.
pub async fn read_startup_packet<S: AsyncRead + Unpin>(socket: &mut S) -> Result<Option<Vec<u8>>> {
    let first = match read_tag(socket).await? {
        Some(b) => b,
        None => return Ok(None),
    };
    let mut rest = [0u8; 3];
    socket.read_exact(&mut rest).await?;
    let len = u32::from_be_bytes([first, rest[0], rest[1], rest[2]]) as usize;
    if !(MIN_STARTUP_LEN..=MAX_STARTUP_LEN).contains(&len) {
        return Err(AppError::framing(format!("invalid length of startup packet: {}", len)).into());
    }
    let mut body = vec![0u8; len - 4];
    socket.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Tagged message. The length is validated against `max_len` before the
/// payload buffer is allocated. `None` on a clean EOF between messages.
pub async fn read_frame<S: AsyncRead + Unpin>(socket: &mut S, max_len: usize) -> Result<Option<Frame>> {
    let tag = match read_tag(socket).await? {
        Some(t) => t,
        None => return Ok(None),
    };
    let len = read_u32(socket).await
        .map_err(|e| anyhow!("reading length of message '{}': {}", tag as char, e))? as usize;
    if len < 4 {
        return Err(AppError::framing(format!("invalid message length {} for message type \"{}\"", len, tag as char)).into());
    }
    if len - 4 > max_len {
        return Err(AppError::framing(format!("message of type \"{}\" is {} bytes; limit is {}", tag as char, len, max_len)).into());
    }
    let mut payload = vec![0u8; len - 4];
    socket.read_exact(&mut payload).await?;
    Ok(Some(Frame { tag, payload }))
}

/// Random cancellation secret for BackendKeyData.
pub fn random_secret_key() -> Result<i32> {
    let mut b = [0u8; 4];
    getrandom::getrandom(&mut b).map_err(|e| anyhow!(e.to_string()))?;
    Ok(i32::from_be_bytes(b))
}

/// Human name of a frontend message tag, for logs and error text.
pub fn frontend_message_name(tag: u8) -> &'static str {
    match tag {
        b'Q' => "Query",
        b'P' => "Parse",
        b'B' => "Bind",
        b'D' => "Describe",
        b'E' => "Execute",
        b'S' => "Sync",
        b'C' => "Close",
        b'H' => "Flush",
        b'd' => "CopyData",
        b'c' => "CopyDone",
        b'f' => "CopyFail",
        b'F' => "FunctionCall",
        b'p' => "PasswordMessage",
        b'X' => "Terminate",
        _ => "unknown",
    }
}
