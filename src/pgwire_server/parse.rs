use crate::error::{AppError, AppResult};
use crate::pgwire_server::misc::*;

/// First packet of a connection, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum StartupRequest {
    Ssl,
    GssEnc,
    Cancel { process_id: i32, secret_key: i32 },
    Startup { major: u16, minor: u16, params: Vec<(String, String)> },
}

/// Decode the body of an untagged startup-phase packet (length word stripped).
pub fn parse_startup_packet(body: &[u8]) -> AppResult<StartupRequest> {
    if body.len() < 4 {
        return Err(AppError::startup("08P01", "invalid length of startup packet"));
    }
    let code = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    match code {
        SSL_REQUEST_CODE if body.len() == 4 => Ok(StartupRequest::Ssl),
        GSSENC_REQUEST_CODE if body.len() == 4 => Ok(StartupRequest::GssEnc),
        CANCEL_REQUEST_CODE if body.len() == 12 => Ok(StartupRequest::Cancel {
            process_id: i32::from_be_bytes([body[4], body[5], body[6], body[7]]),
            secret_key: i32::from_be_bytes([body[8], body[9], body[10], body[11]]),
        }),
        SSL_REQUEST_CODE | GSSENC_REQUEST_CODE | CANCEL_REQUEST_CODE => {
            Err(AppError::startup("08P01", "invalid length of startup packet"))
        }
        _ => {
            let major = (code >> 16) as u16;
            let minor = (code & 0xFFFF) as u16;
            if major != 3 {
                return Err(AppError::startup("0A000", format!(
                    "unsupported frontend protocol {}.{}: server supports 3.0 to 3.0", major, minor)));
            }
            let params = parse_startup_params(&body[4..])?;
            Ok(StartupRequest::Startup { major, minor, params })
        }
    }
}

/// NUL-terminated key/value pairs closed by an empty key.
pub fn parse_startup_params(kv: &[u8]) -> AppResult<Vec<(String, String)>> {
    let invalid = || AppError::startup("08P01", "invalid startup packet layout: expected terminator as last byte");
    if kv.last() != Some(&0) { return Err(invalid()); }
    let body = &kv[..kv.len() - 1];
    let parts: Vec<&[u8]> = if body.is_empty() {
        Vec::new()
    } else {
        if body.last() != Some(&0) { return Err(invalid()); }
        body[..body.len() - 1].split(|b| *b == 0).collect()
    };
    if parts.len() % 2 != 0 { return Err(invalid()); }
    let mut out = Vec::with_capacity(parts.len() / 2);
    for pair in parts.chunks(2) {
        let k = std::str::from_utf8(pair[0]).map_err(|_| AppError::startup("08P01", "invalid UTF-8 in startup packet"))?;
        let v = std::str::from_utf8(pair[1]).map_err(|_| AppError::startup("08P01", "invalid UTF-8 in startup packet"))?;
        if k.is_empty() { return Err(invalid()); }
        out.push((k.to_string(), v.to_string()));
    }
    Ok(out)
}

/// Startup options prefixed `_pq_.` are protocol extensions we do not implement.
pub fn unrecognized_protocol_options(params: &[(String, String)]) -> Vec<String> {
    params.iter().filter(|(k, _)| k.starts_with("_pq_.")).map(|(k, _)| k.clone()).collect()
}

pub fn is_utf8_encoding_name(v: &str) -> bool {
    let norm: String = v.chars().filter(|c| *c != '-' && *c != '_').collect::<String>().to_ascii_uppercase();
    norm == "UTF8" || norm == "UNICODE"
}

/// SQL text of a simple-query (`Q`) payload: exactly one terminating NUL, valid UTF-8.
pub fn decode_query_text(payload: &[u8]) -> AppResult<String> {
    let nul = payload.iter().position(|b| *b == 0)
        .ok_or_else(|| AppError::malformed("invalid Query message: missing string terminator"))?;
    if nul + 1 != payload.len() {
        return Err(AppError::malformed("invalid Query message: unexpected data after string terminator"));
    }
    String::from_utf8(payload[..nul].to_vec())
        .map_err(|e| AppError::invalid_text(format!("invalid byte sequence for encoding \"UTF8\" at offset {}", e.utf8_error().valid_up_to())))
}

/// Cleartext password of a `p` payload. A missing terminator is tolerated.
pub fn decode_password(payload: &[u8]) -> String {
    let end = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}
