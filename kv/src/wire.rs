//! A thin request/response framing over `tokio::net::TcpStream` — not a
//! general HTTP implementation (Design Notes §9 calls for "a thin HTTP layer
//! returning `{method, path, query}}`", nothing more). One line holds
//! `METHOD PATH\n`, one optional `key=...&val=...` query line, a
//! `Content-Length: N\n` header, a blank line, then N body bytes.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{CResult, Error};
use crate::message::{MessageType, Request, Response};

/// Method + path + query, the boundary shape Design Notes §9 asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireRequestLine {
    pub method: String,
    pub path: String,
    pub key: Option<String>,
    pub val: Option<String>,
}

fn parse_query(query: &str) -> (Option<String>, Option<String>) {
    let mut key = None;
    let mut val = None;
    for pair in query.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            match k {
                "key" => key = Some(v.to_string()),
                "val" => val = Some(v.to_string()),
                _ => {}
            }
        }
    }
    (key, val)
}

/// Reads `METHOD /path?key=...&val=...\nContent-Length: N\n\n<body>` and maps
/// it to the kv request type per spec.md §6's verb table.
pub async fn read_request(stream: &mut BufReader<TcpStream>) -> CResult<Request> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Err(Error::InvalidRequest);
    }
    let line = line.trim_end();
    let mut parts = line.splitn(2, ' ');
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target, String::new()),
    };
    let (key, val) = parse_query(&query);
    let path = path.trim_start_matches('/').to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        let n = stream.read_line(&mut header).await?;
        if n == 0 || header.trim_end().is_empty() {
            break;
        }
        if let Some((name, value)) = header.trim_end().split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().map_err(|_| Error::InvalidRequest)?;
            }
        }
    }

    let body = if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        stream.read_exact(&mut buf).await?;
        Some(String::from_utf8(buf)?)
    } else {
        None
    };

    let kind = match (method.as_str(), path.as_str()) {
        ("GET", "") => MessageType::Index,
        ("GET", _) => MessageType::GetReq,
        ("PUT", _) => MessageType::PutReq,
        ("DELETE", _) => MessageType::DelReq,
        ("POST", "register") => MessageType::Register,
        ("POST", "commit") => MessageType::Commit,
        ("POST", "abort") => MessageType::Abort,
        _ => return Err(Error::InvalidRequest),
    };

    let key = key.or(body.clone()).unwrap_or_default();
    let val = val.or(body);
    Ok(Request::new(kind, key, val))
}

/// Writes `type: N\n\n<body>` with a `Content-Length` matching the body.
pub async fn write_response(stream: &mut TcpStream, response: &Response) -> CResult<()> {
    let body = response.body.as_bytes();
    let head = format!("{}\nContent-Length: {}\n\n", response.status_code(), body.len());
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

/// Sends a request line the way a leader speaks to a follower: method chosen
/// from the message type, path empty, key/val as query parameters.
pub async fn write_request(stream: &mut TcpStream, request: &Request) -> CResult<()> {
    let method = match request.kind {
        MessageType::GetReq => "GET",
        MessageType::PutReq => "PUT",
        MessageType::DelReq => "DELETE",
        MessageType::Register => "POST",
        MessageType::Commit => "POST",
        MessageType::Abort => "POST",
        _ => return Err(Error::InvalidRequest),
    };
    let path = match request.kind {
        MessageType::Register => "register",
        MessageType::Commit => "commit",
        MessageType::Abort => "abort",
        _ => "",
    };
    let mut query = format!("key={}", request.key);
    if let Some(val) = &request.val {
        query.push_str(&format!("&val={val}"));
    }
    let line = format!("{method} /{path}?{query}\nContent-Length: 0\n\n");
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads a status-code + body response from a peer (follower replying to the
/// leader, or leader replying to a client).
pub async fn read_response(stream: &mut BufReader<TcpStream>) -> CResult<Response> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Err(Error::Io("connection closed".to_string()));
    }
    let line = line.trim_end();
    let mut parts = line.splitn(2, ' ');
    let status: u16 = parts
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| Error::InvalidRequest)?;

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        let n = stream.read_line(&mut header).await?;
        if n == 0 || header.trim_end().is_empty() {
            break;
        }
        if let Some((name, value)) = header.trim_end().split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().map_err(|_| Error::InvalidRequest)?;
            }
        }
    }

    let mut buf = vec![0u8; content_length];
    if content_length > 0 {
        stream.read_exact(&mut buf).await?;
    }
    let body = String::from_utf8(buf)?;

    let kind = match status {
        200 => MessageType::GetResp,
        201 => MessageType::Success,
        202 => MessageType::Vote,
        204 => MessageType::Ack,
        _ => MessageType::Error,
    };
    Ok(Response::new(kind, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_val_query() {
        let (key, val) = parse_query("key=x&val=hello");
        assert_eq!(key.as_deref(), Some("x"));
        assert_eq!(val.as_deref(), Some("hello"));
    }
}
