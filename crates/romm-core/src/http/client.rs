//! HTTP/1.1 request/response transactions.

use crate::error::{classify, ErrorCategory, ErrorInfo};
use crate::http::chunked;
use crate::http::headers::{self, ParsedHeaders};
use crate::http::pool::{self, ConnKey, ConnectFn, Stream};
use crate::http::url::{self, Url};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

#[derive(Clone, Copy)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Caller headers appended verbatim after Host/Connection.
    pub headers: Vec<(String, String)>,
    pub keep_alive: bool,
    pub timeout: Duration,
}

impl Request {
    pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
        Request { method, url, headers: Vec::new(), keep_alive: true, timeout }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        let token = base64_encode(format!("{username}:{password}").as_bytes());
        self.with_header("Authorization", &format!("Basic {token}"))
    }

    pub fn with_range(self, start: u64, end: Option<u64>) -> Self {
        let value = match end {
            Some(e) => format!("bytes={start}-{e}"),
            None => format!("bytes={start}-"),
        };
        self.with_header("Range", &value)
    }

    fn conn_key(&self) -> ConnKey {
        ConnKey { host: self.url.host.clone(), port: self.url.port, timeout: self.timeout }
    }

    fn framed(&self) -> Vec<u8> {
        let mut out = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: {}\r\n",
            self.method.as_str(),
            self.url.path_and_query,
            self.url.host,
            if self.keep_alive { "keep-alive" } else { "close" },
        );
        for (name, value) in &self.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

pub struct BufferedResponse {
    pub headers: ParsedHeaders,
    pub body: Vec<u8>,
}

fn send_all(stream: &mut dyn Stream, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "send failed: write returned 0")),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn to_error(detail: impl std::fmt::Display, hint: Option<ErrorCategory>) -> ErrorInfo {
    classify(&detail.to_string(), hint, None)
}

fn open_connection(connect: &ConnectFn, req: &Request) -> Result<Box<dyn Stream>, ErrorInfo> {
    if let Some(s) = pool::take(&req.conn_key()) {
        return Ok(s);
    }
    connect(&req.url.host, req.url.port, req.timeout).map_err(|e| to_error(format!("connect failed: {e}"), Some(ErrorCategory::Network)))
}

/// Read until the header block's terminating CRLFCRLF is seen, returning
/// the header bytes (without the terminator) and any body bytes already
/// buffered past it.
fn read_header_block(stream: &mut dyn Stream) -> Result<(String, Vec<u8>), ErrorInfo> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(pos) = find_header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let rest = buf[pos + 4..].to_vec();
            return Ok((head, rest));
        }
        let n = stream
            .read(&mut chunk)
            .map_err(|e| to_error(format!("recv failed: {e}"), Some(ErrorCategory::Network)))?;
        if n == 0 {
            return Err(to_error("recv failed: connection closed before headers completed", Some(ErrorCategory::Network)));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn read_exact_n(stream: &mut dyn Stream, already: &[u8], need: usize) -> Result<Vec<u8>, ErrorInfo> {
    let mut out = already.to_vec();
    let mut chunk = [0u8; 65536];
    while out.len() < need {
        let n = stream
            .read(&mut chunk)
            .map_err(|e| to_error(format!("recv failed: {e}"), Some(ErrorCategory::Network)))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    out.truncate(need.min(out.len()));
    Ok(out)
}

fn read_to_eof(stream: &mut dyn Stream, already: &[u8], max_body_bytes: usize) -> Result<Vec<u8>, ErrorInfo> {
    let mut out = already.to_vec();
    let mut chunk = [0u8; 65536];
    loop {
        if out.len() >= max_body_bytes {
            break;
        }
        let n = stream
            .read(&mut chunk)
            .map_err(|e| to_error(format!("recv failed: {e}"), Some(ErrorCategory::Network)))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || (500..600).contains(&status)
}

const BACKOFF: [Duration; 2] = [Duration::from_millis(250), Duration::from_secs(1)];

/// Buffered transaction: reads the complete body (chunked-decoded if
/// applicable), bounded by `max_body_bytes`. Retries transport failures
/// and retryable HTTP statuses up to three attempts total.
pub fn perform_buffered(connect: &ConnectFn, req: &Request, max_body_bytes: usize) -> Result<BufferedResponse, ErrorInfo> {
    let mut last_err = None;
    for attempt in 0..3 {
        if attempt > 0 {
            std::thread::sleep(BACKOFF[(attempt - 1).min(BACKOFF.len() - 1)]);
        }
        match perform_buffered_once(connect, req, max_body_bytes) {
            Ok(resp) => {
                if should_retry_status(resp.headers.status_code) {
                    last_err = Some(classify("retryable http status", None, Some(resp.headers.status_code)));
                    continue;
                }
                return Ok(resp);
            }
            Err(e) if e.retryable => {
                last_err = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| classify("internal: retry loop exhausted without error", None, None)))
}

fn perform_buffered_once(connect: &ConnectFn, req: &Request, max_body_bytes: usize) -> Result<BufferedResponse, ErrorInfo> {
    let key = req.conn_key();
    let mut stream = open_connection(connect, req)?;
    let framed = req.framed();
    if send_all(stream.as_mut(), &framed).is_err() {
        pool::clear();
        stream = connect(&req.url.host, req.url.port, req.timeout).map_err(|e| to_error(format!("connect failed: {e}"), Some(ErrorCategory::Network)))?;
        send_all(stream.as_mut(), &framed).map_err(|e| to_error(format!("send failed: {e}"), Some(ErrorCategory::Network)))?;
    }

    let (head, rest) = read_header_block(stream.as_mut())?;
    let parsed = headers::parse_headers(&head).map_err(|e| to_error(format!("parse: {e}"), Some(ErrorCategory::Parse)))?;

    let body = if parsed.chunked {
        let full = read_to_eof(stream.as_mut(), &rest, max_body_bytes.max(rest.len()) + 1)?;
        chunked::decode(&full).map_err(|e| to_error(format!("parse: {e}"), Some(ErrorCategory::Parse)))?
    } else if let Some(len) = parsed.content_length {
        let want = (len as usize).min(max_body_bytes);
        read_exact_n(stream.as_mut(), &rest, want)?
    } else {
        read_to_eof(stream.as_mut(), &rest, max_body_bytes)?
    };

    if !parsed.connection_close && !parsed.chunked {
        pool::put(key, stream);
    } else {
        pool::clear();
    }

    Ok(BufferedResponse { headers: parsed, body })
}

const MAX_REDIRECTS: u8 = 5;

/// Streamed transaction: delivers body bytes to `sink`, which returns
/// `true` to continue receiving or `false` to stop early. Chunked
/// responses are rejected — the storage writer is the length authority.
///
/// `follow_redirects` is an explicit opt-in: when set, a 3xx response with
/// a `Location` header is followed instead of returned to the caller.
/// Crossing to a different host on a hop drops the `Authorization` header
/// — credentials never follow a redirect off the original host.
pub fn perform_streamed(
    connect: &ConnectFn,
    req: &Request,
    follow_redirects: bool,
    mut sink: impl FnMut(&[u8]) -> bool,
) -> Result<ParsedHeaders, ErrorInfo> {
    let original_host = req.url.host.clone();
    let mut url = req.url.clone();
    let mut headers = req.headers.clone();

    for _ in 0..=MAX_REDIRECTS {
        if url.host != original_host {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        }
        let attempt = Request { method: req.method, url: url.clone(), headers: headers.clone(), keep_alive: req.keep_alive, timeout: req.timeout };

        let mut stream = open_connection(connect, &attempt)?;
        let framed = attempt.framed();
        send_all(stream.as_mut(), &framed).map_err(|e| to_error(format!("send failed: {e}"), Some(ErrorCategory::Network)))?;

        let (head, mut rest) = read_header_block(stream.as_mut())?;
        let parsed = headers::parse_headers(&head).map_err(|e| to_error(format!("parse: {e}"), Some(ErrorCategory::Parse)))?;

        if follow_redirects && matches!(parsed.status_code, 301 | 302 | 303 | 307 | 308) {
            pool::clear();
            let location = parsed
                .location
                .as_deref()
                .ok_or_else(|| to_error("parse: redirect missing Location header", Some(ErrorCategory::Parse)))?;
            url = url::parse(location).map_err(|e| to_error(format!("parse: redirect location invalid: {e}"), Some(ErrorCategory::Parse)))?;
            continue;
        }

        if parsed.chunked {
            return Err(to_error("chunked transfer not supported in streamed mode", Some(ErrorCategory::Unsupported)));
        }

        let want = parsed.content_length;
        let mut delivered = 0u64;
        loop {
            if let Some(total) = want {
                if delivered >= total {
                    break;
                }
            }
            if !rest.is_empty() {
                delivered += rest.len() as u64;
                if !sink(&rest) {
                    pool::clear();
                    return Ok(parsed);
                }
                rest.clear();
                continue;
            }
            let mut chunk = [0u8; 262_144];
            let n = stream
                .read(&mut chunk)
                .map_err(|e| to_error(format!("recv failed: {e}"), Some(ErrorCategory::Network)))?;
            if n == 0 {
                break;
            }
            delivered += n as u64;
            if !sink(&chunk[..n]) {
                pool::clear();
                return Ok(parsed);
            }
        }

        if let Some(total) = want {
            if delivered < total {
                return Err(to_error("short read: body delivered fewer bytes than content-length", Some(ErrorCategory::Network)));
            }
        }

        if parsed.connection_close {
            pool::clear();
        } else {
            pool::put(attempt.conn_key(), stream);
        }

        return Ok(parsed);
    }

    Err(to_error("too many redirects", Some(ErrorCategory::Unsupported)))
}

fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        out.push(match b1 {
            Some(b1) => ALPHABET[(((b1 & 0x0f) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char,
            None => '=',
        });
        out.push(match b2 {
            Some(b2) => ALPHABET[(b2 & 0x3f) as usize] as char,
            None => '=',
        });
    }
    out
}

/// Parse a URL string using the module's hand-rolled parser. Convenience
/// wrapper so callers don't need to import `http::url` directly.
pub fn parse_url(raw: &str) -> Result<Url, url::UrlParseError> {
    url::parse(raw)
}
