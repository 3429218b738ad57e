//! Status-line and header-block parsing.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeaders {
    pub status_code: u16,
    pub status_text: String,
    pub content_length: Option<u64>,
    pub chunked: bool,
    pub accept_ranges: bool,
    pub connection_close: bool,
    pub location: Option<String>,
    pub content_range: Option<ContentRange>,
    pub raw_headers: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderParseError {
    #[error("parse: missing CRLFCRLF header terminator")]
    Unterminated,
    #[error("parse: malformed status line")]
    MalformedStatusLine,
    #[error("parse: conflicting content-length values")]
    ConflictingContentLength,
}

/// Parse a raw header block (status line + header lines, CRLF-separated,
/// terminated by the blank line already stripped by the caller).
pub fn parse_headers(block: &str) -> Result<ParsedHeaders, HeaderParseError> {
    let mut lines = block.split("\r\n");
    let status_line = lines.next().ok_or(HeaderParseError::MalformedStatusLine)?;

    let mut parts = status_line.splitn(3, ' ');
    let _http_version = parts.next().ok_or(HeaderParseError::MalformedStatusLine)?;
    let status_code: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(HeaderParseError::MalformedStatusLine)?;
    let status_text = parts.next().unwrap_or("").to_string();

    let mut raw_headers: HashMap<String, String> = HashMap::new();
    let mut content_length: Option<u64> = None;
    let mut chunked = false;
    let mut accept_ranges = false;
    let mut connection_close = false;
    let mut location = None;
    let mut content_range = None;

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(HeaderParseError::MalformedStatusLine)?;
        let name_lower = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();

        match name_lower.as_str() {
            "content-length" => {
                let v: u64 = value.parse().map_err(|_| HeaderParseError::MalformedStatusLine)?;
                if let Some(existing) = content_length {
                    if existing != v {
                        return Err(HeaderParseError::ConflictingContentLength);
                    }
                }
                content_length = Some(v);
            }
            "transfer-encoding" => {
                if value.to_ascii_lowercase().contains("chunked") {
                    chunked = true;
                }
            }
            "accept-ranges" => {
                if value.to_ascii_lowercase().contains("bytes") {
                    accept_ranges = true;
                }
            }
            "connection" => {
                if value.eq_ignore_ascii_case("close") {
                    connection_close = true;
                }
            }
            "location" => location = Some(value.clone()),
            "content-range" => content_range = parse_content_range(&value),
            _ => {}
        }
        raw_headers.insert(name_lower, value);
    }

    Ok(ParsedHeaders {
        status_code,
        status_text,
        content_length,
        chunked,
        accept_ranges,
        connection_close,
        location,
        content_range,
        raw_headers,
    })
}

fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    let total = if total == "*" { None } else { total.parse().ok() };
    Some(ContentRange { start, end, total })
}
