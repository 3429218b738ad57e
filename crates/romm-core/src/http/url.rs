//! Minimal HTTP(S) URL parser.
//!
//! Hand-rolled rather than pulled from the `url` crate: the client only
//! ever needs scheme/host/port/path/query, and the parsing rules here
//! (explicit empty port normalizes to the scheme default, missing path
//! normalizes to `/`) are specific enough to this client that a general
//! parser would need its output reshaped anyway.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub https: bool,
    pub host: String,
    pub port: u16,
    pub path_and_query: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UrlParseError {
    #[error("parse: unsupported scheme")]
    UnsupportedScheme,
    #[error("parse: missing host")]
    MissingHost,
    #[error("parse: invalid port")]
    InvalidPort,
}

pub fn parse(raw: &str) -> Result<Url, UrlParseError> {
    let (https, rest) = if let Some(rest) = raw.strip_prefix("http://") {
        (false, rest)
    } else if let Some(rest) = raw.strip_prefix("https://") {
        (true, rest)
    } else {
        return Err(UrlParseError::UnsupportedScheme);
    };

    let (authority, path_and_query) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(UrlParseError::MissingHost);
    }

    let (host, port_str) = match authority.rsplit_once(':') {
        Some((h, p)) if !h.is_empty() => (h, Some(p)),
        _ => (authority, None),
    };
    if host.is_empty() {
        return Err(UrlParseError::MissingHost);
    }

    let default_port = if https { 443 } else { 80 };
    let port = match port_str {
        None | Some("") => default_port,
        Some(p) => p.parse::<u16>().map_err(|_| UrlParseError::InvalidPort)?,
    };

    let path_and_query = if path_and_query.is_empty() { "/".to_string() } else { path_and_query.to_string() };

    Ok(Url { https, host: host.to_string(), port, path_and_query })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host() {
        let u = parse("http://h").unwrap();
        assert_eq!(u.host, "h");
        assert_eq!(u.port, 80);
        assert_eq!(u.path_and_query, "/");
    }

    #[test]
    fn parses_explicit_default_port() {
        let u = parse("http://h:80").unwrap();
        assert_eq!(u.port, 80);
    }

    #[test]
    fn parses_trailing_slash() {
        let u = parse("http://h/").unwrap();
        assert_eq!(u.path_and_query, "/");
    }

    #[test]
    fn parses_port_and_query() {
        let u = parse("http://h:8080/p?x=1").unwrap();
        assert_eq!(u.port, 8080);
        assert_eq!(u.path_and_query, "/p?x=1");
    }

    #[test]
    fn rejects_missing_host() {
        assert_eq!(parse("http://"), Err(UrlParseError::MissingHost));
        assert_eq!(parse("http://:80"), Err(UrlParseError::MissingHost));
    }

    #[test]
    fn explicit_empty_port_normalizes_to_default() {
        let u = parse("http://h:/p").unwrap();
        assert_eq!(u.port, 80);
    }

    #[test]
    fn https_uses_443_default() {
        let u = parse("https://h").unwrap();
        assert_eq!(u.port, 443);
        assert!(u.https);
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert_eq!(parse("ftp://h"), Err(UrlParseError::UnsupportedScheme));
    }
}
