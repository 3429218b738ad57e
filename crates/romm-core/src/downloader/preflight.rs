//! Preflight probe: discover `Accept-Ranges` support and content length
//! before starting a transfer. Falls back to a zero-length Range GET when
//! the server rejects HEAD outright.

use crate::error::ErrorInfo;
use crate::http::{self, ConnectFn, Method, Request};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightResult {
    pub supports_ranges: bool,
    pub content_length: Option<u64>,
}

/// HEAD first; if that fails or is ambiguous, fall back to `GET
/// Range: bytes=0-0`. If both fail, the caller should fall back to the
/// catalog's declared size with ranges=false.
pub fn preflight(connect: &ConnectFn, url: &http::Url, timeout: Duration, auth: Option<(&str, &str)>) -> Result<PreflightResult, ErrorInfo> {
    let mut head_req = Request::new(Method::Head, url.clone(), timeout);
    if let Some((u, p)) = auth {
        head_req = head_req.with_basic_auth(u, p);
    }
    if let Ok(resp) = http::perform_buffered(connect, &head_req, 0) {
        if resp.headers.status_code == 200 {
            return Ok(PreflightResult {
                supports_ranges: resp.headers.accept_ranges,
                content_length: resp.headers.content_length,
            });
        }
    }

    let mut range_req = Request::new(Method::Get, url.clone(), timeout).with_range(0, Some(0));
    if let Some((u, p)) = auth {
        range_req = range_req.with_basic_auth(u, p);
    }
    let resp = http::perform_buffered(connect, &range_req, 1)?;
    if resp.headers.status_code == 206 {
        let total = resp.headers.content_range.as_ref().and_then(|cr| cr.total);
        Ok(PreflightResult { supports_ranges: true, content_length: total.or(resp.headers.content_length) })
    } else {
        Ok(PreflightResult { supports_ranges: false, content_length: resp.headers.content_length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Stream as StreamTrait;
    use std::io::{Read, Write};

    struct ScriptedStream {
        response: Vec<u8>,
        pos: usize,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = &self.response[self.pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }
    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    impl StreamTrait for ScriptedStream {
        fn set_timeouts(&mut self, _timeout: Duration) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn head_rejected_falls_back_to_range_probe() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let connect: Box<ConnectFn> = Box::new(move |_h, _p, _t| {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            let body = if n == 1 {
                b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n".to_vec()
            } else {
                b"HTTP/1.1 206 Partial Content\r\nContent-Range: bytes 0-0/100\r\n\r\nX".to_vec()
            };
            Ok(Box::new(ScriptedStream { response: body, pos: 0 }) as Box<dyn StreamTrait>)
        });
        let url = http::parse_url("http://h/f").unwrap();
        let result = preflight(&connect, &url, Duration::from_secs(5), None).unwrap();
        assert!(result.supports_ranges);
        assert_eq!(result.content_length, Some(100));
    }
}
