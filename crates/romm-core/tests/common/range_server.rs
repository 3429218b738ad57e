//! Hand-rolled HTTP/1.1 test server: manual method/Range parsing, manual
//! 200/206/416/405 response construction, raw-socket style to match the
//! client under test.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// The client preflight probe (HEAD, or a 0-byte Range GET) always lands on
/// its own connection before the real transfer starts, so `short_read_once`
/// cannot key off connection-accept order. Every response below also
/// declares `Connection: close` — this server never actually keeps a
/// connection alive past one response, so claiming keep-alive would just
/// race the client's pooled-connection reuse against this thread closing
/// the socket.

pub struct Behavior {
    /// If `true`, the first GET response is truncated to `short_read_bytes`
    /// and the connection is closed early; later requests serve normally.
    pub short_read_once: bool,
    pub short_read_bytes: usize,
    pub supports_ranges: bool,
    /// If set, the first GET is answered with a 301 to this absolute URL
    /// instead of the body; later requests serve normally.
    pub redirect_once: Option<String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior { short_read_once: false, short_read_bytes: 0, supports_ranges: true, redirect_once: None }
    }
}

pub struct TestServer {
    pub port: u16,
    /// The `Authorization` header value (if any) seen on each GET/HEAD
    /// request this server has handled, in arrival order.
    pub auth_log: Arc<Mutex<Vec<Option<String>>>>,
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    pub fn start(body: Vec<u8>, behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let port = listener.local_addr().unwrap().port();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let get_count = Arc::new(AtomicUsize::new(0));
        let redirected = Arc::new(AtomicBool::new(false));
        let auth_log = Arc::new(Mutex::new(Vec::new()));
        let worker_auth_log = Arc::clone(&auth_log);

        let handle = std::thread::spawn(move || {
            while !worker_stop.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        handle_connection(stream, &body, &behavior, &get_count, &redirected, &worker_auth_log);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(std::time::Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        TestServer { port, auth_log, stop, handle: Some(handle) }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn handle_connection(
    mut stream: TcpStream,
    body: &[u8],
    behavior: &Behavior,
    get_count: &AtomicUsize,
    redirected: &AtomicBool,
    auth_log: &Mutex<Vec<Option<String>>>,
) {
    stream.set_read_timeout(Some(std::time::Duration::from_secs(2))).ok();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => return,
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let first_line = request.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_string();

    let range = request
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("range:"))
        .and_then(|l| l.split_once(':').map(|(_, v)| v.trim().to_string()));

    let auth_header = request
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("authorization:"))
        .and_then(|l| l.split_once(':').map(|(_, v)| v.trim().to_string()));
    auth_log.lock().unwrap().push(auth_header);

    if method == "GET" {
        if let Some(location) = behavior.redirect_once.as_ref() {
            if !redirected.swap(true, Ordering::SeqCst) {
                let resp = format!("HTTP/1.1 301 Moved Permanently\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = stream.write_all(resp.as_bytes());
                return;
            }
        }
    }

    if method == "HEAD" {
        let mut resp = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n", body.len());
        if behavior.supports_ranges {
            resp.push_str("Accept-Ranges: bytes\r\n");
        }
        resp.push_str("\r\n");
        let _ = stream.write_all(resp.as_bytes());
        return;
    }

    if let Some(range_value) = range.filter(|_| behavior.supports_ranges) {
        if let Some((start, end)) = parse_range(&range_value, body.len()) {
            if start >= body.len() as u64 {
                let resp = "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
                let _ = stream.write_all(resp.as_bytes());
                return;
            }
            let slice = &body[start as usize..=end as usize];
            let header = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
                slice.len(),
                start,
                end,
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(slice);
            return;
        }
        let resp = "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let _ = stream.write_all(resp.as_bytes());
        return;
    }

    if method != "GET" {
        let resp = "HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let _ = stream.write_all(resp.as_bytes());
        return;
    }

    let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
    let _ = stream.write_all(header.as_bytes());

    let this_get = get_count.fetch_add(1, Ordering::SeqCst);
    if behavior.short_read_once && this_get == 0 {
        let _ = stream.write_all(&body[..behavior.short_read_bytes.min(body.len())]);
        // Drop the connection early: the client must observe a short read.
        return;
    }
    let _ = stream.write_all(body);
}

fn parse_range(value: &str, total_len: usize) -> Option<(u64, u64)> {
    let rest = value.strip_prefix("bytes=")?;
    let (start_str, end_str) = rest.split_once('-')?;
    let start: u64 = start_str.parse().ok()?;
    let end: u64 = if end_str.is_empty() { total_len as u64 - 1 } else { end_str.parse().ok()? };
    Some((start, end.min(total_len as u64 - 1)))
}
