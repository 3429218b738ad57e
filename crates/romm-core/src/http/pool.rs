//! Thread-local keep-alive connection.
//!
//! One connection per calling thread, keyed by (host, port, timeout). No
//! socket ever crosses a thread boundary.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnKey {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

/// A connect function: given host/port/timeout, produce a byte stream.
/// Lets a host platform substitute a TLS-tunneling stream for mirrors
/// without this crate depending on any TLS implementation.
pub type ConnectFn = dyn Fn(&str, u16, Duration) -> std::io::Result<Box<dyn Stream>> + Send + Sync;

/// A bidirectional byte stream usable as an HTTP transport.
pub trait Stream: Read + Write + Send {
    fn set_timeouts(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl Stream for TcpStream {
    fn set_timeouts(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))?;
        Ok(())
    }
}

pub fn default_connect(host: &str, port: u16, timeout: Duration) -> std::io::Result<Box<dyn Stream>> {
    let stream = TcpStream::connect((host, port))?;
    let mut stream = stream;
    stream.set_timeouts(timeout)?;
    Ok(Box::new(stream))
}

struct PooledConn {
    key: ConnKey,
    stream: Box<dyn Stream>,
}

thread_local! {
    static POOL: RefCell<Option<PooledConn>> = const { RefCell::new(None) };
}

/// Take a pooled connection matching `key`, if one exists; otherwise the
/// caller should open a fresh one.
pub fn take(key: &ConnKey) -> Option<Box<dyn Stream>> {
    POOL.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.as_ref().map(|c| &c.key) == Some(key) {
            slot.take().map(|c| c.stream)
        } else {
            None
        }
    })
}

/// Store `stream` for reuse by a later request on this thread with the
/// same key. Call this only when the response did not declare
/// `Connection: close`, was not chunked, and had no I/O error.
pub fn put(key: ConnKey, stream: Box<dyn Stream>) {
    POOL.with(|cell| {
        *cell.borrow_mut() = Some(PooledConn { key, stream });
    });
}

/// Drop any pooled connection for the current thread, regardless of key.
pub fn clear() {
    POOL.with(|cell| {
        *cell.borrow_mut() = None;
    });
}
