//! Hand-rolled HTTP/1.1 client.

pub mod chunked;
pub mod client;
pub mod headers;
pub mod pool;
pub mod url;

pub use client::{perform_buffered, perform_streamed, parse_url, BufferedResponse, Method, Request};
pub use headers::ParsedHeaders;
pub use pool::{default_connect, ConnectFn, Stream};
pub use url::Url;
