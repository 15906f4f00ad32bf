//! Server-level error type.

use std::net::SocketAddr;

/// The error type returned by stash's server API.
///
/// Request-level failures (bad headers, failed writes) are answered as HTTP
/// responses via [`UploadError`](crate::UploadError), never surfaced here.
/// This type covers the listener: binding the port and running the accept
/// loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
