//! The listener and its lifecycle.
//!
//! Connections are served **one at a time**: the accept loop awaits each
//! connection to completion before accepting the next, and keep-alive is
//! off, so one connection carries exactly one request. A client that opens a
//! connection and sends nothing is cut off by the header read timeout; a
//! client that stalls mid-body gets `408` after the body timeout.
//!
//! Lifecycle:
//! 1. [`Server::bind`] claims the port. Failure here is fatal to the caller.
//! 2. [`Server::serve`] spawns the accept loop and returns a [`ServerHandle`].
//! 3. [`ServerHandle::shutdown`] stops accepting, lets the in-flight
//!    connection finish, and returns once the loop has exited.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, field, info, info_span, warn};

use crate::config::Config;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::{Route, Router};
use crate::status::Status;
use crate::upload::UploadError;

/// Per-connection limits, copied out of [`Config`] at bind time.
#[derive(Debug, Clone)]
struct Limits {
    header_timeout: Duration,
    body_timeout: Duration,
    max_body_bytes: Option<u64>,
}

/// A bound, not yet serving, HTTP server.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    limits: Limits,
}

impl Server {
    /// Binds the listening socket described by `config`.
    pub async fn bind(config: &Config) -> Result<Self, Error> {
        let requested = config.addr();
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| Error::Bind { addr: requested, source })?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            limits: Limits {
                header_timeout: config.header_timeout(),
                body_timeout: config.body_timeout(),
                max_body_bytes: config.max_body_bytes,
            },
        })
    }

    /// The address actually bound. Differs from the configured one when the
    /// configured port was `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts the accept loop on the current tokio runtime.
    pub fn serve(self, router: Router) -> ServerHandle {
        let (stop, stopped) = oneshot::channel();
        let addr = self.addr;
        info!(%addr, "stash listening");
        let task = tokio::spawn(accept_loop(self.listener, Arc::new(router), self.limits, stopped));
        ServerHandle { addr, stop, task }
    }
}

/// A handle to a running [`Server`].
///
/// Dropping the handle stops the server after the in-flight connection.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), Error>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    pub async fn shutdown(self) -> Result<(), Error> {
        // The loop may already be gone; then there is nothing to stop.
        let _ = self.stop.send(());
        self.task.await?
    }

    /// Runs until `signal` resolves, then shuts down.
    pub async fn shutdown_on<F>(self, signal: F) -> Result<(), Error>
    where
        F: std::future::Future<Output = ()>,
    {
        signal.await;
        info!("shutdown signal received, finishing in-flight request");
        self.shutdown().await
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    limits: Limits,
    mut stopped: oneshot::Receiver<()>,
) -> Result<(), Error> {
    let mut failures = 0u32;
    loop {
        let (stream, peer) = tokio::select! {
            // Check the stop signal first so a pending shutdown wins over
            // queued connections.
            biased;

            _ = &mut stopped => break,

            res = listener.accept() => match res {
                Ok(v) => v,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    error!(failures, pause_ms = pause.as_millis() as u64, "accept error: {e}");
                    // Errors like EMFILE persist until a descriptor frees up;
                    // retrying at once would spin. Shutdown still interrupts.
                    tokio::select! {
                        biased;
                        _ = &mut stopped => break,
                        _ = tokio::time::sleep(pause) => continue,
                    }
                }
            },
        };
        failures = 0;

        serve_connection(stream, peer, Arc::clone(&router), &limits).await;
    }

    info!("stash stopped");
    Ok(())
}

/// Pause after the `failures`-th consecutive accept error: 10ms doubling per
/// failure, capped at one second.
fn accept_backoff(failures: u32) -> Duration {
    const BASE: Duration = Duration::from_millis(10);
    const MAX: Duration = Duration::from_secs(1);
    let exp = failures.saturating_sub(1).min(16);
    BASE.saturating_mul(1 << exp).min(MAX)
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Arc<Router>, limits: &Limits) {
    let io = TokioIo::new(stream);
    let body_limits = limits.clone();
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        let limits = body_limits.clone();
        async move { Ok::<_, Infallible>(dispatch(&router, &limits, req).await) }
    });

    let mut conn = http1::Builder::new();
    conn.keep_alive(false)
        .half_close(true)
        .timer(TokioTimer::new())
        .header_read_timeout(limits.header_timeout);

    if let Err(e) = conn.serve_connection(io, svc).await {
        warn!(%peer, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure is turned
/// into a status code here, so hyper never sees an error.
async fn dispatch(
    router: &Router,
    limits: &Limits,
    req: hyper::Request<Incoming>,
) -> http::Response<Full<Bytes>> {
    let started = Instant::now();
    let span = info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        status = field::Empty,
        latency_ms = field::Empty,
    );

    async move {
        let method = Method::try_from(req.method()).ok();
        let response = match router.lookup(method, req.uri().path()) {
            Route::Found(handler, params) => {
                let (parts, body) = req.into_parts();
                match read_body(body, limits).await {
                    Ok(body) => handler.call(Request::new(parts, body, params)).await,
                    Err(e) => e.into_response(),
                }
            }
            Route::MethodNotAllowed => Response::status(Status::MethodNotAllowed),
            Route::NotFound => Response::status(Status::NotFound),
        };

        let span = tracing::Span::current();
        span.record("status", response.status_code().code());
        span.record("latency_ms", started.elapsed().as_millis() as u64);
        info!("request completed");
        response.into_inner()
    }
    .instrument(span)
    .await
}

/// Buffers the request body, bounded by the configured size and time limits.
async fn read_body(body: Incoming, limits: &Limits) -> Result<Bytes, UploadError> {
    let collect = async {
        match limits.max_body_bytes {
            Some(limit) => {
                let cap = usize::try_from(limit).unwrap_or(usize::MAX);
                Limited::new(body, cap)
                    .collect()
                    .await
                    .map(|collected| collected.to_bytes())
                    .map_err(|e| {
                        if e.downcast_ref::<LengthLimitError>().is_some() {
                            UploadError::BodyTooLarge { limit }
                        } else {
                            UploadError::IncompleteBody
                        }
                    })
            }
            None => body
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(|_| UploadError::IncompleteBody),
        }
    };

    tokio::time::timeout(limits.body_timeout, collect)
        .await
        .map_err(|_| UploadError::BodyTimeout)?
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves, so on non-Unix platforms the SIGTERM arm
    // is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
