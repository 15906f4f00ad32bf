//! Route handlers and how the router stores them.
//!
//! A handler is any `Fn(Request) -> impl Future<Output = impl IntoResponse>`.
//! Most of stash's handlers are closures that capture shared state, such as
//! the [`UploadDir`](crate::UploadDir) behind the POST route:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use stash::{Method, Request, Response, Router};
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let router = Router::new().on_any_path(Method::Get, move |_req: Request| {
//!     let seen = Arc::clone(&seen);
//!     async move {
//!         seen.fetch_add(1, Ordering::Relaxed);
//!         Response::json(Vec::new())
//!     }
//! });
//! # drop(router);
//! ```
//!
//! Registration erases the concrete closure type into a shared trait object;
//! each request costs one `Arc` clone and one boxed future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

pub(crate) use private::ErasedHandler;

pub(crate) type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Sealed: the blanket impl over async functions and closures is the only
/// implementation, and the erased form it produces cannot be named outside
/// this crate.
pub trait Handler: private::Sealed + Send + Sync + 'static {}

impl<T: private::Sealed + Send + Sync + 'static> Handler for T {}

mod private {
    use super::{BoxFuture, BoxedHandler};
    use crate::request::Request;

    pub trait Sealed {
        fn into_boxed_handler(self) -> BoxedHandler;
    }

    pub trait ErasedHandler {
        fn call(&self, req: Request) -> BoxFuture;
    }
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Erased(self))
    }
}

struct Erased<F>(F);

impl<F, Fut, R> ErasedHandler for Erased<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
