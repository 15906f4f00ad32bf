//! # stash
//!
//! A minimal HTTP file-drop server.
//!
//! - `POST /<any path>` with `Content-Disposition: inline; filename="name"`
//!   writes the request body, byte for byte, to `name` under the upload
//!   directory, replacing any existing file.
//! - `GET /?msg=<text>` logs the message and acknowledges it.
//!
//! Both answer `200` with `Content-Type: application/json` and an empty body.
//! Malformed requests get a `4xx`, failed writes a `500`.
//!
//! What stash does not do: authentication, atomic or durable writes,
//! coordination between concurrent uploads of the same file. Connections are
//! served one at a time.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use stash::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stash::Error> {
//!     let config = Config { port: 0, ..Config::default() };
//!     let server = Server::bind(&config).await?;
//!     println!("listening on {}", server.local_addr());
//!
//!     let handle = server.serve(stash::app(config.uploads()));
//!     handle.shutdown_on(stash::shutdown_signal()).await
//! }
//! ```

mod config;
mod disposition;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;
mod upload;

use std::sync::Arc;

pub use config::Config;
pub use disposition::{ContentDisposition, DispositionError, upload_filename};
pub use error::Error;
pub use handler::Handler;
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{Server, ServerHandle, shutdown_signal};
pub use status::Status;
pub use upload::{UploadDir, UploadError, acknowledge, save};

/// The stash application: acknowledgments on `GET`, uploads on `POST`, on
/// every path.
pub fn app(uploads: UploadDir) -> Router {
    let uploads = Arc::new(uploads);
    Router::new()
        .on_any_path(Method::Get, acknowledge)
        .on_any_path(Method::Post, move |req| save(Arc::clone(&uploads), req))
}
