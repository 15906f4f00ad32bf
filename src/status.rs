//! HTTP status codes as a typed enum.
//!
//! Only the codes stash actually answers with are listed. Each one maps to a
//! well-defined outcome of the upload flow:
//!
//! ```rust
//! use stash::{Response, Status};
//!
//! Response::status(Status::Ok);
//! Response::builder()
//!     .status(Status::BadRequest)
//!     .text("missing `msg` query parameter");
//! ```

/// Status codes produced by stash.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    NotFound,            // 404
    MethodNotAllowed,    // 405
    RequestTimeout,      // 408
    ContentTooLarge,     // 413

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
}

impl Status {
    /// The numeric code sent on the wire.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok                  => 200,
            Self::BadRequest          => 400,
            Self::NotFound            => 404,
            Self::MethodNotAllowed    => 405,
            Self::RequestTimeout      => 408,
            Self::ContentTooLarge     => 413,
            Self::InternalServerError => 500,
        }
    }
}

impl From<Status> for http::StatusCode {
    fn from(s: Status) -> http::StatusCode {
        match s {
            Status::Ok                  => http::StatusCode::OK,
            Status::BadRequest          => http::StatusCode::BAD_REQUEST,
            Status::NotFound            => http::StatusCode::NOT_FOUND,
            Status::MethodNotAllowed    => http::StatusCode::METHOD_NOT_ALLOWED,
            Status::RequestTimeout      => http::StatusCode::REQUEST_TIMEOUT,
            Status::ContentTooLarge     => http::StatusCode::PAYLOAD_TOO_LARGE,
            Status::InternalServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_agree_with_http_crate() {
        for status in [
            Status::Ok,
            Status::BadRequest,
            Status::NotFound,
            Status::MethodNotAllowed,
            Status::RequestTimeout,
            Status::ContentTooLarge,
            Status::InternalServerError,
        ] {
            assert_eq!(http::StatusCode::from(status).as_u16(), status.code());
        }
    }
}
