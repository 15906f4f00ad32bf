//! The two request handlers: acknowledgment (GET) and upload (POST).
//!
//! An upload is the whole body of one POST request. It is written verbatim
//! to the file named by the request's `Content-Disposition` header, relative
//! to the [`UploadDir`] root. Existing files are truncated and overwritten.
//! Two uploads racing on the same filename have no defined winner; nothing
//! here serializes them.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::disposition::{DispositionError, upload_filename};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::status::Status;

/// Everything that can go wrong while acknowledging or storing an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing `{0}` query parameter")]
    MissingQueryParam(&'static str),
    #[error("missing `Content-Disposition` header")]
    MissingDisposition,
    #[error("`Content-Disposition` header is not valid UTF-8")]
    DispositionEncoding,
    #[error("malformed `Content-Disposition` header: {0}")]
    Disposition(#[from] DispositionError),
    #[error("missing `Content-Length` header")]
    MissingLength,
    #[error("invalid `Content-Length` header `{0}`")]
    InvalidLength(String),
    #[error("request body is shorter than `Content-Length`")]
    IncompleteBody,
    #[error("request body was not received in time")]
    BodyTimeout,
    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: u64 },
    #[error("filename `{0}` escapes the upload directory")]
    UnsafeFilename(String),
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn status(&self) -> Status {
        match self {
            Self::MissingQueryParam(_)
            | Self::MissingDisposition
            | Self::DispositionEncoding
            | Self::Disposition(_)
            | Self::MissingLength
            | Self::InvalidLength(_)
            | Self::IncompleteBody
            | Self::UnsafeFilename(_) => Status::BadRequest,
            Self::BodyTimeout => Status::RequestTimeout,
            Self::BodyTooLarge { .. } => Status::ContentTooLarge,
            Self::Write { .. } => Status::InternalServerError,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == Status::InternalServerError {
            error!(error = %self, "upload failed");
        } else {
            warn!(error = %self, "rejected request");
        }
        Response::builder().status(status).text(self.to_string())
    }
}

// ── Upload directory ──────────────────────────────────────────────────────────

/// Where uploads land, and how much a filename is trusted.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
    strict: bool,
}

impl UploadDir {
    /// Uploads are resolved against `root`. Absolute filenames and `..`
    /// components are taken as given.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), strict: false }
    }

    /// Reject filenames that would land outside the root.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a client-supplied filename to the path that will be written.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, UploadError> {
        let relative = Path::new(filename);
        if self.strict {
            let escapes = relative.components().any(|c| {
                matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
            });
            if escapes {
                return Err(UploadError::UnsafeFilename(filename.to_owned()));
            }
        }
        Ok(self.root.join(relative))
    }

    /// Creates or truncates `path` and writes `contents` to it.
    ///
    /// The file handle lives only for the duration of this call; it is
    /// flushed on success and dropped (closed) on every path.
    pub async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), UploadError> {
        let io = |source| UploadError::Write { path: path.to_owned(), source };
        let mut file = File::create(path).await.map_err(io)?;
        file.write_all(contents).await.map_err(io)?;
        file.flush().await.map_err(io)?;
        Ok(())
    }
}

impl Default for UploadDir {
    fn default() -> Self {
        Self::new(".")
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /?msg=<string>` — logs the message and answers with an empty JSON ack.
pub async fn acknowledge(req: Request) -> Result<Response, UploadError> {
    let msg = req.query("msg").ok_or(UploadError::MissingQueryParam("msg"))?;
    info!(%msg, path = req.path(), "message received");
    Ok(Response::json(Vec::new()))
}

/// `POST /<any path>` — stores the body under the `Content-Disposition` filename.
pub async fn save(uploads: Arc<UploadDir>, req: Request) -> Result<Response, UploadError> {
    let disposition = req
        .header(CONTENT_DISPOSITION.as_str())
        .map_err(|_| UploadError::DispositionEncoding)?
        .ok_or(UploadError::MissingDisposition)?;
    let filename = upload_filename(disposition)?;
    let declared = declared_length(&req)?;

    // The HTTP layer frames the body by `Content-Length`, so a mismatch here
    // means the body was cut short.
    if req.body().len() as u64 != declared {
        return Err(UploadError::IncompleteBody);
    }

    let path = uploads.resolve(&filename)?;
    uploads.write(&path, req.body()).await?;
    info!(path = %path.display(), route = req.path(), bytes = declared, "upload stored");
    Ok(Response::json(Vec::new()))
}

fn declared_length(req: &Request) -> Result<u64, UploadError> {
    let raw = req.headers().get(CONTENT_LENGTH).ok_or(UploadError::MissingLength)?;
    let text = raw
        .to_str()
        .map_err(|_| UploadError::InvalidLength(String::from_utf8_lossy(raw.as_bytes()).into_owned()))?;
    let len = text
        .trim()
        .parse::<u64>()
        .map_err(|_| UploadError::InvalidLength(text.to_owned()))?;
    debug!(len, "declared content length");
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::test_request;

    fn post(disposition: Option<&str>, length: Option<&str>, body: &'static [u8]) -> Request {
        let mut builder = http::Request::post("/");
        if let Some(d) = disposition {
            builder = builder.header(CONTENT_DISPOSITION, d);
        }
        if let Some(l) = length {
            builder = builder.header(CONTENT_LENGTH, l);
        }
        test_request(builder, body)
    }

    fn uploads(dir: &tempfile::TempDir) -> Arc<UploadDir> {
        Arc::new(UploadDir::new(dir.path()))
    }

    #[tokio::test]
    async fn ack_requires_msg() {
        let res = acknowledge(test_request(http::Request::get("/?msg=hello"), b"")).await.unwrap();
        assert_eq!(res.status_code(), Status::Ok);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert!(res.body().is_empty());

        let err = acknowledge(test_request(http::Request::get("/"), b"")).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingQueryParam("msg")));
        assert_eq!(err.status(), Status::BadRequest);
    }

    #[tokio::test]
    async fn ack_treats_blank_msg_as_missing() {
        for uri in ["/?msg=", "/?msg", "/?msg=&x=1"] {
            let err = acknowledge(test_request(http::Request::get(uri), b"")).await.unwrap_err();
            assert!(matches!(err, UploadError::MissingQueryParam("msg")), "{uri}");
        }
    }

    #[tokio::test]
    async fn save_writes_body_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let body: &'static [u8] = b"1700000000,0.1,0.2,9.8\r\n\x00\xff";
        let len = body.len().to_string();
        let req = post(Some(r#"inline; filename="1""#), Some(&len), body);

        let res = save(uploads(&dir), req).await.unwrap();
        assert_eq!(res.status_code(), Status::Ok);
        assert_eq!(std::fs::read(dir.path().join("1")).unwrap(), body);
    }

    #[tokio::test]
    async fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = uploads(&dir);
        let header = r#"inline; filename="same""#;

        save(Arc::clone(&store), post(Some(header), Some("11"), b"first write")).await.unwrap();
        save(store, post(Some(header), Some("3"), b"2nd")).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("same")).unwrap(), b"2nd");
    }

    #[tokio::test]
    async fn save_accepts_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        save(uploads(&dir), post(Some("inline; filename=empty"), Some("0"), b"")).await.unwrap();
        assert!(std::fs::read(dir.path().join("empty")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_classifies_header_problems() {
        let dir = tempfile::tempdir().unwrap();
        let store = uploads(&dir);

        let err = save(Arc::clone(&store), post(None, Some("1"), b"x")).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingDisposition));

        let err = save(Arc::clone(&store), post(Some("inline"), Some("1"), b"x")).await.unwrap_err();
        assert!(matches!(err, UploadError::Disposition(DispositionError::MissingFilename)));

        let err = save(Arc::clone(&store), post(Some("inline; filename=a"), None, b"x")).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingLength));

        let err = save(Arc::clone(&store), post(Some("inline; filename=a"), Some("one"), b"x")).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidLength(ref v) if v == "one"));

        let err = save(store, post(Some("inline; filename=a"), Some("5"), b"x")).await.unwrap_err();
        assert!(matches!(err, UploadError::IncompleteBody));
        assert_eq!(err.status(), Status::BadRequest);
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn save_accepts_utf8_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let value = http::HeaderValue::from_bytes("inline; filename=\"é.csv\"".as_bytes()).unwrap();
        let builder = http::Request::post("/")
            .header(CONTENT_DISPOSITION, value)
            .header(CONTENT_LENGTH, "2");

        save(uploads(&dir), test_request(builder, b"ok")).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("é.csv")).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn save_rejects_undecodable_disposition() {
        let dir = tempfile::tempdir().unwrap();
        let value = http::HeaderValue::from_bytes(b"inline; filename=\"\xe9.csv\"").unwrap();
        let builder = http::Request::post("/")
            .header(CONTENT_DISPOSITION, value)
            .header(CONTENT_LENGTH, "2");

        let err = save(uploads(&dir), test_request(builder, b"ok")).await.unwrap_err();
        assert!(matches!(err, UploadError::DispositionEncoding));
        assert_eq!(err.status(), Status::BadRequest);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn write_failure_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let req = post(Some(r#"inline; filename="missing/sub/dir.txt""#), Some("1"), b"x");
        let err = save(uploads(&dir), req).await.unwrap_err();
        assert!(matches!(err, UploadError::Write { .. }));
        assert_eq!(err.into_response().status_code(), Status::InternalServerError);
    }

    #[test]
    fn lenient_resolution_keeps_traversal() {
        let store = UploadDir::new("/srv/uploads");
        assert_eq!(store.resolve("a.txt").unwrap(), PathBuf::from("/srv/uploads/a.txt"));
        assert_eq!(store.resolve("../a.txt").unwrap(), PathBuf::from("/srv/uploads/../a.txt"));
    }

    #[test]
    fn strict_resolution_rejects_escapes() {
        let store = UploadDir::new("/srv/uploads").strict(true);
        assert_eq!(store.resolve("sub/a.txt").unwrap(), PathBuf::from("/srv/uploads/sub/a.txt"));
        for name in ["../a.txt", "sub/../../a.txt", "/etc/passwd"] {
            let err = store.resolve(name).unwrap_err();
            assert!(matches!(err, UploadError::UnsafeFilename(_)), "{name}");
            assert_eq!(err.status(), Status::BadRequest);
        }
    }
}
