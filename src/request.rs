//! Incoming HTTP request type.

use std::collections::HashMap;
use std::str::Utf8Error;

use bytes::Bytes;
use http::HeaderMap;

/// An incoming HTTP request with its body fully buffered.
///
/// The server reads the body (bounded by the configured limit and timeout)
/// before a handler runs, so handlers never deal with partial reads.
#[derive(Debug)]
pub struct Request {
    pub(crate) uri: http::Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        Self {
            uri: parts.uri,
            headers: parts.headers,
            body,
            params,
        }
    }

    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup, decoded as UTF-8.
    ///
    /// `Ok(None)` when the header is absent, `Err` when it is present but its
    /// bytes are not UTF-8.
    pub fn header(&self, name: &str) -> Result<Option<&str>, Utf8Error> {
        self.headers
            .get(name)
            .map(|v| std::str::from_utf8(v.as_bytes()))
            .transpose()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/{*path}`, `req.param("path")` on `/a/b` returns `Some("a/b")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a query-string parameter, percent-decoded.
    ///
    /// `+` decodes to a space, as in HTML form submissions. Blank values
    /// (`?key=` or a bare `?key`) count as absent, and when the key repeats
    /// the last non-blank value wins.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        form_urlencoded::parse(query.as_bytes())
            .filter(|(k, v)| k == key && !v.is_empty())
            .last()
            .map(|(_, v)| v.into_owned())
    }
}

#[cfg(test)]
pub(crate) fn test_request(builder: http::request::Builder, body: &'static [u8]) -> Request {
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    Request::new(parts, Bytes::from_static(body), HashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request {
        test_request(http::Request::get(uri), b"")
    }

    #[test]
    fn query_decodes_values() {
        let req = get("/?msg=battery%20low&other=1");
        assert_eq!(req.query("msg").as_deref(), Some("battery low"));
        assert_eq!(req.query("other").as_deref(), Some("1"));
    }

    #[test]
    fn query_last_occurrence_wins() {
        assert_eq!(get("/?msg=a&msg=b").query("msg").as_deref(), Some("b"));
        assert_eq!(get("/?msg=a&msg=").query("msg").as_deref(), Some("a"));
    }

    #[test]
    fn query_absent() {
        assert_eq!(get("/").query("msg"), None);
        assert_eq!(get("/?other=1").query("msg"), None);
    }

    #[test]
    fn query_blank_value_is_absent() {
        assert_eq!(get("/?msg=").query("msg"), None);
        assert_eq!(get("/?msg").query("msg"), None);
        assert_eq!(get("/?msg=&other=1").query("msg"), None);
    }

    #[test]
    fn path_excludes_query() {
        assert_eq!(get("/status/watch?msg=a").path(), "/status/watch");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = test_request(
            http::Request::post("/").header("Content-Disposition", "inline; filename=\"1\""),
            b"",
        );
        assert_eq!(req.header("content-disposition"), Ok(Some("inline; filename=\"1\"")));
        assert_eq!(req.header("content-length"), Ok(None));
    }

    #[test]
    fn header_decodes_utf8_and_rejects_other_bytes() {
        let utf8 = http::HeaderValue::from_bytes("inline; filename=\"é.csv\"".as_bytes()).unwrap();
        let req = test_request(http::Request::post("/").header("content-disposition", utf8), b"");
        assert_eq!(req.header("content-disposition"), Ok(Some("inline; filename=\"é.csv\"")));

        let latin1 = http::HeaderValue::from_bytes(b"inline; filename=\"\xe9.csv\"").unwrap();
        let req = test_request(http::Request::post("/").header("content-disposition", latin1), b"");
        assert!(req.header("content-disposition").is_err());
    }
}
