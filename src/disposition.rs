//! `Content-Disposition` header parsing.
//!
//! Grammar accepted (RFC 6266, without the `filename*` extended notation):
//!
//! ```text
//! disposition = type *( ";" param )
//! param       = name "=" ( token / quoted-string )
//! ```
//!
//! Both shapes seen in practice parse to the same thing:
//!
//! ```rust
//! use stash::ContentDisposition;
//!
//! let inline = ContentDisposition::parse(r#"inline; filename="7""#).unwrap();
//! assert_eq!(inline.filename(), Some("7"));
//!
//! let form = ContentDisposition::parse(r#"form-data; name="file"; filename="out.txt""#).unwrap();
//! assert_eq!(form.filename(), Some("out.txt"));
//! ```

/// A parsed `Content-Disposition` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    kind: String,
    params: Vec<(String, String)>,
}

/// Why a `Content-Disposition` value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispositionError {
    #[error("header is empty")]
    Empty,
    #[error("parameter `{0}` has no `=`")]
    MissingEquals(String),
    #[error("parameter `{0}` has an unterminated quoted value")]
    UnterminatedQuote(String),
    #[error("no `filename` parameter")]
    MissingFilename,
    #[error("`filename` parameter is empty")]
    EmptyFilename,
}

impl ContentDisposition {
    pub fn parse(value: &str) -> Result<Self, DispositionError> {
        let value = value.trim();
        let (kind, mut rest) = match value.find(';') {
            Some(i) => (&value[..i], &value[i + 1..]),
            None => (value, ""),
        };
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(DispositionError::Empty);
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            // Tolerate empty parameters such as a trailing `;`.
            if let Some(after) = rest.strip_prefix(';') {
                rest = after;
                continue;
            }

            let (name, after_name) = match rest.find(['=', ';']) {
                Some(i) if rest.as_bytes()[i] == b'=' => (rest[..i].trim(), &rest[i + 1..]),
                _ => {
                    let name = rest.split(';').next().unwrap_or(rest).trim();
                    return Err(DispositionError::MissingEquals(name.to_owned()));
                }
            };
            let name = name.to_ascii_lowercase();

            let after_name = after_name.trim_start();
            let (param_value, remainder) = if let Some(quoted) = after_name.strip_prefix('"') {
                unquote(quoted).ok_or_else(|| DispositionError::UnterminatedQuote(name.clone()))?
            } else {
                let end = after_name.find(';').unwrap_or(after_name.len());
                (after_name[..end].trim_end().to_owned(), &after_name[end..])
            };

            params.push((name, param_value));
            rest = remainder;
        }

        Ok(Self { kind: kind.to_ascii_lowercase(), params })
    }

    /// The disposition type, lowercased (`inline`, `attachment`, `form-data`, …).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Case-insensitive parameter lookup. The first occurrence wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn filename(&self) -> Option<&str> {
        self.param("filename")
    }
}

/// Extracts the filename an upload should be stored under.
pub fn upload_filename(value: &str) -> Result<String, DispositionError> {
    let disposition = ContentDisposition::parse(value)?;
    match disposition.filename() {
        None => Err(DispositionError::MissingFilename),
        Some("") => Err(DispositionError::EmptyFilename),
        Some(name) => Ok(name.to_owned()),
    }
}

/// Reads a quoted-string body (the opening quote already consumed).
/// Returns the unescaped value and whatever follows the closing quote.
fn unquote(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &s[i + 1..])),
            '\\' => out.push(chars.next()?.1),
            c => out.push(c),
        }
    }
    None
}
