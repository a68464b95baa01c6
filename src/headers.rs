//! Ordered header maps and response head parsing.

use std::fmt;

use http::{HeaderName, HeaderValue, StatusCode, Version};

use crate::Error;

/// Number of headers parsed without a heap allocation.
///
/// Larger header blocks are parsed into a vector sized by their line count.
pub const MAX_RESPONSE_HEADERS: usize = 128;

/// Ordered map of header names to values.
///
/// Names compare case insensitively. Setting a name that is already present
/// overwrites the value in place, so the map never holds duplicates and the
/// position of a name is where it was first set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, overwriting any previous value for the same name.
    ///
    /// Fails with [`Error::MalformedHeader`] if the name is not a token or
    /// the value holds control characters such as CR/LF.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::MalformedHeader(format!("bad name: {:?}", name)))?;
        HeaderValue::from_str(value)
            .map_err(|_| Error::MalformedHeader(format!("bad value for {}: {:?}", name, value)))?;

        match self.position(name) {
            Some(i) => self.entries[i].1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }

        Ok(())
    }

    /// Get the value for a name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    /// Tell if the name is set.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a name, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Tell if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` in insertion order. Names are as first set.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render every entry as `Title-Case-Name: value\r\n`.
    ///
    /// ```
    /// use hget::Headers;
    ///
    /// let mut h = Headers::new();
    /// h.set("user-agent", "hget").unwrap();
    /// h.set("X-API-KEY", "k").unwrap();
    ///
    /// assert_eq!(h.serialize(), "User-Agent: hget\r\nX-Api-Key: k\r\n");
    /// ```
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.iter() {
            out.push_str(&title_case(name));
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub(crate) fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start = false;
        } else {
            out.push(c);
            start = true;
        }
    }
    out
}

/// The parsed header block of a response.
///
/// `code` and `status` are only present when the block started with a
/// status line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP version of the status line.
    pub version: Option<Version>,
    /// Numeric status code of the status line.
    pub code: Option<StatusCode>,
    /// Reason phrase of the status line, possibly empty.
    pub status: Option<String>,
    /// The header lines following the status line.
    pub headers: Headers,
}

impl ResponseHead {
    /// Tell if the head had a recognizable status line.
    pub fn has_status_line(&self) -> bool {
        self.code.is_some()
    }

    /// The `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location")
    }
}

/// Parse a response header block.
///
/// The block is everything before the blank line separating headers from
/// body. If it starts with `HTTP/` the first line is read as a status line.
/// Every other line must be `name: value`, anything else fails with
/// [`Error::MalformedHeader`].
///
/// ```
/// use hget::parse_response_head;
///
/// let head = parse_response_head("HTTP/1.1 301 Moved Permanently\r\nLocation: http://b").unwrap();
///
/// assert_eq!(head.code.unwrap().as_u16(), 301);
/// assert_eq!(head.status.as_deref(), Some("Moved Permanently"));
/// assert_eq!(head.location(), Some("http://b"));
/// ```
pub fn parse_response_head(block: &str) -> Result<ResponseHead, Error> {
    let block = block.trim_end_matches(['\r', '\n']);

    if block.is_empty() {
        return Ok(ResponseHead::default());
    }

    // httparse wants the terminating blank line.
    let input = format!("{}\r\n\r\n", block);
    let lines = block.lines().count();
    let mut stack = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut heap;
    let parsed: &mut [httparse::Header<'_>] = if lines <= MAX_RESPONSE_HEADERS {
        &mut stack[..]
    } else {
        debug!("Large header block: {} lines", lines);
        heap = vec![httparse::EMPTY_HEADER; lines];
        &mut heap[..]
    };

    if block.starts_with("HTTP/") {
        let mut res = httparse::Response::new(parsed);

        match res.parse(input.as_bytes()) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(Error::MalformedHeader(first_line(block).to_string()))
            }
            Err(e) => return Err(malformed(e, block)),
        }

        let version = match res.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };

        // httparse only yields three digits, but not necessarily >= 100
        let code = res
            .code
            .and_then(|c| StatusCode::from_u16(c).ok())
            .ok_or_else(|| Error::MalformedHeader(first_line(block).to_string()))?;

        let status = res.reason.unwrap_or_default().to_string();
        let headers = collect(res.headers)?;

        Ok(ResponseHead {
            version: Some(version),
            code: Some(code),
            status: Some(status),
            headers,
        })
    } else {
        let headers = match httparse::parse_headers(input.as_bytes(), parsed) {
            Ok(httparse::Status::Complete((_, h))) => collect(h)?,
            Ok(httparse::Status::Partial) => {
                return Err(Error::MalformedHeader(first_line(block).to_string()))
            }
            Err(e) => return Err(malformed(e, block)),
        };

        Ok(ResponseHead {
            headers,
            ..Default::default()
        })
    }
}

fn collect(parsed: &[httparse::Header<'_>]) -> Result<Headers, Error> {
    let mut headers = Headers::new();
    for h in parsed {
        let value = String::from_utf8_lossy(h.value);
        headers.set(h.name, value.trim_end_matches('\r'))?;
    }
    Ok(headers)
}

fn malformed(e: httparse::Error, block: &str) -> Error {
    // Point at the first line that does not look like a header.
    let offender = block
        .lines()
        .skip(usize::from(block.starts_with("HTTP/")))
        .find(|l| !l.contains(':'));

    match offender {
        Some(line) => Error::MalformedHeader(format!("{}: {:?}", e, line.trim_end_matches('\r'))),
        None => e.into(),
    }
}

fn first_line(block: &str) -> &str {
    block.lines().next().unwrap_or_default()
}

impl fmt::Display for ResponseHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            let version = match self.version {
                Some(Version::HTTP_10) => "HTTP/1.0",
                _ => "HTTP/1.1",
            };
            let status = self.status.as_deref().unwrap_or_default();
            write!(f, "{} {} {}\r\n", version, code.as_u16(), status)?;
        }
        write!(f, "{}", self.headers.serialize())
    }
}
