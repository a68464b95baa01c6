//! Turning requests into wire bytes and wire bytes into responses.

use std::fmt;

use http::Method;

use crate::headers::{parse_response_head, ResponseHead};
use crate::uri::UrlParts;
use crate::{Error, Headers};

/// Body text stood in for a response that lacked the header/body separator.
pub const UNSUPPORTED_ENCODING: &str = "Unsupported Content-Encoding";

/// A request ready to be framed.
///
/// Built fresh for every attempt of a request cycle.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    /// Request method.
    pub method: Method,
    /// Target of the request.
    pub url: UrlParts,
    /// Headers in addition to `Host` and `Connection`.
    pub headers: Headers,
    /// Request body, possibly empty.
    pub body: String,
}

impl OutgoingRequest {
    /// Create a request, adding `Content-Type` and `Content-Length` for a non-empty body.
    pub fn new(method: Method, url: UrlParts, mut headers: Headers, body: String) -> Result<Self, Error> {
        if !body.is_empty() {
            if !headers.contains("content-type") {
                headers.set("Content-Type", "text/plain")?;
            }
            headers.set("Content-Length", &body.len().to_string())?;
        }

        Ok(OutgoingRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

/// Serialize a request to HTTP/1.1 wire format.
///
/// `Host` and `Connection: close` are always written by the framer, entries
/// with those names in the request headers are skipped.
///
/// ```
/// use hget::{frame_request, uri::decompose, Headers, OutgoingRequest};
/// use hget::http::Method;
///
/// let url = decompose("http://h").unwrap();
/// let req = OutgoingRequest::new(Method::GET, url, Headers::new(), String::new()).unwrap();
///
/// assert_eq!(
///     frame_request(&req),
///     b"GET / HTTP/1.1\r\nHost: h:80\r\nConnection: close\r\n\r\n\r\n"
/// );
/// ```
pub fn frame_request(req: &OutgoingRequest) -> Vec<u8> {
    let mut headers = req.headers.clone();
    for forced in ["host", "connection"] {
        if headers.remove(forced).is_some() {
            debug!("Ignore caller header: {}", forced);
        }
    }

    let out = format!(
        "{} {} HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\n{}\r\n{}\r\n",
        req.method,
        req.url.path,
        req.url.host,
        req.url.port,
        headers.serialize(),
        req.body
    );

    out.into_bytes()
}

/// The body part of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Text following the blank line, decoded lossily.
    Text(String),
    /// There was no blank line after the headers, so no body could be told apart.
    Unsupported,
}

impl ResponseBody {
    /// The body as text. [`ResponseBody::Unsupported`] renders as [`UNSUPPORTED_ENCODING`].
    pub fn as_str(&self) -> &str {
        match self {
            ResponseBody::Text(v) => v,
            ResponseBody::Unsupported => UNSUPPORTED_ENCODING,
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split raw response bytes at the first `\r\n\r\n`.
///
/// Without a separator the whole input is the header block and the body is
/// [`ResponseBody::Unsupported`]. This is not an error.
///
/// ```
/// use hget::{split_response, ResponseBody};
///
/// let (head, body) = split_response(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
///
/// assert_eq!(head, "HTTP/1.1 200 OK\r\nContent-Length: 2");
/// assert_eq!(body, ResponseBody::Text("hi".into()));
/// ```
pub fn split_response(raw: &[u8]) -> (String, ResponseBody) {
    match find_separator(raw) {
        Some(i) => {
            let head = decode_lossy(&raw[..i]);
            let body = decode_lossy(&raw[i + 4..]);
            (head, ResponseBody::Text(body))
        }
        None => {
            debug!("No header/body separator in {} bytes", raw.len());
            (decode_lossy(raw), ResponseBody::Unsupported)
        }
    }
}

fn find_separator(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

/// A fully received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line and headers.
    pub head: ResponseHead,
    /// Everything after the blank line.
    pub body: ResponseBody,
}

impl Default for Response {
    fn default() -> Self {
        Response {
            head: ResponseHead::default(),
            body: ResponseBody::Unsupported,
        }
    }
}

/// Split and parse raw response bytes.
pub fn parse_response(raw: &[u8]) -> Result<Response, Error> {
    let (block, body) = split_response(raw);
    let head = parse_response_head(&block)?;
    Ok(Response { head, body })
}

/// Decode bytes as UTF-8, dropping every invalid sequence.
///
/// Received data is accumulated as text on a best effort basis. Bytes that
/// are not valid UTF-8 are silently left out rather than failing the read,
/// which makes binary bodies lossy.
pub fn decode_lossy(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut dropped = 0;

    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                break;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // valid_up_to() guarantees this prefix decodes.
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());

                // None means an incomplete sequence at the very end.
                let skip = e.error_len().unwrap_or(rest.len());
                dropped += skip;
                bytes = &rest[skip..];
            }
        }
    }

    if dropped > 0 {
        debug!("Dropped {} undecodable bytes", dropped);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::decompose;

    fn request(method: Method, url: &str, headers: Headers, body: &str) -> OutgoingRequest {
        OutgoingRequest::new(method, decompose(url).unwrap(), headers, body.to_string()).unwrap()
    }

    #[test]
    fn frame_minimal_get() {
        let req = request(Method::GET, "http://h", Headers::new(), "");
        assert_eq!(
            frame_request(&req),
            b"GET / HTTP/1.1\r\nHost: h:80\r\nConnection: close\r\n\r\n\r\n"
        );
    }

    #[test]
    fn frame_with_headers_and_body() {
        let mut headers = Headers::new();
        headers.set("user-agent", "hget/0").unwrap();

        let req = request(Method::POST, "https://h:8443/p?q=1", headers, "hello");

        let expected = "POST /p?q=1 HTTP/1.1\r\n\
            Host: h:8443\r\n\
            Connection: close\r\n\
            User-Agent: hget/0\r\n\
            Content-Type: text/plain\r\n\
            Content-Length: 5\r\n\
            \r\n\
            hello\r\n";

        assert_eq!(String::from_utf8(frame_request(&req)).unwrap(), expected);
    }

    #[test]
    fn body_headers_overwrite_and_keep_content_type() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json").unwrap();
        headers.set("Content-Length", "999").unwrap();

        let req = request(Method::PUT, "http://h", headers, "{}");

        assert_eq!(req.headers.get("content-type"), Some("application/json"));
        assert_eq!(req.headers.get("content-length"), Some("2"));
    }

    #[test]
    fn content_length_counts_bytes() {
        let req = request(Method::POST, "http://h", Headers::new(), "åäö");
        assert_eq!(req.headers.get("content-length"), Some("6"));
    }

    #[test]
    fn frame_skips_caller_host_and_connection() {
        let mut headers = Headers::new();
        headers.set("Host", "evil").unwrap();
        headers.set("connection", "keep-alive").unwrap();

        let req = request(Method::GET, "http://h", headers, "");

        assert_eq!(
            frame_request(&req),
            b"GET / HTTP/1.1\r\nHost: h:80\r\nConnection: close\r\n\r\n\r\n"
        );
    }

    #[test]
    fn split_at_first_separator() {
        let (head, body) = split_response(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
        assert_eq!(head, "HTTP/1.1 200 OK\r\nContent-Length: 2");
        assert_eq!(body, ResponseBody::Text("hi".to_string()));

        let (_, body) = split_response(b"HTTP/1.1 200 OK\r\n\r\na\r\n\r\nb");
        assert_eq!(body.as_str(), "a\r\n\r\nb");
    }

    #[test]
    fn split_without_separator() {
        let (head, body) = split_response(b"HTTP/1.1 200 OK\r\nX: y");
        assert_eq!(head, "HTTP/1.1 200 OK\r\nX: y");
        assert_eq!(body, ResponseBody::Unsupported);
        assert_eq!(body.to_string(), UNSUPPORTED_ENCODING);

        let (head, body) = split_response(b"");
        assert_eq!(head, "");
        assert_eq!(body, ResponseBody::Unsupported);
    }

    #[test]
    fn decode_drops_invalid_bytes() {
        assert_eq!(decode_lossy(b"abc"), "abc");
        assert_eq!(decode_lossy(b"a\xffb\xfe\xfdc"), "abc");
        assert_eq!(decode_lossy("hé".as_bytes()), "hé");
        // truncated two byte sequence at the end
        assert_eq!(decode_lossy(b"ok\xc3"), "ok");
        assert_eq!(decode_lossy(b"\xff"), "");
    }

    #[test]
    fn parse_full_response() {
        let res = parse_response(b"HTTP/1.1 404 Not Found\r\nServer: x\r\n\r\nnope").unwrap();
        assert_eq!(res.head.code.unwrap().as_u16(), 404);
        assert_eq!(res.head.headers.get("server"), Some("x"));
        assert_eq!(res.body.as_str(), "nope");
    }
}
