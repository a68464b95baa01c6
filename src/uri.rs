//! Splitting request targets into their parts.
//!
//! hget does not use a general purpose URL parser. A target is always
//! `scheme://host[:port][/path]`, where the scheme is one of `http` or `https`
//! and everything from the first `/` after the host is sent verbatim as the
//! request path.

use std::fmt;

use crate::Error;

/// The schemes hget can talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain text HTTP/1.1 over TCP.
    Http,
    /// HTTP/1.1 over TLS.
    Https,
}

impl Scheme {
    fn parse(s: &str) -> Option<Scheme> {
        if s.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else {
            None
        }
    }

    /// The port used when the target does not give one.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Tell if connections for this scheme are TLS wrapped.
    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Https)
    }

    /// The scheme as written in a URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A decomposed request target.
///
/// `path` always starts with `/` and includes any query string. The fragment
/// is never part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Scheme of the target.
    pub scheme: Scheme,
    /// Host as written in the target, IPv6 literals keep their brackets.
    pub host: String,
    /// Explicit port or the scheme default.
    pub port: u16,
    /// Request path, starting with `/`.
    pub path: String,
}

/// Split a URL into scheme, host, port and path.
///
/// ```
/// use hget::uri::{decompose, Scheme};
///
/// let parts = decompose("https://example.com:8443/a/b").unwrap();
///
/// assert_eq!(parts.scheme, Scheme::Https);
/// assert_eq!(parts.host, "example.com");
/// assert_eq!(parts.port, 8443);
/// assert_eq!(parts.path, "/a/b");
/// ```
pub fn decompose(url: &str) -> Result<UrlParts, Error> {
    let url = url.trim();

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(Error::InvalidUri(format!("{} (missing scheme://)", url)));
    };

    let scheme = Scheme::parse(scheme).ok_or_else(|| Error::InvalidScheme(scheme.to_string()))?;

    // The fragment is client side only.
    let rest = match rest.split_once('#') {
        Some((before, _)) => before,
        None => rest,
    };

    let (authority, path) = match rest.find(['/', '?']) {
        Some(i) if rest.as_bytes()[i] == b'/' => (&rest[..i], rest[i..].to_string()),
        Some(i) => (&rest[..i], format!("/{}", &rest[i..])),
        None => (rest, "/".to_string()),
    };

    let (host, port) = split_authority(url, authority)?;
    let port = port.unwrap_or_else(|| scheme.default_port());

    Ok(UrlParts {
        scheme,
        host,
        port,
        path,
    })
}

fn split_authority(url: &str, authority: &str) -> Result<(String, Option<u16>), Error> {
    let invalid = |why: &str| Error::InvalidUri(format!("{} ({})", url, why));

    if authority.contains('@') {
        return Err(invalid("credentials in url, use an auth specifier"));
    }

    let (host, port) = if authority.starts_with('[') {
        // [v6]:port
        let Some(end) = authority.find(']') else {
            return Err(invalid("unterminated ipv6 literal"));
        };
        let host = &authority[..=end];
        match &authority[end + 1..] {
            "" => (host, None),
            after => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(invalid("garbage after ipv6 literal")),
            },
        }
    } else {
        match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() || host.bytes().any(|c| c.is_ascii_whitespace() || c.is_ascii_control()) {
        return Err(invalid("missing or bad host"));
    }

    let port = match port {
        Some(p) => Some(p.parse::<u16>().map_err(|_| invalid("bad port"))?),
        None => None,
    };

    Ok((host.to_string(), port))
}

impl UrlParts {
    /// Host without IPv6 brackets, as handed to name resolution and SNI.
    pub fn connect_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    /// Resolve a `Location` header value against this target.
    ///
    /// Absolute locations are decomposed as they are. Scheme relative (`//host/x`),
    /// absolute path (`/x`), query only (`?q`) and path relative (`x`, `../x`)
    /// locations inherit what they leave out from `self`.
    pub fn resolve(&self, location: &str) -> Result<UrlParts, Error> {
        let location = location.trim();

        if location.starts_with("//") {
            return decompose(&format!("{}:{}", self.scheme.as_str(), location));
        }

        if has_scheme(location) {
            return decompose(location);
        }

        let location = match location.split_once('#') {
            Some((before, _)) => before,
            None => location,
        };

        let (own_path, _) = split_query(&self.path);

        let joined = if location.starts_with('/') {
            location.to_string()
        } else if location.starts_with('?') {
            format!("{}{}", own_path, location)
        } else if location.is_empty() {
            self.path.clone()
        } else {
            let dir = match own_path.rfind('/') {
                Some(i) => &own_path[..=i],
                None => "/",
            };
            format!("{}{}", dir, location)
        };

        let (path, query) = split_query(&joined);
        let mut path = remove_dot_segments(path);
        if let Some(q) = query {
            path.push('?');
            path.push_str(q);
        }

        Ok(UrlParts {
            path,
            ..self.clone()
        })
    }
}

/// Whether `location` starts with a `scheme://` rather than merely containing one.
fn has_scheme(location: &str) -> bool {
    let Some((scheme, _)) = location.split_once("://") else {
        return false;
    };

    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    }
}

fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let last = segments.len().saturating_sub(1);

    for (i, seg) in segments.iter().enumerate() {
        match *seg {
            "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
        // "a/.." and "a/." both denote the directory
        if i == last && (*seg == "." || *seg == "..") {
            out.push("");
        }
    }

    format!("/{}", out.join("/"))
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.host)?;
        if self.port != self.scheme.default_port() {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "{}", self.path)
    }
}
