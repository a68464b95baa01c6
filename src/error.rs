use std::{fmt, io};

/// Error type for hget
#[derive(Debug)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    InvalidUri(String),
    InvalidScheme(String),
    BadMethod(String),
    Transport {
        kind: TransportErrorKind,
        source: io::Error,
    },
    Tls(rustls::Error),
    TooManyRedirects(usize),
    MalformedHeader(String),
}

/// The stage of an exchange at which the transport failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Host name lookup failed or produced no addresses.
    Resolve,
    /// The peer refused or the route is unreachable.
    Connect,
    /// A connect or read timeout elapsed.
    Timeout,
    /// Sending the request failed.
    Write,
    /// Reading the response failed.
    Read,
}

impl Error {
    pub(crate) fn transport(kind: TransportErrorKind, source: io::Error) -> Self {
        // Both timeouts surface as the same kind regardless of stage.
        let kind = match source.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
            _ => kind,
        };
        Error::Transport { kind, source }
    }

    /// Map an io error from a stream, pulling out a rustls error carried inside.
    pub(crate) fn from_io(kind: TransportErrorKind, source: io::Error) -> Self {
        let is_tls = source
            .get_ref()
            .map(|e| e.is::<rustls::Error>())
            .unwrap_or(false);

        if is_tls {
            // into_inner() is Some since get_ref() was
            if let Some(inner) = source.into_inner() {
                if let Ok(tls) = inner.downcast::<rustls::Error>() {
                    return Error::Tls(*tls);
                }
            }
            return Error::Tls(rustls::Error::General("tls stream failed".into()));
        }

        Error::transport(kind, source)
    }

    /// Tell if this error is the transport timing out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Transport {
                kind: TransportErrorKind::Timeout,
                ..
            }
        )
    }
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        Error::MalformedHeader(value.to_string())
    }
}

impl From<rustls::Error> for Error {
    fn from(value: rustls::Error) -> Self {
        Error::Tls(value)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => Some(source),
            Error::Tls(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidUri(v) => write!(f, "invalid uri: {}", v),
            Error::InvalidScheme(v) => {
                write!(f, "unsupported scheme {}, urls must begin with http:// or https://", v)
            }
            Error::BadMethod(v) => write!(f, "method is not a valid token: {}", v),
            Error::Transport {
                kind: TransportErrorKind::Timeout,
                source,
            } => write!(f, "timed out: {}", source),
            Error::Transport { kind, source } => write!(f, "{} failed: {}", kind, source),
            Error::Tls(e) => write!(f, "tls failed: {}", e),
            Error::TooManyRedirects(n) => write!(f, "gave up after {} redirects", n),
            Error::MalformedHeader(v) => write!(f, "malformed header: {}", v),
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Resolve => "resolve",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Write => "write",
            TransportErrorKind::Read => "read",
        };
        f.write_str(s)
    }
}
