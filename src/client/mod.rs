//! HTTP/1.1 request cycles
//!
//! A [`Cycle`](flow::Cycle) encodes the lifecycle of one request using state
//! variables, for example `Cycle<Initial>` to represent the stage where the
//! target is known but nothing was sent yet.
//!
//! The states are:
//!
//! * **Initial** - The target is decomposed and the headers for the attempt
//!   are settled. Unsupported schemes and malformed targets fail here, before
//!   anything is sent.
//! * **Sent** - The framed request went out over a fresh connection and
//!   everything up to the peer closing it was read back.
//! * **Parsed** - The received bytes are split into head and body and the head
//!   is parsed into status and headers.
//! * **Redirecting** - The response is a 3xx with a `Location` and following
//!   redirects is enabled. A new `Initial` cycle is made from the location.
//! * **Done** - The response is final.
//!
//! ```text
//!                            ┌──────────────────┐
//! ┌ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ▶│     Initial      │
//!                            └──────────────────┘
//! │                                    │
//!                                      ▼
//! │                          ┌──────────────────┐
//!                            │       Sent       │
//! │                          └──────────────────┘
//!                                      │
//! │                                    ▼
//!                            ┌──────────────────┐
//! │            ┌─────────────│      Parsed      │
//!              │             └──────────────────┘
//! │            ▼                       │
//!    ┌──────────────────┐              ▼
//! └ ─│   Redirecting    │    ┌──────────────────┐
//!    └──────────────────┘    │       Done       │
//!                            └──────────────────┘
//! ```
//!
//! [`Client`] drives the states in a loop over a [`Transport`], bounded by
//! [`Config::max_redirects`].
//!
//! # Example
//!
//! ```no_run
//! use hget::client::{Client, Config, RequestOptions};
//!
//! let mut client = Client::new(Config::default());
//!
//! let mut opts = RequestOptions::default();
//! opts.header_arg("Accept:text/html").unwrap();
//!
//! let response = client.run("http://example.com", &opts).unwrap();
//!
//! println!("{}", response.body);
//! ```

use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::Method;

use crate::frame::Response;
use crate::transport::{TcpTransport, Transport};
use crate::{Error, Headers};

pub mod flow;

pub use flow::{Cycle, ParsedResult, RedirectAuthHeaders};

#[cfg(test)]
mod test;

/// Default upper bound of redirects followed for one request.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Follow 3xx responses with a `Location` header.
    pub follow_redirects: bool,

    /// Fail with [`Error::TooManyRedirects`] instead of following more than this.
    pub max_redirects: usize,

    /// When to keep `Authorization` across redirects.
    pub redirect_auth_headers: RedirectAuthHeaders,

    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Option<Duration>,

    /// Timeout for each read and write on the connection.
    pub read_timeout: Option<Duration>,

    /// Send the default header set.
    pub default_headers: bool,

    /// Value of the default `User-Agent` header.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            redirect_auth_headers: RedirectAuthHeaders::SameHost,
            connect_timeout: Some(DEFAULT_TIMEOUT),
            read_timeout: Some(DEFAULT_TIMEOUT),
            default_headers: true,
            user_agent: format!("hget/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// The headers sent unless turned off with `default_headers`.
    pub fn default_header_set(&self) -> Result<Headers, Error> {
        let mut headers = Headers::new();
        headers.set("User-Agent", &self.user_agent)?;
        headers.set("Allow", "*/*")?;
        Ok(headers)
    }
}

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Method, case insensitive. Defaults to `GET`.
    pub method: String,

    /// Request body, empty for none.
    pub body: String,

    /// Headers in the order given, later entries overwrite earlier ones.
    pub headers: Vec<(String, String)>,

    /// Auth specifier `scheme/user:pass`.
    pub auth: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            method: "GET".to_string(),
            body: String::new(),
            headers: Vec::new(),
            auth: None,
        }
    }
}

impl RequestOptions {
    /// Add a header from a `Name:Value` token.
    ///
    /// The token is split on the first `:` and the value is trimmed.
    pub fn header_arg(&mut self, token: &str) -> Result<(), Error> {
        let Some((name, value)) = token.split_once(':') else {
            return Err(Error::MalformedHeader(format!("expected Name:Value, got {:?}", token)));
        };

        self.headers
            .push((name.trim().to_string(), value.trim().to_string()));

        Ok(())
    }

    fn parse_method(&self) -> Result<Method, Error> {
        let upper = self.method.trim().to_ascii_uppercase();
        Method::from_bytes(upper.as_bytes()).map_err(|_| Error::BadMethod(self.method.clone()))
    }
}

/// Build an `Authorization` value from `scheme/user:pass`.
///
/// Without a `scheme/` prefix the scheme is `Basic`. A `/` after the first
/// `:` belongs to the password.
///
/// ```
/// use hget::client::authorization;
///
/// assert_eq!(authorization("Basic/user:pass"), "Basic dXNlcjpwYXNz");
/// assert_eq!(authorization("user:pass"), "Basic dXNlcjpwYXNz");
/// assert_eq!(authorization("user:pa/ss"), "Basic dXNlcjpwYS9zcw==");
/// ```
pub fn authorization(spec: &str) -> String {
    let (scheme, creds) = match spec.split_once('/') {
        Some((scheme, _)) if scheme.contains(':') => ("Basic", spec),
        Some((scheme, creds)) if !scheme.is_empty() => (scheme, creds),
        Some((_, creds)) => ("Basic", creds),
        None => ("Basic", spec),
    };

    format!("{} {}", scheme, BASE64_STANDARD.encode(creds))
}

/// Runs request cycles over a transport.
#[derive(Debug)]
pub struct Client<T = TcpTransport> {
    config: Config,
    transport: T,
}

impl Client<TcpTransport> {
    /// Create a client talking TCP/TLS.
    pub fn new(config: Config) -> Self {
        let transport = TcpTransport::new(config.connect_timeout, config.read_timeout);
        Client { config, transport }
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over some other transport.
    pub fn with_transport(config: Config, transport: T) -> Self {
        Client { config, transport }
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The headers sent with every attempt for `opts`.
    ///
    /// The default set unless turned off, overwritten by the caller's headers,
    /// then `Authorization` from the auth specifier.
    pub fn request_headers(&self, opts: &RequestOptions) -> Result<Headers, Error> {
        let mut headers = if self.config.default_headers {
            self.config.default_header_set()?
        } else {
            Headers::new()
        };

        for (name, value) in &opts.headers {
            headers.set(name, value)?;
        }

        if let Some(spec) = &opts.auth {
            headers.set("Authorization", &authorization(spec))?;
        }

        Ok(headers)
    }

    /// Request `url` and follow redirects to a final response.
    pub fn run(&mut self, url: &str, opts: &RequestOptions) -> Result<Response, Error> {
        let method = opts.parse_method()?;
        let headers = self.request_headers(opts)?;

        let mut cycle = Cycle::new(url, method, headers, opts.body.clone())?;
        cycle.follow_redirects(self.config.follow_redirects);
        cycle.redirect_auth_headers(self.config.redirect_auth_headers);

        loop {
            let parsed = cycle.send(&mut self.transport)?.proceed()?;

            let redirect = match parsed.proceed() {
                ParsedResult::Done(done) => return Ok(done.into_response()),
                ParsedResult::Redirecting(v) => v,
            };

            if redirect.redirects() >= self.config.max_redirects {
                return Err(Error::TooManyRedirects(self.config.max_redirects));
            }

            let status = redirect.status();
            let reason = redirect.response().head.status.clone().unwrap_or_default();
            let from = redirect.url().to_string();

            cycle = redirect.as_new_cycle()?;

            info!(
                "Redirecting [{} {}] {} => {}",
                status.as_u16(),
                reason,
                from,
                cycle.url()
            );
        }
    }
}
