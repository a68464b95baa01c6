//! One request cycle, from target to response, following the [state graph][crate::client].

use std::fmt;
use std::marker::PhantomData;

use http::{Method, StatusCode};

use crate::frame::{frame_request, parse_response, OutgoingRequest, Response};
use crate::transport::Transport;
use crate::uri::{decompose, Scheme, UrlParts};
use crate::{Error, Headers};

#[doc(hidden)]
pub mod state {
    pub(crate) trait Named {
        fn name() -> &'static str;
    }

    macro_rules! cycle_state {
        ($n:tt) => {
            #[doc(hidden)]
            pub struct $n(());
            impl Named for $n {
                fn name() -> &'static str {
                    stringify!($n)
                }
            }
        };
    }

    cycle_state!(Initial);
    cycle_state!(Sent);
    cycle_state!(Parsed);
    cycle_state!(Redirecting);
    cycle_state!(Done);
}
use self::state::*;

/// Methods that do not warrant a warning.
fn is_standard_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::POST
            | Method::HEAD
            | Method::PUT
            | Method::DELETE
            | Method::OPTIONS
            | Method::CONNECT
            | Method::TRACE
            | Method::PATCH
    )
}

/// A request cycle in some state following the [state graph][crate::client]
pub struct Cycle<State> {
    inner: Inner,
    _ph: PhantomData<State>,
}

// pub(crate) for tests to inspect state
#[derive(Debug)]
pub(crate) struct Inner {
    pub url: UrlParts,
    pub method: Method,
    pub headers: Headers,
    pub body: String,
    pub follow_redirects: bool,
    pub redirect_auth_headers: RedirectAuthHeaders,
    pub redirects: usize,
    pub raw: Vec<u8>,
    pub response: Response,
}

impl Inner {
    fn status(&self) -> Option<StatusCode> {
        self.response.head.code
    }

    fn is_redirect(&self) -> bool {
        match self.status() {
            // 304 is a redirect code, but it has no location header and
            // thus we don't consider it a redirection.
            Some(v) => v.is_redirection() && v != StatusCode::NOT_MODIFIED,
            None => false,
        }
    }

    fn location(&self) -> Option<&str> {
        self.response.head.location()
    }
}

impl<S> Cycle<S> {
    fn wrap(inner: Inner) -> Cycle<S>
    where
        S: Named,
    {
        let wrapped = Cycle {
            inner,
            _ph: PhantomData,
        };

        debug!("{:?}", wrapped);

        wrapped
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    /// The current target.
    pub fn url(&self) -> &UrlParts {
        &self.inner.url
    }

    /// Number of redirects followed to get to this cycle.
    pub fn redirects(&self) -> usize {
        self.inner.redirects
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// INITIAL

impl Cycle<Initial> {
    /// Create a new cycle.
    ///
    /// Fails if the url cannot be decomposed or has an unsupported scheme.
    /// Non-standard methods are accepted with a warning.
    pub fn new(url: &str, method: Method, headers: Headers, body: String) -> Result<Self, Error> {
        let url = decompose(url)?;
        Ok(Self::from_parts(url, method, headers, body))
    }

    fn from_parts(url: UrlParts, method: Method, headers: Headers, body: String) -> Self {
        if !is_standard_method(&method) {
            warn!("Unrecognised method: {}, continuing anyway", method);
        }

        let inner = Inner {
            url,
            method,
            headers,
            body,
            follow_redirects: true,
            redirect_auth_headers: RedirectAuthHeaders::SameHost,
            redirects: 0,
            raw: Vec::new(),
            response: Response::default(),
        };

        Cycle::wrap(inner)
    }

    /// Inspect the method
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Inspect the headers sent with each attempt.
    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    /// Set a header for this and following attempts.
    pub fn header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.inner.headers.set(name, value)
    }

    /// Set whether 3xx responses lead to the `Redirecting` state.
    ///
    /// Defaults to `true`.
    pub fn follow_redirects(&mut self, v: bool) {
        self.inner.follow_redirects = v;
    }

    /// Set when the `Authorization` header survives a redirect.
    ///
    /// Defaults to [`RedirectAuthHeaders::SameHost`].
    pub fn redirect_auth_headers(&mut self, v: RedirectAuthHeaders) {
        self.inner.redirect_auth_headers = v;
    }

    /// The request for this attempt, with body headers added.
    pub fn request(&self) -> Result<OutgoingRequest, Error> {
        OutgoingRequest::new(
            self.inner.method.clone(),
            self.inner.url.clone(),
            self.inner.headers.clone(),
            self.inner.body.clone(),
        )
    }

    /// Frame the request and perform the exchange.
    ///
    /// Transport failures end the cycle, there is no retry.
    pub fn send<T: Transport>(mut self, transport: &mut T) -> Result<Cycle<Sent>, Error> {
        let request = self.request()?;
        let wire = frame_request(&request);

        let raw = transport.exchange(&self.inner.url, &wire)?;
        self.inner.raw = raw;

        Ok(Cycle::wrap(self.inner))
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// SENT

impl Cycle<Sent> {
    /// The bytes received for the request.
    pub fn raw(&self) -> &[u8] {
        &self.inner.raw
    }

    /// Split and parse the received bytes.
    pub fn proceed(mut self) -> Result<Cycle<Parsed>, Error> {
        let raw = std::mem::take(&mut self.inner.raw);
        self.inner.response = parse_response(&raw)?;

        Ok(Cycle::wrap(self.inner))
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// PARSED

impl Cycle<Parsed> {
    /// The parsed response.
    pub fn response(&self) -> &Response {
        &self.inner.response
    }

    /// Decide whether the response ends the cycle.
    ///
    /// It is final if there is no status line, the code is outside 3xx,
    /// following redirects is off, or there is no `Location` to follow.
    pub fn proceed(self) -> ParsedResult {
        if !self.inner.follow_redirects || !self.inner.is_redirect() {
            return ParsedResult::Done(Cycle::wrap(self.inner));
        }

        if self.inner.location().is_none() {
            warn!("Redirect status without location header, stopping");
            return ParsedResult::Done(Cycle::wrap(self.inner));
        }

        ParsedResult::Redirecting(Cycle::wrap(self.inner))
    }
}

/// The possible states after parsing a response.
///
/// See [state graph][crate::client]
pub enum ParsedResult {
    /// Follow the redirect.
    Redirecting(Cycle<Redirecting>),

    /// The response is final.
    Done(Cycle<Done>),
}

// //////////////////////////////////////////////////////////////////////////////////////////// REDIRECTING

impl Cycle<Redirecting> {
    /// The redirect status code.
    pub fn status(&self) -> StatusCode {
        // Only 3xx responses get here.
        self.inner.status().unwrap_or(StatusCode::FOUND)
    }

    /// The redirect response.
    pub fn response(&self) -> &Response {
        &self.inner.response
    }

    /// The raw `Location` header.
    pub fn location(&self) -> &str {
        self.inner.location().unwrap_or_default()
    }

    /// Construct the next cycle from the `Location` header.
    ///
    /// The method, body and headers carry over unchanged, except that
    /// `Authorization` is dropped according to [`RedirectAuthHeaders`].
    pub fn as_new_cycle(self) -> Result<Cycle<Initial>, Error> {
        let inner = self.inner;

        let location = inner.location().unwrap_or_default();
        let url = inner.url.resolve(location)?;

        let keep_auth_header = match inner.redirect_auth_headers {
            RedirectAuthHeaders::Never => false,
            RedirectAuthHeaders::SameHost => can_redirect_auth_header(&inner.url, &url),
        };

        let mut headers = inner.headers;
        if !keep_auth_header && headers.remove("authorization").is_some() {
            debug!("Drop authorization header for redirect to {}", url);
        }

        let mut next = Cycle::from_parts(url, inner.method, headers, inner.body);
        next.inner.follow_redirects = inner.follow_redirects;
        next.inner.redirect_auth_headers = inner.redirect_auth_headers;
        next.inner.redirects = inner.redirects + 1;

        Ok(next)
    }
}

fn can_redirect_auth_header(prev: &UrlParts, next: &UrlParts) -> bool {
    prev.host.eq_ignore_ascii_case(&next.host)
        && (prev.scheme == next.scheme || next.scheme == Scheme::Https)
}

/// Strategy for keeping `authorization` headers during redirects.
///
/// * `Never` never preserves `authorization` header in redirects.
/// * `SameHost` send the authorization header in redirects only if the host of the redirect is
///   the same of the previous request, and both use the same scheme (or switch to a more secure one, i.e
///   we can redirect from `http` to `https`, but not the reverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RedirectAuthHeaders {
    /// Never preserve the `authorization` header on redirect.
    Never,
    /// Preserve the `authorization` header when the redirect is to the same host. This is the default.
    SameHost,
}

// //////////////////////////////////////////////////////////////////////////////////////////// DONE

impl Cycle<Done> {
    /// The final response.
    pub fn response(&self) -> &Response {
        &self.inner.response
    }

    /// Take the final response.
    pub fn into_response(self) -> Response {
        self.inner.response
    }
}

// ////////////////////////////////////////////////////////////////////////////////////////////

impl<State: Named> fmt::Debug for Cycle<State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycle<{}>", State::name())
    }
}
