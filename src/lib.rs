//! A non-interactive HTTP(S) retriever.
//!
//! hget speaks just enough HTTP/1.1 to fetch a resource: it decomposes a
//! target into scheme, host, port and path, frames the request by hand, sends
//! it over a fresh TCP (or TLS) connection, reads until the server closes,
//! and splits what came back into a status line, headers and a body.
//! Redirects are followed up to a bound.
//!
//! Every request uses its own connection with `Connection: close`. The end of
//! the body is the end of the stream, so there is no support for
//! `transfer-encoding: chunked`, compression or keep-alive.
//!
//! ```no_run
//! use hget::client::{Client, Config, RequestOptions};
//!
//! let mut client = Client::new(Config::default());
//! let response = client.run("https://example.com", &RequestOptions::default())?;
//!
//! if let Some(code) = response.head.code {
//!     println!("{}", code);
//! }
//! # Ok::<_, hget::Error>(())
//! ```
//!
//! The pieces can be used on their own:
//!
//! * [`uri`] – splitting a URL into [`UrlParts`](uri::UrlParts)
//! * [`Headers`] – ordered, case insensitive header map
//! * [`frame_request`] / [`split_response`] / [`parse_response_head`] – wire format
//! * [`transport`] – one exchange over TCP/TLS
//! * [`client`] – the request cycle state machine and redirect loop

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod error;
pub use error::{Error, TransportErrorKind};

mod frame;
pub use frame::{decode_lossy, frame_request, parse_response, split_response};
pub use frame::{OutgoingRequest, Response, ResponseBody, UNSUPPORTED_ENCODING};

mod headers;
pub use headers::{parse_response_head, Headers, ResponseHead, MAX_RESPONSE_HEADERS};

pub mod client;
pub mod transport;
pub mod uri;

// Re-export the basis for this library.
pub use http;
