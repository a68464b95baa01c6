//! Moving framed requests over the network.
//!
//! One exchange is one connection: connect, optionally wrap in TLS, write the
//! whole request, read until the peer closes, close.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::TransportErrorKind;
use crate::uri::UrlParts;
use crate::Error;

const READ_CHUNK: usize = 4096;

/// A way of performing one request/response exchange.
///
/// Implementations must release whatever connection they open before
/// returning, on success as well as on error.
pub trait Transport {
    /// Send `request` to the target and return every byte received until the peer closed.
    fn exchange(&mut self, url: &UrlParts, request: &[u8]) -> Result<Vec<u8>, Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, url: &UrlParts, request: &[u8]) -> Result<Vec<u8>, Error> {
        (**self).exchange(url, request)
    }
}

/// TCP transport, TLS wrapped for `https`.
///
/// Server certificates are verified against the Mozilla root set shipped in
/// `webpki-roots`, with SNI set to the target host. Protocol versions are
/// the rustls safe defaults (TLS 1.2 and 1.3).
#[derive(Debug, Default)]
pub struct TcpTransport {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    tls: Option<Arc<ClientConfig>>,
}

impl TcpTransport {
    /// Create a transport with the given timeouts. `None` blocks indefinitely.
    pub fn new(connect_timeout: Option<Duration>, read_timeout: Option<Duration>) -> Self {
        TcpTransport {
            connect_timeout: connect_timeout.filter(|d| !d.is_zero()),
            read_timeout: read_timeout.filter(|d| !d.is_zero()),
            tls: None,
        }
    }

    /// Use a prepared rustls config instead of the default one.
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    fn tls_config(&mut self) -> Result<Arc<ClientConfig>, Error> {
        if let Some(config) = &self.tls {
            return Ok(config.clone());
        }

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        let config = Arc::new(config);
        self.tls = Some(config.clone());

        Ok(config)
    }

    fn connect(&self, url: &UrlParts) -> Result<TcpStream, Error> {
        let host = url.connect_host();

        let addrs: Vec<SocketAddr> = (host, url.port)
            .to_socket_addrs()
            .map_err(|e| Error::transport(TransportErrorKind::Resolve, e))?
            .collect();

        if addrs.is_empty() {
            let e = io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", host));
            return Err(Error::transport(TransportErrorKind::Resolve, e));
        }

        let mut last_err = None;

        for addr in addrs {
            debug!("Connect {}", addr);

            let res = match self.connect_timeout {
                Some(t) => TcpStream::connect_timeout(&addr, t),
                None => TcpStream::connect(addr),
            };

            match res {
                Ok(sock) => return Ok(sock),
                Err(e) => {
                    debug!("Connect {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        let e = last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected));
        Err(Error::transport(TransportErrorKind::Connect, e))
    }

    fn exchange_tls(
        &mut self,
        url: &UrlParts,
        sock: TcpStream,
        request: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let config = self.tls_config()?;

        let host = url.connect_host();
        let name = ServerName::try_from(host.to_string()).map_err(|e| {
            Error::Tls(rustls::Error::General(format!("bad server name {}: {}", host, e)))
        })?;

        let conn = ClientConnection::new(config, name)?;
        let mut stream = StreamOwned::new(conn, sock);

        // Drive the handshake up front to tell its failures apart.
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| Error::from_io(TransportErrorKind::Connect, e))?;
        }

        debug!(
            "TLS established {:?} {:?}",
            stream.conn.protocol_version(),
            stream.conn.negotiated_cipher_suite().map(|s| s.suite())
        );

        let res = round_trip(&mut stream, request);

        stream.conn.send_close_notify();
        // The peer already closed, this is best effort.
        let _ = stream.conn.complete_io(&mut stream.sock);
        close(&stream.sock);

        res
    }
}

impl Transport for TcpTransport {
    fn exchange(&mut self, url: &UrlParts, request: &[u8]) -> Result<Vec<u8>, Error> {
        let mut sock = self.connect(url)?;

        sock.set_read_timeout(self.read_timeout)
            .and_then(|_| sock.set_write_timeout(self.read_timeout))
            .map_err(|e| Error::transport(TransportErrorKind::Connect, e))?;

        if url.scheme.is_tls() {
            return self.exchange_tls(url, sock, request);
        }

        let res = round_trip(&mut sock, request);
        close(&sock);

        res
    }
}

fn round_trip<S: Read + Write>(stream: &mut S, request: &[u8]) -> Result<Vec<u8>, Error> {
    trace!("Send {:?}", String::from_utf8_lossy(request));

    stream
        .write_all(request)
        .and_then(|_| stream.flush())
        .map_err(|e| Error::from_io(TransportErrorKind::Write, e))?;

    read_to_close(stream)
}

/// Read until end of stream.
fn read_to_close<R: Read>(r: &mut R) -> Result<Vec<u8>, Error> {
    let mut received = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK];

    loop {
        match r.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                trace!("Recv {} bytes", n);
                received.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // TLS peers that close without close_notify.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !received.is_empty() => {
                debug!("Peer closed without close_notify");
                break;
            }
            Err(e) => return Err(Error::from_io(TransportErrorKind::Read, e)),
        }
    }

    debug!("Received {} bytes", received.len());

    Ok(received)
}

fn close(sock: &TcpStream) {
    debug!("Close connection");
    // Already closed by the peer in the common case.
    let _ = sock.shutdown(Shutdown::Both);
}
