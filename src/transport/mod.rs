//! Connection plumbing for the gateway: the byte-stream seam sessions
//! handshake over, the session state machine, and the bounded pool.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub(crate) mod pool;
pub(crate) mod session;

/// Byte stream an HTTP/2 session can run over.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// Produces the byte stream a session performs its HTTP/2 handshake over.
/// The pool holds one connector and uses it for every session it creates.
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Io>>;
}

/// TLS connector for the real gateway: webpki roots, ALPN restricted to h2.
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    #[must_use]
    pub fn new() -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"h2".to_vec()];

        Self { inner: tokio_rustls::TlsConnector::from(Arc::new(config)) }
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TlsConnector")
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Io>> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Connection(format!("tcp connect to {host}:{port}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Connection(format!("set_nodelay: {e}")))?;

        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| Error::Connection(format!("invalid server name {host}: {e}")))?;

        let tls = self
            .inner
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::Connection(format!("tls handshake with {host}: {e}")))?;

        Ok(Box::new(tls))
    }
}

/// Plaintext connector speaking HTTP/2 with prior knowledge. Used by the
/// test suite and for gateways terminating TLS elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Io>> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Connection(format!("tcp connect to {host}:{port}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Connection(format!("set_nodelay: {e}")))?;
        Ok(Box::new(stream))
    }
}
