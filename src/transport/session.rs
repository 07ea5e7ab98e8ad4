use crate::error::{Error, Result};
use crate::transport::Connector;
use bytes::{Bytes, BytesMut};
use http::Request;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// One multiplexed HTTP/2 connection to the gateway.
///
/// Every terminal transport event (peer close, protocol error, goaway,
/// socket error) resolves the spawned driver task, which is the single place
/// the ready flag is lowered besides [`destroy`](Self::destroy). The pool
/// reads the flag at acquire time instead of probing the network.
pub(crate) struct Session {
    send_request: h2::client::SendRequest<Bytes>,
    ready: Arc<AtomicBool>,
    driver: JoinHandle<()>,
    idle_since: Instant,
    idle_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ready", &self.ready.load(Ordering::Acquire))
            .field("idle_secs", &self.idle_since.elapsed().as_secs())
            .finish()
    }
}

impl Session {
    /// Establishes the connection and performs the HTTP/2 handshake within
    /// `connect_timeout`. On failure nothing is left behind; the half-open
    /// socket is dropped with the error.
    pub(crate) async fn connect(
        connector: &dyn Connector,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self> {
        let io = tokio::time::timeout(connect_timeout, connector.connect(host, port))
            .await
            .map_err(|_| Error::Timeout)??;

        let (send_request, connection) =
            tokio::time::timeout(connect_timeout, h2::client::handshake(io))
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(|e| Error::Connection(format!("h2 handshake with {host}: {e}")))?;

        let ready = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&ready);
        let driver = tokio::spawn(
            async move {
                if let Err(e) = connection.await {
                    tracing::debug!(error = %e, "gateway connection terminated");
                }
                flag.store(false, Ordering::Release);
            }
            .instrument(tracing::debug_span!("session_driver", %host)),
        );

        tracing::debug!(%host, port, "gateway session established");
        Ok(Self { send_request, ready, driver, idle_since: Instant::now(), idle_timeout })
    }

    /// Usable for new request streams. False once any terminal event fired
    /// or the session has sat idle past its timeout.
    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && self.idle_since.elapsed() < self.idle_timeout
    }

    /// Opens one request stream, writes headers and body, and returns a
    /// handle to the in-flight exchange. The stream's lifetime is tied to
    /// the connection, not to this session handle, so the caller may return
    /// the session to the pool before awaiting the response.
    pub(crate) async fn begin(&mut self, head: Request<()>, body: Bytes) -> Result<InFlight> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(Error::Connection("session is not ready".into()));
        }

        // Waits for stream capacity on the shared connection.
        let mut sender = self.send_request.clone().ready().await?;

        let end_of_stream = body.is_empty();
        let (response, mut stream) = sender.send_request(head, end_of_stream)?;
        if !end_of_stream {
            stream.send_data(body, true)?;
        }

        self.idle_since = Instant::now();
        Ok(InFlight { response })
    }

    /// Idempotent teardown; aborting the driver drops the connection and any
    /// socket it holds, including one still mid-handshake.
    pub(crate) fn destroy(&self) {
        self.ready.store(false, Ordering::Release);
        self.driver.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// One request stream already written to the wire, awaiting its response.
#[derive(Debug)]
pub(crate) struct InFlight {
    response: h2::client::ResponseFuture,
}

impl InFlight {
    /// Resolves with the response status, echoed `apns-id` header and body.
    /// On timeout the future is dropped, which resets the stream rather than
    /// leaving it to starve the connection.
    pub(crate) async fn response(self, timeout: Duration) -> Result<(u16, Option<String>, Bytes)> {
        tokio::time::timeout(timeout, self.collect()).await.map_err(|_| Error::Timeout)?
    }

    async fn collect(self) -> Result<(u16, Option<String>, Bytes)> {
        let response = self.response.await?;
        let status = response.status().as_u16();
        let apns_id = response
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let mut body = response.into_body();
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk?;
            let _ = body.flow_control().release_capacity(chunk.len());
            buf.extend_from_slice(&chunk);
        }

        Ok((status, apns_id, buf.freeze()))
    }
}
