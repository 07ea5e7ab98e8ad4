use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::Connector;
use crate::transport::session::Session;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Debug)]
struct Metrics {
    sessions_opened: Counter<u64>,
    sessions_evicted: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("apns-client");
        Self {
            sessions_opened: meter
                .u64_counter("apns_sessions_opened_total")
                .with_description("Total gateway sessions established")
                .build(),
            sessions_evicted: meter
                .u64_counter("apns_sessions_evicted_total")
                .with_description("Total pooled sessions destroyed after failing liveness")
                .build(),
        }
    }
}

/// Bounded pool of gateway sessions. The sole owner of every session:
/// nothing else creates or destroys one. Lent + idle sessions never exceed
/// the configured maximum; callers at capacity suspend until a release.
#[derive(Debug)]
pub(crate) struct Pool {
    connector: Arc<dyn Connector>,
    host: String,
    port: u16,
    connect_timeout: Duration,
    idle_timeout: Duration,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<Session>>,
    closed: AtomicBool,
    metrics: Metrics,
}

/// A lent session plus the capacity permit backing it. Dropping a checkout
/// without releasing it destroys the session; only `release` re-pools one.
#[derive(Debug)]
pub(crate) struct Checkout {
    session: Option<Session>,
    _permit: OwnedSemaphorePermit,
}

impl Checkout {
    pub(crate) fn session(&mut self) -> &mut Session {
        self.session.as_mut().expect("checkout session already taken")
    }
}

impl Pool {
    pub(crate) fn new(connector: Arc<dyn Connector>, config: &ClientConfig) -> Self {
        Self {
            connector,
            host: config.gateway_host().to_string(),
            port: config.port,
            connect_timeout: config.connect_timeout,
            idle_timeout: config.idle_timeout,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Returns a ready session, reusing the most recently released idle one
    /// that passes its liveness check. Dead idle sessions are destroyed and
    /// replaced lazily: the replacement is only connected if no live idle
    /// session remains.
    pub(crate) async fn acquire(&self) -> Result<Checkout> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Shutdown)?;

        while let Some(session) = self.pop_idle() {
            if session.is_ready() {
                return Ok(Checkout { session: Some(session), _permit: permit });
            }
            tracing::debug!("evicting dead idle session");
            self.metrics.sessions_evicted.add(1, &[]);
            drop(session);
        }

        let session = Session::connect(
            self.connector.as_ref(),
            &self.host,
            self.port,
            self.connect_timeout,
            self.idle_timeout,
        )
        .await?;
        self.metrics.sessions_opened.add(1, &[]);

        Ok(Checkout { session: Some(session), _permit: permit })
    }

    /// Returns a session to the idle set. After `drain`, or when the session
    /// died while lent, it is destroyed instead.
    pub(crate) fn release(&self, mut checkout: Checkout) {
        if let Some(session) = checkout.session.take() {
            if !self.closed.load(Ordering::Acquire) && session.is_ready() {
                self.idle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(session);
            }
        }
    }

    /// Destroys every idle session and refuses further acquires. Sessions
    /// still lent out are destroyed when their checkouts resolve.
    pub(crate) fn drain(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn pop_idle(&self) -> Option<Session> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }
}
