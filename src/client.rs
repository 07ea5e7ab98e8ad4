use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventBus};
use crate::notification::Notification;
use crate::response::{Delivered, EXPIRED_PROVIDER_TOKEN, SendResult, classify};
use crate::token::TokenManager;
use crate::transport::pool::Pool;
use crate::transport::{Connector, TlsConnector};
use bytes::Bytes;
use http::Request;
use opentelemetry::metrics::Counter;
use opentelemetry::{KeyValue, global};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    sent: Counter<u64>,
    failed: Counter<u64>,
    token_rotations: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("apns-client");
        Self {
            sent: meter
                .u64_counter("apns_sent_total")
                .with_description("Total notifications accepted by the gateway")
                .build(),
            failed: meter
                .u64_counter("apns_failed_total")
                .with_description("Total notifications rejected or failed in transport")
                .build(),
            token_rotations: meter
                .u64_counter("apns_token_rotations_total")
                .with_description("Total scheduled provider token rotations")
                .build(),
        }
    }
}

/// Entry point for sending notifications to the gateway.
///
/// Owns the connection pool, the provider-token cache and the rotation task
/// keeping it fresh. Cheap to share behind an `Arc`; all send paths take
/// `&self`.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    pool: Arc<Pool>,
    token: Arc<TokenManager>,
    events: Arc<EventBus>,
    shutdown_tx: watch::Sender<bool>,
    rotation: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    metrics: Metrics,
}

impl Client {
    /// Builds a client for the configured gateway endpoint over TLS.
    ///
    /// # Errors
    /// Returns `Error::Config` when a required field is missing or invalid;
    /// nothing is connected or spawned in that case.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(TlsConnector::new()))
    }

    /// Builds a client dialing through the given connector. Tests and
    /// TLS-terminating proxies use this with [`TcpConnector`](crate::transport::TcpConnector).
    ///
    /// # Errors
    /// Returns `Error::Config` when a required field is missing or invalid.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        let token = Arc::new(TokenManager::new(
            config.team_id.clone(),
            config.key_id.clone(),
            config.signing_key.clone(),
        ));
        let events = Arc::new(EventBus::new(config.event_channel_capacity));
        let pool = Arc::new(Pool::new(connector, &config));
        let metrics = Metrics::new();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rotation = Self::spawn_rotation(
            Arc::clone(&token),
            Arc::clone(&events),
            metrics.clone(),
            config.token_refresh_interval,
            shutdown_rx,
        );

        Ok(Self {
            config,
            pool,
            token,
            events,
            shutdown_tx,
            rotation: tokio::sync::Mutex::new(Some(rotation)),
            metrics,
        })
    }

    fn spawn_rotation(
        token: Arc<TokenManager>,
        events: Arc<EventBus>,
        metrics: Metrics,
        interval: std::time::Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick completes immediately; the token is signed
                // lazily on first use instead.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            match token.reset() {
                                Ok(_) => {
                                    metrics.token_rotations.add(1, &[]);
                                    tracing::debug!("provider token rotated");
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "scheduled token rotation failed");
                                    events.emit(ClientEvent::SigningFailed { detail: e.to_string() });
                                }
                            }
                        }
                        changed = shutdown_rx.changed() => {
                            // A dropped sender means the client is gone.
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            }
            .instrument(tracing::debug_span!("token_rotation")),
        )
    }

    /// Sends one notification and resolves with its terminal outcome.
    ///
    /// # Errors
    /// `Error::Gateway` when the gateway rejects the notification, or a
    /// transport/timeout error scoped to this send. Nothing is retried.
    pub async fn send(&self, notification: &Notification) -> Result<Delivered> {
        self.dispatch(notification.clone()).await
    }

    /// Fans out all notifications concurrently and joins on completion.
    /// One failed member never aborts its siblings; the aggregate preserves
    /// input order and always has the same length as the input.
    pub async fn send_many(&self, notifications: &[Notification]) -> Vec<SendResult> {
        futures::future::join_all(notifications.iter().map(|n| self.dispatch(n.clone()))).await
    }

    /// Sends one notification to each of the given device tokens.
    pub async fn send_to_many(
        &self,
        notification: &Notification,
        device_tokens: &[String],
    ) -> Vec<SendResult> {
        let sends = device_tokens.iter().map(|device_token| {
            let mut each = notification.clone();
            each.device_token.clone_from(device_token);
            self.dispatch(each)
        });
        futures::future::join_all(sends).await
    }

    /// Subscribes to every error condition observable on this client.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe_all()
    }

    /// Subscribes to one gateway reason (or [`INVALID_SIGNING_KEY`](crate::events::INVALID_SIGNING_KEY)).
    pub fn subscribe_reason(&self, reason: &str) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe(reason)
    }

    /// Stops the rotation task and destroys every pooled session. Subsequent
    /// sends fail with `Error::Shutdown`. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.pool.drain();
        if let Some(handle) = self.rotation.lock().await.take() {
            let _ = handle.await;
        }
        tracing::debug!("client shut down");
    }

    #[tracing::instrument(
        skip(self, notification),
        fields(device_token = %notification.device_token)
    )]
    async fn dispatch(&self, notification: Notification) -> Result<Delivered> {
        let body = Bytes::from(serde_json::to_vec(&notification.payload)?);
        let head = self.build_head(&notification)?;

        let mut checkout = self.pool.acquire().await?;
        let in_flight = match checkout.session().begin(head, body).await {
            Ok(in_flight) => {
                // The stream now lives on the connection independently of
                // the checkout; hand the session back so sibling sends can
                // multiplex onto it while we wait.
                self.pool.release(checkout);
                in_flight
            }
            // Dropping the checkout destroys the session instead of
            // returning a broken one to the pool.
            Err(e) => {
                self.metrics.failed.add(1, &[KeyValue::new("reason", "transport")]);
                return Err(e);
            }
        };

        let (status, apns_id, response_body) =
            in_flight.response(self.config.request_timeout).await.inspect_err(|_| {
                self.metrics.failed.add(1, &[KeyValue::new("reason", "transport")]);
            })?;

        match classify(status, &response_body, apns_id, notification) {
            Ok(delivered) => {
                self.metrics.sent.add(1, &[]);
                tracing::debug!("notification accepted by gateway");
                Ok(delivered)
            }
            Err(rejection) => {
                tracing::warn!(
                    reason = %rejection.reason,
                    status = rejection.status,
                    "gateway rejected notification"
                );
                self.metrics
                    .failed
                    .add(1, &[KeyValue::new("reason", rejection.reason.clone())]);

                // React before surfacing so the next send cannot reuse the
                // stale credential.
                if rejection.reason == EXPIRED_PROVIDER_TOKEN
                    && let Err(e) = self.token.reset()
                {
                    self.events.emit(ClientEvent::SigningFailed { detail: e.to_string() });
                }

                self.events.emit(ClientEvent::Rejected {
                    reason: rejection.reason.clone(),
                    status: rejection.status,
                    notification: rejection.notification.clone(),
                });

                Err(Error::Gateway(rejection))
            }
        }
    }

    fn build_head(&self, notification: &Notification) -> Result<Request<()>> {
        let path = format!("/3/device/{}", urlencoding::encode(&notification.device_token));
        let mut builder = Request::builder()
            .method(http::Method::POST)
            .uri(format!("https://{}:{}{path}", self.config.gateway_host(), self.config.port))
            .header("apns-push-type", notification.push_type.as_header())
            .header("apns-priority", notification.priority.as_header());

        match self.token.provider_token() {
            Ok(token) => {
                builder = builder.header(http::header::AUTHORIZATION, format!("bearer {token}"));
            }
            Err(e) => {
                // The gateway will reject the unauthenticated send; that
                // rejection is the caller's failure outcome.
                tracing::error!(error = %e, "no provider token available, sending without credential");
                self.events.emit(ClientEvent::SigningFailed { detail: e.to_string() });
            }
        }

        if let Some(topic) =
            notification.topic.as_deref().or(self.config.default_topic.as_deref())
        {
            builder = builder.header("apns-topic", topic);
        }
        if let Some(expiration) = notification.expiration {
            builder = builder.header("apns-expiration", expiration);
        }
        if let Some(collapse_id) = notification.collapse_id.as_deref() {
            builder = builder.header("apns-collapse-id", collapse_id);
        }
        if let Some(apns_id) = notification.apns_id {
            builder = builder.header("apns-id", apns_id.to_string());
        }

        builder
            .body(())
            .map_err(|e| Error::Config(format!("invalid request parts: {e}")))
    }
}
