use crate::notification::Notification;
use serde::Deserialize;

/// Reason substituted when a non-200 response body cannot be parsed.
pub const UNKNOWN_ERROR_REASON: &str = "UnknownError";

/// Gateway reason indicating the cached provider token must be replaced.
pub const EXPIRED_PROVIDER_TOKEN: &str = "ExpiredProviderToken";

/// Successful delivery of one notification.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub notification: Notification,
    pub device_token: String,
    /// Canonical identifier echoed by the gateway, when present.
    pub apns_id: Option<String>,
}

/// Structured failure reported by the gateway for one notification.
#[derive(Debug, Clone)]
pub struct GatewayRejection {
    pub reason: String,
    pub status: u16,
    pub notification: Notification,
}

impl std::fmt::Display for GatewayRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.reason, self.status)
    }
}

/// Per-notification outcome in a batch aggregate.
pub type SendResult = Result<Delivered, crate::error::Error>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    reason: String,
}

/// Terminal, single-step classification of a gateway response.
pub(crate) fn classify(
    status: u16,
    body: &[u8],
    apns_id: Option<String>,
    notification: Notification,
) -> Result<Delivered, GatewayRejection> {
    if status == 200 {
        let device_token = notification.device_token.clone();
        return Ok(Delivered { notification, device_token, apns_id });
    }

    let reason = serde_json::from_slice::<ErrorBody>(body)
        .map_or_else(|_| UNKNOWN_ERROR_REASON.to_string(), |b| b.reason);

    Err(GatewayRejection { reason, status, notification })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Payload;

    fn notification() -> Notification {
        Notification::new("abc123", Payload::alert("t", "b"))
    }

    #[test]
    fn test_accepted_yields_delivery() {
        let outcome = classify(200, b"", Some("id-1".into()), notification()).unwrap();
        assert_eq!(outcome.device_token, "abc123");
        assert_eq!(outcome.notification.device_token, "abc123");
        assert_eq!(outcome.apns_id.as_deref(), Some("id-1"));
    }

    #[test]
    fn test_rejection_carries_reason_and_status() {
        let rejection =
            classify(410, br#"{"reason":"Unregistered"}"#, None, notification()).unwrap_err();
        assert_eq!(rejection.reason, "Unregistered");
        assert_eq!(rejection.status, 410);
        assert_eq!(rejection.notification.device_token, "abc123");
    }

    #[test]
    fn test_unparsable_body_falls_back_to_sentinel() {
        let rejection = classify(500, b"not json", None, notification()).unwrap_err();
        assert_eq!(rejection.reason, UNKNOWN_ERROR_REASON);
        assert_eq!(rejection.status, 500);
    }

    #[test]
    fn test_extra_error_fields_ignored() {
        let rejection = classify(
            400,
            br#"{"reason":"BadDeviceToken","timestamp":1700000000}"#,
            None,
            notification(),
        )
        .unwrap_err();
        assert_eq!(rejection.reason, "BadDeviceToken");
    }
}
