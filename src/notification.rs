use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Delivery priority forwarded to the gateway via `apns-priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Deliver immediately, waking the device if necessary.
    #[default]
    Immediate,
    /// Deliver at a time that conserves power on the device.
    Throttled,
}

impl Priority {
    pub const fn as_header(self) -> &'static str {
        match self {
            Self::Immediate => "10",
            Self::Throttled => "5",
        }
    }
}

/// Push category forwarded to the gateway via `apns-push-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushType {
    #[default]
    Alert,
    Background,
    Voip,
}

impl PushType {
    pub const fn as_header(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Background => "background",
            Self::Voip => "voip",
        }
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// The standard `aps` dictionary of a notification body.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
}

/// JSON body sent to the gateway: the `aps` dictionary plus any custom
/// top-level keys the application wants delivered alongside it.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Payload {
    pub aps: Aps,
    #[serde(flatten)]
    pub custom: serde_json::Map<String, Value>,
}

impl Payload {
    /// A visible alert payload with the given title and body.
    pub fn alert(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            aps: Aps {
                alert: Some(Alert { title: Some(title.into()), body: Some(body.into()) }),
                ..Aps::default()
            },
            custom: serde_json::Map::new(),
        }
    }

    /// A silent background-update payload (`content-available: 1`).
    #[must_use]
    pub fn background() -> Self {
        Self {
            aps: Aps { content_available: Some(1), ..Aps::default() },
            custom: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_badge(mut self, badge: u32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    #[must_use]
    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// One push message addressed to a device. Immutable once handed to the
/// client; the dispatch pipeline only reads it.
#[derive(Debug, Clone)]
pub struct Notification {
    pub device_token: String,
    pub payload: Payload,
    /// Topic for this notification; falls back to the client's default topic.
    pub topic: Option<String>,
    pub priority: Priority,
    pub push_type: PushType,
    /// Unix timestamp (seconds) after which the gateway discards the push.
    pub expiration: Option<u64>,
    /// Identifier under which the gateway coalesces superseded pushes.
    pub collapse_id: Option<String>,
    /// Caller-chosen canonical identifier, forwarded as `apns-id`.
    pub apns_id: Option<Uuid>,
}

impl Notification {
    pub fn new(device_token: impl Into<String>, payload: Payload) -> Self {
        Self {
            device_token: device_token.into(),
            payload,
            topic: None,
            priority: Priority::default(),
            push_type: PushType::default(),
            expiration: None,
            collapse_id: None,
            apns_id: None,
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_push_type(mut self, push_type: PushType) -> Self {
        self.push_type = push_type;
        self
    }

    #[must_use]
    pub const fn with_expiration(mut self, unix_secs: u64) -> Self {
        self.expiration = Some(unix_secs);
        self
    }

    #[must_use]
    pub fn with_collapse_id(mut self, collapse_id: impl Into<String>) -> Self {
        self.collapse_id = Some(collapse_id.into());
        self
    }

    #[must_use]
    pub const fn with_apns_id(mut self, apns_id: Uuid) -> Self {
        self.apns_id = Some(apns_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_headers() {
        assert_eq!(Priority::Immediate.as_header(), "10");
        assert_eq!(Priority::Throttled.as_header(), "5");
    }

    #[test]
    fn test_push_type_headers() {
        assert_eq!(PushType::Alert.as_header(), "alert");
        assert_eq!(PushType::Background.as_header(), "background");
        assert_eq!(PushType::Voip.as_header(), "voip");
    }

    #[test]
    fn test_alert_payload_shape() {
        let payload = Payload::alert("Hi", "There")
            .with_badge(3)
            .with_sound("default")
            .with_custom("thread", serde_json::json!("t-1"));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["aps"]["alert"]["title"], "Hi");
        assert_eq!(json["aps"]["alert"]["body"], "There");
        assert_eq!(json["aps"]["badge"], 3);
        assert_eq!(json["aps"]["sound"], "default");
        assert_eq!(json["thread"], "t-1");
    }

    #[test]
    fn test_background_payload_omits_alert() {
        let json = serde_json::to_value(Payload::background()).unwrap();
        assert_eq!(json["aps"]["content-available"], 1);
        assert!(json["aps"].get("alert").is_none());
        assert!(json["aps"].get("badge").is_none());
    }

    #[test]
    fn test_notification_defaults() {
        let n = Notification::new("abc123", Payload::alert("a", "b"));
        assert_eq!(n.priority, Priority::Immediate);
        assert_eq!(n.push_type, PushType::Alert);
        assert!(n.topic.is_none());
        assert!(n.expiration.is_none());
        assert!(n.collapse_id.is_none());
    }
}
