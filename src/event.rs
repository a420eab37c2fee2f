//! Bus event model and classification
//!
//! Events arrive from the message bus as an envelope (routing header plus
//! body). The body carries origin metadata and a free-form key/value payload.
//! All payload accessors fail soft: a missing or mistyped field yields the
//! default (`false`, empty string, `None`) instead of an error, so malformed
//! producers can never crash classification.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::deployment::DeploymentInfo;

/// Payload keys understood by the classifier
pub const KEY_TYPE: &str = "type";
pub const KEY_ACTION: &str = "action";
pub const KEY_ALARM_LEVEL: &str = "alarm_level";
pub const KEY_CATEGORY: &str = "category";
pub const KEY_MESSAGE: &str = "message";
pub const KEY_DEPLOYMENT: &str = "deployment";

const TYPE_ALARM: &str = "ALARM";
const ACTION_PROCESS_STARTUP: &str = "PROCESS_STARTUP";
const ACTION_PROCESS_SHUTDOWN: &str = "PROCESS_SHUTDOWN";

/// Header logic codes: only notify events reach the relay pipeline,
/// measure events are consumed and dropped.
pub const LOGIC_NOTIFY: i32 = 1;
pub const LOGIC_MEASURE: i32 = 2;

/// Envelope routing header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHeader {
    pub application_code: i32,
    pub logic: i32,
}

/// A bus message: routing header + event body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub header: EventHeader,
    pub body: Event,
}

/// A decoded operational event. Logically immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event time in epoch milliseconds
    pub event_time: i64,
    /// Free-form payload (type, action, alarm_level, category, message, ...)
    pub message: serde_json::Map<String, serde_json::Value>,
    pub package_group: String,
    pub package_host: String,
    pub package_name: String,
    pub package_process: String,
    #[serde(default)]
    pub package_profile: String,
}

/// Alarm severity carried in the `alarm_level` payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmLevel {
    Warn,
    Minor,
    Major,
}

impl AlarmLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WARN" => Some(AlarmLevel::Warn),
            "MINOR" => Some(AlarmLevel::Minor),
            "MAJOR" => Some(AlarmLevel::Major),
            _ => None,
        }
    }
}

impl Event {
    fn payload_str(&self, key: &str) -> &str {
        self.message.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }

    /// True iff the payload `type` field equals the literal "ALARM"
    pub fn is_alarm(&self) -> bool {
        self.payload_str(KEY_TYPE) == TYPE_ALARM
    }

    pub fn is_process_startup(&self) -> bool {
        self.payload_str(KEY_ACTION) == ACTION_PROCESS_STARTUP
    }

    pub fn is_process_shutdown(&self) -> bool {
        self.payload_str(KEY_ACTION) == ACTION_PROCESS_SHUTDOWN
    }

    /// True for process lifecycle notices (startup or shutdown)
    pub fn is_process_lifecycle(&self) -> bool {
        self.is_process_startup() || self.is_process_shutdown()
    }

    /// Payload `category` if present and string-typed, else empty
    pub fn category(&self) -> &str {
        self.payload_str(KEY_CATEGORY)
    }

    /// Payload `message` text if present and string-typed, else empty
    pub fn message_text(&self) -> &str {
        self.payload_str(KEY_MESSAGE)
    }

    pub fn alarm_level(&self) -> Option<AlarmLevel> {
        AlarmLevel::parse(self.payload_str(KEY_ALARM_LEVEL))
    }

    /// The six-field footprint that identifies "the same logical event"
    fn footprint(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}.{}",
            self.package_group,
            self.package_host,
            self.package_name,
            self.package_process,
            self.package_profile,
            self.message_text()
        )
    }

    /// Deterministic SHA-256 digest of the footprint, used as the dedup key.
    ///
    /// Pure function: identical footprint fields always yield the same hex
    /// digest, across process restarts. Changing any single field (even a
    /// trailing period in the message text) changes the digest.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.footprint().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Decode the embedded deployment info, if any.
    ///
    /// Attached only to process-startup alarms; any decode failure is logged
    /// and treated as absent.
    pub fn deployment(&self) -> Option<DeploymentInfo> {
        let value = self.message.get(KEY_DEPLOYMENT)?;
        match serde_json::from_value(value.clone()) {
            Ok(dep) => Some(dep),
            Err(e) => {
                warn!(error = %e, "fail to decode deployment payload");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(msg: &str) -> Event {
        let mut payload = serde_json::Map::new();
        payload.insert(KEY_MESSAGE.into(), serde_json::json!(msg));
        payload.insert(KEY_TYPE.into(), serde_json::json!("ALARM"));
        payload.insert(KEY_ALARM_LEVEL.into(), serde_json::json!("MAJOR"));
        Event {
            event_time: 1542153888000,
            message: payload,
            package_group: "test_group".to_string(),
            package_host: "test_host".to_string(),
            package_name: "default".to_string(),
            package_process: "test".to_string(),
            package_profile: "local".to_string(),
        }
    }

    #[test]
    fn test_alarm_classification() {
        let event = sample_event("disk full");
        assert!(event.is_alarm());
        assert_eq!(event.alarm_level(), Some(AlarmLevel::Major));

        let mut not_alarm = sample_event("ok");
        not_alarm.message.insert(KEY_TYPE.into(), serde_json::json!("EVENT"));
        assert!(!not_alarm.is_alarm());
    }

    #[test]
    fn test_lifecycle_classification() {
        let mut event = sample_event("process started");
        event
            .message
            .insert(KEY_ACTION.into(), serde_json::json!("PROCESS_STARTUP"));
        assert!(event.is_process_startup());
        assert!(event.is_process_lifecycle());
        assert!(!event.is_process_shutdown());

        event
            .message
            .insert(KEY_ACTION.into(), serde_json::json!("PROCESS_SHUTDOWN"));
        assert!(event.is_process_shutdown());
        assert!(event.is_process_lifecycle());
    }

    #[test]
    fn test_missing_fields_fail_soft() {
        let event = Event {
            event_time: 0,
            message: serde_json::Map::new(),
            package_group: "g".to_string(),
            package_host: "h".to_string(),
            package_name: "n".to_string(),
            package_process: "p".to_string(),
            package_profile: String::new(),
        };
        assert!(!event.is_alarm());
        assert!(!event.is_process_lifecycle());
        assert_eq!(event.category(), "");
        assert_eq!(event.message_text(), "");
        assert!(event.alarm_level().is_none());
        assert!(event.deployment().is_none());
    }

    #[test]
    fn test_mistyped_fields_fail_soft() {
        let mut event = sample_event("x");
        event.message.insert(KEY_CATEGORY.into(), serde_json::json!(42));
        event.message.insert(KEY_MESSAGE.into(), serde_json::json!(["a"]));
        assert_eq!(event.category(), "");
        assert_eq!(event.message_text(), "");
    }

    #[test]
    fn test_fingerprint_is_pure() {
        let a = sample_event("sample process shutdowned");
        let b = sample_event("sample process shutdowned");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_sensitive_to_message_text() {
        // Differ only by a trailing period: must hash differently
        let a = sample_event("sample process shutdowned");
        let b = sample_event("sample process shutdowned.");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_sensitive_to_origin_fields() {
        let a = sample_event("same message");
        let mut b = sample_event("same message");
        b.package_host = "other_host".to_string();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_envelope_decoding() {
        let json = r#"{
            "header": {"application_code": 1, "logic": 1},
            "body": {
                "event_time": 1542153888000,
                "message": {"type": "ALARM", "message": "disk full"},
                "package_group": "g",
                "package_host": "h",
                "package_name": "default",
                "package_process": "p"
            }
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.header.logic, LOGIC_NOTIFY);
        assert!(envelope.body.is_alarm());
        assert_eq!(envelope.body.package_profile, "");
    }
}
