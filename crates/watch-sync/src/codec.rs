//! Event decoder and control message encoder
//!
//! Every inbound frame is self-describing: a `type` tag, a watcher `key`
//! and variant-specific fields. Decoding is pure and stateless, and a
//! malformed frame yields a [`DecodeError`] value instead of tearing the
//! stream down.
//!
//! Row fields use the producer's names (`isRunning`, `queue`,
//! `handledEventCount`, `unhandledEventCount`, `events`,
//! `lastEventTimestamp`). `isRunning` may be a boolean or an integer,
//! where any non-zero value means running.

use crate::error::DecodeError;
use crate::model::{ControlMessage, WatcherDelta, WatcherEvent, WatcherKey, WatcherState};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// One inbound websocket data frame, shared between subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl RawFrame {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        RawFrame::Text(text.into())
    }

    /// Payload size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            RawFrame::Text(text) => text.len(),
            RawFrame::Binary(bytes) => bytes.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotFrame {
    key: WatcherKey,
    state: WireState,
}

#[derive(Debug, Deserialize)]
struct DeltaFrame {
    key: WatcherKey,
    fields: WireDelta,
}

#[derive(Debug, Deserialize)]
struct RemovedFrame {
    key: WatcherKey,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum RunningFlag {
    Flag(bool),
    Count(i64),
}

impl RunningFlag {
    fn is_running(self) -> bool {
        match self {
            RunningFlag::Flag(flag) => flag,
            RunningFlag::Count(count) => count != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireState {
    is_running: RunningFlag,
    #[serde(default)]
    queue: bool,
    #[serde(default)]
    handled_event_count: u64,
    #[serde(default)]
    unhandled_event_count: u64,
    events: Option<u64>,
    last_event_timestamp: Option<DateTime<Utc>>,
}

impl WireState {
    fn into_state(self, key: WatcherKey) -> Result<WatcherState, DecodeError> {
        let total = self
            .handled_event_count
            .checked_add(self.unhandled_event_count)
            .ok_or_else(|| DecodeError::CountOverflow(key.clone()))?;

        if let Some(events) = self.events {
            if events != total {
                return Err(DecodeError::InconsistentCounts {
                    key,
                    handled: self.handled_event_count,
                    unhandled: self.unhandled_event_count,
                    events,
                });
            }
        }

        Ok(WatcherState {
            key,
            running: self.is_running.is_running(),
            queue_non_empty: self.queue,
            handled_event_count: self.handled_event_count,
            unhandled_event_count: self.unhandled_event_count,
            last_event_at: self.last_event_timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDelta {
    is_running: Option<RunningFlag>,
    queue: Option<bool>,
    handled_event_count: Option<u64>,
    unhandled_event_count: Option<u64>,
    events: Option<u64>,
    last_event_timestamp: Option<DateTime<Utc>>,
}

impl WireDelta {
    fn into_delta(self, key: &WatcherKey) -> Result<WatcherDelta, DecodeError> {
        let delta = WatcherDelta {
            running: self.is_running.map(RunningFlag::is_running),
            queue_non_empty: self.queue,
            handled_event_count: self.handled_event_count,
            unhandled_event_count: self.unhandled_event_count,
            total_event_count: self.events,
            last_event_at: self.last_event_timestamp,
        };

        if delta.is_empty() {
            return Err(DecodeError::EmptyDelta(key.clone()));
        }

        // Only checkable here when the delta carries all three counters;
        // partial updates are checked by the table after merging.
        if let (Some(handled), Some(unhandled)) =
            (delta.handled_event_count, delta.unhandled_event_count)
        {
            let total = handled
                .checked_add(unhandled)
                .ok_or_else(|| DecodeError::CountOverflow(key.clone()))?;
            if let Some(events) = delta.total_event_count {
                if events != total {
                    return Err(DecodeError::InconsistentCounts {
                        key: key.clone(),
                        handled,
                        unhandled,
                        events,
                    });
                }
            }
        }

        Ok(delta)
    }
}

/// Decode one text frame into a watcher event.
pub fn decode(raw: &str) -> Result<WatcherEvent, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::InvalidJson)?;

    let tag = match &value {
        Value::Object(map) => match map.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(DecodeError::UnknownVariant(other.to_string())),
            None => return Err(DecodeError::MissingTag),
        },
        _ => return Err(DecodeError::NotAnObject),
    };

    match tag.as_str() {
        "snapshot" => {
            let frame: SnapshotFrame = payload(&tag, value)?;
            validate_key(&frame.key)?;
            frame.state.into_state(frame.key).map(WatcherEvent::Snapshot)
        }
        "delta" => {
            let frame: DeltaFrame = payload(&tag, value)?;
            validate_key(&frame.key)?;
            let fields = frame.fields.into_delta(&frame.key)?;
            Ok(WatcherEvent::Delta {
                key: frame.key,
                fields,
            })
        }
        "removed" => {
            let frame: RemovedFrame = payload(&tag, value)?;
            validate_key(&frame.key)?;
            Ok(WatcherEvent::Removed(frame.key))
        }
        _ => Err(DecodeError::UnknownVariant(tag)),
    }
}

/// Decode a raw websocket frame. Binary frames must carry UTF-8 JSON.
pub fn decode_frame(frame: &RawFrame) -> Result<WatcherEvent, DecodeError> {
    match frame {
        RawFrame::Text(text) => decode(text),
        RawFrame::Binary(bytes) => decode(std::str::from_utf8(bytes)?),
    }
}

/// Encode an outbound control message as a JSON text frame.
pub fn encode(message: &ControlMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

fn payload<T: DeserializeOwned>(variant: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload {
        variant: variant.to_string(),
        source,
    })
}

fn validate_key(key: &WatcherKey) -> Result<(), DecodeError> {
    if key.resource.trim().is_empty() {
        return Err(DecodeError::InvalidKey(format!(
            "resource must not be empty (namespace {:?})",
            key.namespace
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ControlAction;

    #[test]
    fn test_decode_snapshot_with_producer_fields() {
        let raw = r#"{
            "type": "snapshot",
            "key": {"namespace": "", "resource": "v1.Pod"},
            "state": {
                "isRunning": true,
                "queue": true,
                "handledEventCount": 5,
                "unhandledEventCount": 2,
                "events": 7,
                "lastEventTimestamp": "2024-03-01T12:00:00Z"
            }
        }"#;

        let event = decode(raw).unwrap();
        let WatcherEvent::Snapshot(state) = event else {
            panic!("expected snapshot, got {:?}", event);
        };
        assert_eq!(state.key, WatcherKey::cluster("v1.Pod"));
        assert!(state.running);
        assert!(state.queue_non_empty);
        assert_eq!(state.handled_event_count, 5);
        assert_eq!(state.unhandled_event_count, 2);
        assert_eq!(state.total_event_count(), 7);
        assert_eq!(
            state.last_event_at.unwrap().to_rfc3339(),
            "2024-03-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_decode_snapshot_integer_running_flag() {
        let running = r#"{"type":"snapshot","key":{"namespace":"default","resource":"v1.Pod"},"state":{"isRunning":2}}"#;
        let stopped = r#"{"type":"snapshot","key":{"namespace":"default","resource":"v1.Pod"},"state":{"isRunning":0}}"#;

        match decode(running).unwrap() {
            WatcherEvent::Snapshot(state) => {
                assert!(state.running);
                assert_eq!(state.total_event_count(), 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match decode(stopped).unwrap() {
            WatcherEvent::Snapshot(state) => assert!(!state.running),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_delta() {
        let raw = r#"{"type":"delta","key":{"namespace":"","resource":"v1.Pod"},"fields":{"isRunning":false}}"#;
        assert_eq!(
            decode(raw).unwrap(),
            WatcherEvent::Delta {
                key: WatcherKey::cluster("v1.Pod"),
                fields: WatcherDelta {
                    running: Some(false),
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_decode_removed_defaults_namespace() {
        let raw = r#"{"type":"removed","key":{"resource":"apps.v1.Deployment"}}"#;
        assert_eq!(
            decode(raw).unwrap(),
            WatcherEvent::Removed(WatcherKey::cluster("apps.v1.Deployment"))
        );
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(matches!(decode("not json"), Err(DecodeError::InvalidJson(_))));
        assert!(matches!(decode("[1, 2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(
            decode(r#"{"key":{"resource":"v1.Pod"}}"#),
            Err(DecodeError::MissingTag)
        ));
        assert!(matches!(
            decode(r#"{"type":"resync","key":{"resource":"v1.Pod"}}"#),
            Err(DecodeError::UnknownVariant(tag)) if tag == "resync"
        ));
        assert!(matches!(
            decode(r#"{"type":"removed"}"#),
            Err(DecodeError::InvalidPayload { variant, .. }) if variant == "removed"
        ));
        assert!(matches!(
            decode(r#"{"type":"removed","key":{"namespace":"default","resource":" "}}"#),
            Err(DecodeError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_decode_rejects_negative_counts() {
        let raw = r#"{"type":"snapshot","key":{"resource":"v1.Pod"},"state":{"isRunning":true,"handledEventCount":-1}}"#;
        assert!(matches!(
            decode(raw),
            Err(DecodeError::InvalidPayload { variant, .. }) if variant == "snapshot"
        ));
    }

    #[test]
    fn test_decode_rejects_inconsistent_snapshot_total() {
        let raw = r#"{"type":"snapshot","key":{"resource":"v1.Pod"},"state":{"isRunning":true,"handledEventCount":5,"unhandledEventCount":1,"events":9}}"#;
        match decode(raw) {
            Err(DecodeError::InconsistentCounts {
                handled,
                unhandled,
                events,
                ..
            }) => {
                assert_eq!((handled, unhandled, events), (5, 1, 9));
            }
            other => panic!("expected inconsistent counts, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_empty_delta() {
        let raw = r#"{"type":"delta","key":{"resource":"v1.Pod"},"fields":{}}"#;
        assert!(matches!(decode(raw), Err(DecodeError::EmptyDelta(_))));
    }

    #[test]
    fn test_decode_binary_frame() {
        let ok = RawFrame::Binary(Arc::from(
            br#"{"type":"removed","key":{"resource":"v1.Pod"}}"#.as_slice(),
        ));
        assert!(decode_frame(&ok).is_ok());

        let bad = RawFrame::Binary(Arc::from([0xff_u8, 0xfe, 0xfd].as_slice()));
        assert!(matches!(decode_frame(&bad), Err(DecodeError::InvalidUtf8(_))));
    }

    #[test]
    fn test_encode_control_message() {
        let message = ControlMessage::new(ControlAction::Stop, WatcherKey::new("default", "v1.Pod"));
        let encoded: Value = serde_json::from_str(&encode(&message).unwrap()).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({
                "action": "stop",
                "key": {"namespace": "default", "resource": "v1.Pod"}
            })
        );
    }
}
