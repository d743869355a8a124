//! Wire shapes for delivery events.

use chrono::Utc;
use tandem_turn::DeliveryEvent;
use uuid::Uuid;

/// Newline-delimited JSON for unary HTTP streaming responses.
pub fn to_line(event: &DeliveryEvent) -> String {
    let mut line = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failed"}"#.to_string());
    line.push('\n');
    line
}

/// Tagged JSON frame for WebSocket delivery: the event's own fields plus
/// `conversation_id` and `timestamp`.
pub fn to_frame(event: &DeliveryEvent, conversation_id: Uuid) -> String {
    let mut value = serde_json::to_value(event)
        .unwrap_or_else(|_| serde_json::json!({"type": "error", "message": "serialization failed"}));
    if let Some(obj) = value.as_object_mut() {
        obj.insert("conversation_id".to_string(), serde_json::json!(conversation_id));
        obj.insert("timestamp".to_string(), serde_json::json!(Utc::now()));
    }
    value.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn line_is_single_json_object_with_newline() {
        let event = DeliveryEvent::Content {
            message_id: Uuid::new_v4(),
            delta: "Hel".to_string(),
        };
        let line = to_line(&event);
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["type"], "content");
    }

    #[test]
    fn frame_carries_conversation_and_timestamp() {
        let cid = Uuid::new_v4();
        let event = DeliveryEvent::Error {
            message: "boom".to_string(),
        };
        let frame: serde_json::Value = serde_json::from_str(&to_frame(&event, cid)).unwrap();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["conversation_id"], cid.to_string());
        assert!(frame["timestamp"].is_string());
    }
}
