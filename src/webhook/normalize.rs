use serde_json::Value;

/// Envelope keys that wrap an inner `message` one level deeper (spec §4.E). The
/// spec's list differs from the pre-distillation original's `unwrap()` helper by
/// one entry ("edited"), which is included here per the spec's explicit instruction.
const WRAPPER_KEYS: &[&str] = &[
    "ephemeralMessage",
    "viewOnceMessage",
    "viewOnceMessageV2",
    "documentWithCaptionMessage",
    "editedMessage",
];

/// Recursively descends into nested envelope wrappers until none remain, returning
/// the innermost `message` object.
pub fn unwrap_message<'a>(mut message: &'a Value) -> &'a Value {
    loop {
        let mut descended = false;
        for key in WRAPPER_KEYS {
            if let Some(inner) = message.get(*key).and_then(|w| w.get("message")) {
                message = inner;
                descended = true;
                break;
            }
        }
        if !descended {
            return message;
        }
    }
}

/// Effective text by priority: `conversation` -> `extendedTextMessage.text` ->
/// `<Type>Message.caption` -> `data.content` -> "" (spec §4.E).
pub fn extract_content(message: &Value, fallback_content: Option<&str>) -> String {
    if let Some(text) = message.get("conversation").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(text) = message.pointer("/extendedTextMessage/text").and_then(Value::as_str) {
        return text.to_string();
    }
    for key in ["imageMessage", "videoMessage", "documentMessage"] {
        if let Some(caption) = message.pointer(&format!("/{}/caption", key)).and_then(Value::as_str) {
            return caption.to_string();
        }
    }
    fallback_content.unwrap_or("").to_string()
}

/// Type by first match among image/video/audio/document/sticker, else "text".
pub fn extract_message_type(message: &Value) -> &'static str {
    if message.get("imageMessage").is_some() {
        "image"
    } else if message.get("videoMessage").is_some() {
        "video"
    } else if message.get("audioMessage").is_some() {
        "audio"
    } else if message.get("documentMessage").is_some() {
        "document"
    } else if message.get("stickerMessage").is_some() {
        "sticker"
    } else {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_single_level_ephemeral() {
        let raw = json!({
            "ephemeralMessage": { "message": { "conversation": "hi" } }
        });
        let inner = unwrap_message(&raw);
        assert_eq!(extract_content(inner, None), "hi");
    }

    #[test]
    fn unwraps_nested_ephemeral_then_view_once() {
        let raw = json!({
            "ephemeralMessage": { "message": {
                "viewOnceMessage": { "message": { "imageMessage": { "caption": "look" } } }
            }}
        });
        let inner = unwrap_message(&raw);
        assert_eq!(extract_message_type(inner), "image");
        assert_eq!(extract_content(inner, None), "look");
    }

    #[test]
    fn unwraps_edited_envelope() {
        let raw = json!({
            "editedMessage": { "message": { "conversation": "corrected" } }
        });
        let inner = unwrap_message(&raw);
        assert_eq!(extract_content(inner, None), "corrected");
    }

    #[test]
    fn falls_back_to_data_content_when_nothing_matches() {
        let raw = json!({});
        let inner = unwrap_message(&raw);
        assert_eq!(extract_content(inner, Some("fallback")), "fallback");
    }

    #[test]
    fn extended_text_takes_priority_over_fallback() {
        let raw = json!({ "extendedTextMessage": { "text": "quoted reply" } });
        assert_eq!(extract_content(&raw, Some("ignored")), "quoted reply");
    }
}
