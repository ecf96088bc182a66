pub mod planner;
pub mod worker;

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

fn normalize_jid(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 {
        return None;
    }
    Some(format!("{}@s.whatsapp.net", digits))
}

/// Maps a Bridge ack payload to our monotonic QueueItem status vocabulary, or
/// `None` for anything that isn't one of the three tracked acks (spec §4.H).
pub fn ack_status_from_raw(data: &serde_json::Value) -> Option<&'static str> {
    if let Some(code) = data.get("ack").and_then(serde_json::Value::as_i64) {
        return match code {
            3 => Some("DELIVERED"),
            4 => Some("READ"),
            5 => Some("PLAYED"),
            _ => None,
        };
    }
    match data.get("status").and_then(serde_json::Value::as_str) {
        Some("DELIVERY_ACK") | Some("delivered") => Some("DELIVERED"),
        Some("READ") | Some("read") => Some("READ"),
        Some("PLAYED") | Some("played") => Some("PLAYED"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_digits() {
        assert_eq!(normalize_jid("+55 11 99999-0000"), Some("5511999990000@s.whatsapp.net".to_string()));
    }

    #[test]
    fn rejects_too_short_numbers() {
        assert_eq!(normalize_jid("123"), None);
    }

    #[test]
    fn ack_code_maps_to_status() {
        assert_eq!(ack_status_from_raw(&serde_json::json!({ "ack": 3 })), Some("DELIVERED"));
        assert_eq!(ack_status_from_raw(&serde_json::json!({ "ack": 4 })), Some("READ"));
        assert_eq!(ack_status_from_raw(&serde_json::json!({ "ack": 1 })), None);
    }

    #[test]
    fn ack_string_status_maps() {
        assert_eq!(ack_status_from_raw(&serde_json::json!({ "status": "READ" })), Some("READ"));
    }
}
