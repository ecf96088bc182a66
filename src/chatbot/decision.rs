use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

pub const MAX_AI_CHARS_PER_MESSAGE: usize = 750;
pub const HARD_MAX_MESSAGES_PER_REPLY: usize = 4;
pub const HUMAN_DELAY_MIN_MS: u64 = 450;
pub const HUMAN_DELAY_MAX_MS: u64 = 1600;

pub const ALLOWED_REACTIONS: [&str; 10] = ["👍", "❤️", "😂", "🙏", "👏", "😮", "😢", "🔥", "✨", "✅"];

/// The Decision JSON contract the LLM must return (spec §4.G).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiDecision {
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default, rename = "delays_ms")]
    pub delays_ms: Vec<i64>,
    #[serde(default)]
    pub quote: bool,
    #[serde(default, rename = "reaction_emoji")]
    pub reaction_emoji: String,
    #[serde(default, rename = "send_media_id")]
    pub send_media_id: String,
    #[serde(default, rename = "transfer_url")]
    pub transfer_url: String,
    #[serde(default, rename = "save_name")]
    pub save_name: String,
}

impl AiDecision {
    /// Tolerant parse of the raw LLM JSON response, accepting `reply`/`reply_text`
    /// as fallback keys for `messages` when a provider doesn't follow the schema.
    pub fn from_raw(raw: &Value) -> Self {
        let mut decision: AiDecision = serde_json::from_value(raw.clone()).unwrap_or_default();
        if decision.messages.is_empty() {
            if let Some(text) = raw.get("reply_text").and_then(Value::as_str) {
                decision.messages = vec![text.to_string()];
            } else if let Some(text) = raw.get("reply").and_then(Value::as_str) {
                decision.messages = vec![text.to_string()];
            }
        }
        decision
    }

    /// Post-parse normalization (spec §4.G): strip/drop empties, split overlong
    /// messages, cap total at 4, fill missing delays, enforce the emoji whitelist.
    pub fn normalize(mut self) -> Self {
        let mut expanded = Vec::new();
        for message in self.messages.iter() {
            let trimmed = message.trim();
            if trimmed.is_empty() {
                continue;
            }
            expanded.extend(split_long_message(trimmed));
        }
        expanded.truncate(HARD_MAX_MESSAGES_PER_REPLY);
        self.messages = expanded;

        let needed_delays = self.messages.len().saturating_sub(1);
        while self.delays_ms.len() < needed_delays {
            self.delays_ms.push(pick_human_delay_ms(HUMAN_DELAY_MIN_MS, HUMAN_DELAY_MAX_MS) as i64);
        }
        self.delays_ms.truncate(needed_delays);

        if !self.reaction_emoji.is_empty() && !ALLOWED_REACTIONS.contains(&self.reaction_emoji.as_str()) {
            self.reaction_emoji.clear();
        }
        self.save_name = self.save_name.trim().to_string();
        self.transfer_url = self.transfer_url.trim().to_string();
        self.send_media_id = self.send_media_id.trim().to_string();
        self
    }
}

/// Splits a message longer than 750 chars at the nearest paragraph break, then
/// sentence boundary (". "), then word boundary, hard-cutting as a last resort.
/// Loop-protected at `HARD_MAX_MESSAGES_PER_REPLY * 3` chunks (spec §4.G).
pub fn split_long_message(message: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = message.to_string();
    let max_chunks = HARD_MAX_MESSAGES_PER_REPLY * 3;
    while remaining.chars().count() > MAX_AI_CHARS_PER_MESSAGE && chunks.len() < max_chunks {
        let cut = find_cut_point(&remaining, MAX_AI_CHARS_PER_MESSAGE);
        let (head, tail) = remaining.split_at(cut);
        chunks.push(head.trim().to_string());
        remaining = tail.trim_start().to_string();
    }
    if !remaining.is_empty() {
        chunks.push(remaining);
    }
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

fn find_cut_point(text: &str, limit: usize) -> usize {
    let byte_limit = char_boundary_at(text, limit);
    let window = &text[..byte_limit];
    if let Some(pos) = window.rfind("\n\n") {
        return pos;
    }
    if let Some(pos) = window.rfind("\n") {
        return pos;
    }
    if let Some(pos) = window.rfind(". ") {
        return pos + 1;
    }
    if let Some(pos) = window.rfind(' ') {
        return pos;
    }
    byte_limit
}

fn char_boundary_at(text: &str, char_limit: usize) -> usize {
    text.char_indices().nth(char_limit).map(|(i, _)| i).unwrap_or(text.len())
}

/// Biased-toward-middle jitter: mean of two uniform draws (spec §4.G `_pick_human_delay_ms`).
pub fn pick_human_delay_ms(min: u64, max: u64) -> u64 {
    let mut rng = rand::thread_rng();
    let a: f64 = rng.gen();
    let b: f64 = rng.gen();
    let t = (a + b) / 2.0;
    min + ((max - min) as f64 * t) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fallback_reply_text_key() {
        let raw = serde_json::json!({ "reply_text": "hello there" });
        let decision = AiDecision::from_raw(&raw);
        assert_eq!(decision.messages, vec!["hello there".to_string()]);
    }

    #[test]
    fn normalize_drops_empty_messages() {
        let decision = AiDecision { messages: vec!["  ".to_string(), "hi".to_string()], ..Default::default() };
        let normalized = decision.normalize();
        assert_eq!(normalized.messages, vec!["hi".to_string()]);
    }

    #[test]
    fn normalize_rejects_disallowed_emoji() {
        let decision = AiDecision { messages: vec!["hi".to_string()], reaction_emoji: "🦀".to_string(), ..Default::default() };
        let normalized = decision.normalize();
        assert_eq!(normalized.reaction_emoji, "");
    }

    #[test]
    fn normalize_keeps_allowed_emoji() {
        let decision = AiDecision { messages: vec!["hi".to_string()], reaction_emoji: "👍".to_string(), ..Default::default() };
        let normalized = decision.normalize();
        assert_eq!(normalized.reaction_emoji, "👍");
    }

    #[test]
    fn normalize_fills_missing_delays() {
        let decision = AiDecision { messages: vec!["a".to_string(), "b".to_string(), "c".to_string()], ..Default::default() };
        let normalized = decision.normalize();
        assert_eq!(normalized.delays_ms.len(), 2);
        for d in normalized.delays_ms {
            assert!(d >= HUMAN_DELAY_MIN_MS as i64 && d <= HUMAN_DELAY_MAX_MS as i64);
        }
    }

    #[test]
    fn normalize_caps_total_messages_at_four() {
        let decision = AiDecision {
            messages: vec!["a".to_string(); 10],
            ..Default::default()
        };
        let normalized = decision.normalize();
        assert_eq!(normalized.messages.len(), HARD_MAX_MESSAGES_PER_REPLY);
    }

    #[test]
    fn splits_long_message_at_sentence_boundary() {
        let long = format!("{}. {}", "a".repeat(740), "b".repeat(740));
        let chunks = split_long_message(&long);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_AI_CHARS_PER_MESSAGE + 1);
        }
    }

    #[test]
    fn short_message_is_not_split() {
        assert_eq!(split_long_message("hello"), vec!["hello".to_string()]);
    }
}
