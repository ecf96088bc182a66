use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::chatbot::decision::AiDecision;
use crate::error::AppError;

pub const TEMPERATURE: f64 = 0.35;
pub const MAX_OUTPUT_TOKENS: u32 = 420;

/// A single turn of conversation history, oldest-to-role-tagged for the provider call.
pub struct HistoryTurn {
    pub from_bot: bool,
    pub content: String,
}

/// Token usage reported back by the provider, for quota accounting (spec §4.G).
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageMeta {
    pub total_tokens: i32,
}

/// Dispatches the chat completion call to whichever provider the chatbot config
/// names, returning the parsed-and-normalized decision plus token usage. Providers
/// are plain reqwest HTTP calls rather than an SDK crate (DESIGN.md: openai-api-rs
/// dropped in favor of direct HTTP, mirroring the bridge client's own style).
pub async fn call(
    http: &Client,
    provider: &str,
    model: &str,
    api_key: &str,
    system: &str,
    history: &[HistoryTurn],
    user_message: &str,
) -> Result<(AiDecision, UsageMeta), AppError> {
    match provider {
        "gemini" => call_gemini(http, model, api_key, system, history, user_message).await,
        _ => call_openai(http, model, api_key, system, history, user_message).await,
    }
}

async fn call_openai(
    http: &Client,
    model: &str,
    api_key: &str,
    system: &str,
    history: &[HistoryTurn],
    user_message: &str,
) -> Result<(AiDecision, UsageMeta), AppError> {
    let mut messages = vec![json!({ "role": "system", "content": system })];
    for turn in history {
        messages.push(json!({
            "role": if turn.from_bot { "assistant" } else { "user" },
            "content": turn.content,
        }));
    }
    messages.push(json!({ "role": "user", "content": user_message }));

    let body = json!({
        "model": model,
        "messages": messages,
        "temperature": TEMPERATURE,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "response_format": { "type": "json_object" },
    });

    let response = http
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key)
        .timeout(Duration::from_secs(30))
        .json(&body)
        .send()
        .await?;
    let payload: Value = response.error_for_status()?.json().await?;

    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or("{}");
    let raw: Value = serde_json::from_str(content).unwrap_or(json!({}));
    let decision = AiDecision::from_raw(&raw).normalize();

    let usage = UsageMeta {
        total_tokens: payload.pointer("/usage/total_tokens").and_then(Value::as_i64).unwrap_or(0) as i32,
    };
    Ok((decision, usage))
}

async fn call_gemini(
    http: &Client,
    model: &str,
    api_key: &str,
    system: &str,
    history: &[HistoryTurn],
    user_message: &str,
) -> Result<(AiDecision, UsageMeta), AppError> {
    let mut contents = Vec::new();
    for turn in history {
        contents.push(json!({
            "role": if turn.from_bot { "model" } else { "user" },
            "parts": [{ "text": turn.content }],
        }));
    }
    contents.push(json!({ "role": "user", "parts": [{ "text": user_message }] }));

    let body = json!({
        "system_instruction": { "parts": [{ "text": system }] },
        "contents": contents,
        "generationConfig": {
            "temperature": TEMPERATURE,
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
            "responseMimeType": "application/json",
        },
    });

    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        model, api_key
    );
    let response = http.post(&url).timeout(Duration::from_secs(30)).json(&body).send().await?;
    let payload: Value = response.error_for_status()?.json().await?;

    let content = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or("{}");
    let raw: Value = serde_json::from_str(content).unwrap_or(json!({}));
    let decision = AiDecision::from_raw(&raw).normalize();

    let usage = UsageMeta {
        total_tokens: payload.pointer("/usageMetadata/totalTokenCount").and_then(Value::as_i64).unwrap_or(0) as i32,
    };
    Ok((decision, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_meta_defaults_to_zero() {
        let usage = UsageMeta::default();
        assert_eq!(usage.total_tokens, 0);
    }
}
