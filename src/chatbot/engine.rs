use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;

use crate::{
    bridge::{BridgeClient, BridgeOutcome},
    chatbot::{decision::pick_human_delay_ms, language, name, prompt, provider},
    error::AppError,
    models::core::{Instance, NewMessage},
    AppState,
};

const READ_RECEIPT_DELAY_MIN_MS: u64 = 250;
const READ_RECEIPT_DELAY_MAX_MS: u64 = 1100;
const COMPOSING_TICK: Duration = Duration::from_millis(1200);
const MAX_INBOUND_CHARS: usize = 4000;

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

fn language_label(lang: &str) -> &'static str {
    match lang {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        _ => "Portuguese",
    }
}

fn fallback_reply(lang: &str) -> &'static str {
    match lang {
        "en" => "Sorry, could you repeat that?",
        "es" => "Disculpa, ¿puedes repetirlo?",
        "fr" => "Désolé, peux-tu répéter ?",
        _ => "Desculpe, pode repetir?",
    }
}

fn transfer_template(lang: &str, url: &str) -> String {
    match lang {
        "en" => format!("Perfect — connecting you here: {}", url),
        "es" => format!("Perfecto — te conecto aquí: {}", url),
        "fr" => format!("Parfait — je vous connecte ici : {}", url),
        _ => format!("Perfeito — te conectando aqui: {}", url),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum NameDecision {
    Keep,
    Clear,
    Set(String),
}

/// Merges the three name-policy triggers (spec §4.G) in priority order: an explicit
/// denial always wins, then an explicit self-identification, then a validated bare
/// reply to the bot's own "what should I call you?" prompt.
fn decide_name_update(message: &str, last_bot_message: Option<&str>) -> NameDecision {
    if name::is_name_denial(message) {
        return NameDecision::Clear;
    }
    if let Some(found) = name::extract_explicit_name(message) {
        return NameDecision::Set(found);
    }
    if let Some(last) = last_bot_message {
        if name::bot_asked_for_name(last) {
            if let Some(found) = name::validate_name(message.trim()) {
                return NameDecision::Set(found);
            }
        }
    }
    NameDecision::Keep
}

/// Per-(instance, remote_jid) serialization point (spec §4.G Concurrency, §9's
/// `(instance_id, remote_jid) -> mutex` redesign note).
async fn pair_lock(state: &Arc<AppState>, instance_id: i32, remote_jid: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = state.chatbot_locks.lock().await;
    locks
        .entry((instance_id, remote_jid.to_string()))
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        .clone()
}

/// Entry point invoked by the webhook ingress (and the WebSocket listener) for every
/// non-self inbound message. Owns the per-pair lock for its whole duration and never
/// propagates an error to the caller — failures past the read-receipt step are
/// swallowed per spec §7's fail-silent policy for the chatbot engine.
pub async fn handle_inbound(
    state: Arc<AppState>,
    instance: Instance,
    remote_jid: String,
    content: String,
    push_name: Option<String>,
    quoted_message: Option<Value>,
    message_key: Option<Value>,
    is_group: bool,
) {
    let lock = pair_lock(&state, instance.id, &remote_jid).await;
    let _guard = lock.lock().await;
    let _ = quoted_message; // retained for callers that want to inspect the quoted content; unused by the current decision contract
    if let Err(err) = run(&state, &instance, &remote_jid, &content, push_name.as_deref(), message_key, is_group).await {
        tracing::warn!(error = %err, instance_id = instance.id, remote_jid = %remote_jid, "chatbot engine stopped");
    }
}

async fn run(
    state: &Arc<AppState>,
    instance: &Instance,
    remote_jid: &str,
    content: &str,
    push_name: Option<&str>,
    message_key: Option<Value>,
    is_group: bool,
) -> Result<(), AppError> {
    let Some(config) = state.chatbot_store.find_by_instance(instance.id)? else {
        return Ok(());
    };
    if !config.active {
        return Ok(());
    }
    if is_group && !config.trigger_on_groups {
        return Ok(());
    }

    let now = now_ts();
    let tenant = state
        .identity
        .find_tenant(instance.tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant".to_string()))?;
    let plan = match tenant.plan_id {
        Some(plan_id) => state.identity.find_plan(plan_id)?,
        None => None,
    };
    let (periodicity, conversation_limit) = match &plan {
        Some(plan) => (plan.periodicity.as_str(), plan.monthly_conversations),
        None => ("monthly", 0),
    };
    let allowed = state
        .chatbot_store
        .check_and_increment_conversation_quota(config.id, periodicity, conversation_limit, now)?;
    if !allowed {
        return Ok(());
    }

    if config.token_usage_kind != "infinity" && config.current_tokens_used >= config.token_limit {
        return Ok(());
    }

    let Some(token) = instance.token.clone() else {
        return Ok(());
    };

    let content = truncate_chars(content, MAX_INBOUND_CHARS);

    let contact = state.chatbot_store.get_or_create_contact(config.id, remote_jid, now)?;
    let last_bot_message = state.message_history.last_from_bot(instance.id, remote_jid)?;
    let name_decision = decide_name_update(&content, last_bot_message.as_deref().map(|m| m.content.as_str()));
    let mut confirmed_name = contact.confirmed_name.clone();
    match &name_decision {
        NameDecision::Clear => {
            state.chatbot_store.set_confirmed_name(contact.id, None)?;
            confirmed_name = None;
        }
        NameDecision::Set(found) => {
            state.chatbot_store.set_confirmed_name(contact.id, Some(found.as_str()))?;
            confirmed_name = Some(found.clone());
        }
        NameDecision::Keep => {}
    }

    let history = if config.use_history {
        state.message_history.recent(instance.id, remote_jid, config.history_limit as i64)?
    } else {
        Vec::new()
    };
    let history_newest_first: Vec<String> = history.iter().rev().map(|m| m.content.clone()).collect();
    let lang = language::infer_conversation_language(&content, &history_newest_first);

    sleep(Duration::from_millis(pick_human_delay_ms(READ_RECEIPT_DELAY_MIN_MS, READ_RECEIPT_DELAY_MAX_MS))).await;
    if let Some(key) = message_key.clone() {
        let _ = state.bridge.mark_messages_read(&token, vec![key]).await;
    }
    let _ = state.bridge.mark_chat_read(&token, remote_jid).await;

    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    let composing_bridge = state.bridge.clone();
    let composing_token = token.clone();
    let composing_jid = remote_jid.to_string();
    let composing_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(COMPOSING_TICK);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let _ = composing_bridge.set_presence(&composing_token, &composing_jid, "composing").await;
                }
            }
        }
    });

    let transfers = state.chatbot_store.active_transfers(config.id)?;
    let media = if config.allow_media_response {
        state.chatbot_store.accessible_media(config.id)?
    } else {
        Vec::new()
    };
    let system_prompt = prompt::build_system_prompt(
        &config,
        language_label(lang),
        confirmed_name.as_deref(),
        push_name,
        &transfers,
        &media,
    );
    let history_turns: Vec<provider::HistoryTurn> = history
        .iter()
        .map(|m| provider::HistoryTurn { from_bot: m.from_me, content: m.content.clone() })
        .collect();

    let outcome = provider::call(
        &state.http_client,
        &config.ai_provider,
        &config.ai_model,
        &config.ai_api_key,
        &system_prompt,
        &history_turns,
        &content,
    )
    .await;

    let (mut ai_decision, usage) = match outcome {
        Ok(pair) => pair,
        Err(err) => {
            let _ = stop_tx.send(());
            let _ = composing_task.await;
            let _ = state.bridge.set_presence(&token, remote_jid, "paused").await;
            tracing::warn!(error = %err, instance_id = instance.id, remote_jid = %remote_jid, "chatbot llm call failed, stopping silently");
            return Ok(());
        }
    };
    state.chatbot_store.add_tokens_used(config.id, usage.total_tokens)?;

    if ai_decision.messages.is_empty() {
        ai_decision.messages = vec![fallback_reply(lang).to_string()];
        ai_decision.delays_ms.clear();
    }

    if let Some(validated) = (!ai_decision.save_name.is_empty())
        .then(|| name::validate_name(&ai_decision.save_name))
        .flatten()
    {
        state.chatbot_store.set_confirmed_name(contact.id, Some(validated.as_str()))?;
    }

    if !ai_decision.reaction_emoji.is_empty() {
        if let Some(key) = message_key.clone() {
            let bridge = state.bridge.clone();
            let token_for_reaction = token.clone();
            let emoji = ai_decision.reaction_emoji.clone();
            tokio::spawn(async move {
                let _ = bridge.send_reaction(&token_for_reaction, &key, &emoji).await;
            });
        }
    }

    if !ai_decision.transfer_url.is_empty() {
        let text = transfer_template(lang, &ai_decision.transfer_url);
        send_text_with_self_heal(state, instance, &token, remote_jid, &text, None).await;
        let _ = stop_tx.send(());
        let _ = composing_task.await;
        let _ = state.bridge.set_presence(&token, remote_jid, "paused").await;
        return Ok(());
    }

    let quoted_id = message_key.as_ref().and_then(|k| k.get("id")).and_then(Value::as_str).map(|s| s.to_string());
    for (index, message) in ai_decision.messages.iter().enumerate() {
        if index > 0 {
            if let Some(delay) = ai_decision.delays_ms.get(index - 1) {
                sleep(Duration::from_millis((*delay).max(0) as u64)).await;
            }
        }
        let quote_this = index == 0 && ai_decision.quote && quoted_id.is_some();
        let quote_arg = if quote_this { quoted_id.as_deref() } else { None };
        let (ok, body) = send_text_with_self_heal(state, instance, &token, remote_jid, message, quote_arg).await;
        let wamid = body.get("id").and_then(Value::as_str).map(|s| s.to_string());
        state.message_history.append(NewMessage {
            instance_id: instance.id,
            remote_jid: remote_jid.to_string(),
            from_me: true,
            push_name: None,
            message_type: "text".to_string(),
            content: message.clone(),
            media_url: None,
            wamid,
            created_at: now_ts(),
        })?;
        if !ok {
            break;
        }
    }

    if config.allow_media_response && !ai_decision.send_media_id.is_empty() {
        if let Ok(media_id) = ai_decision.send_media_id.parse::<i32>() {
            if let Some(asset) = media.iter().find(|m| m.id == media_id) {
                sleep(Duration::from_millis(pick_human_delay_ms(200, 800))).await;
                if let Ok(bytes) = tokio::fs::read(&asset.storage_path).await {
                    let file_name = std::path::Path::new(&asset.storage_path)
                        .file_name()
                        .and_then(|s| s.to_str())
                        .unwrap_or("media")
                        .to_string();
                    let _ = state.bridge.send_media(&token, remote_jid, bytes, &file_name, None).await;
                }
            }
        }
    }

    let _ = stop_tx.send(());
    let _ = composing_task.await;
    let _ = state.bridge.set_presence(&token, remote_jid, "paused").await;

    Ok(())
}

/// Sends one text message, self-healing the instance token once on an auth-denied
/// response and retrying exactly once more (spec §4.G Failure semantics).
async fn send_text_with_self_heal(
    state: &Arc<AppState>,
    instance: &Instance,
    token: &str,
    jid: &str,
    text: &str,
    quoted_id: Option<&str>,
) -> BridgeOutcome {
    let (status, body) = state.bridge.send_text_with_status(token, jid, text, quoted_id).await;
    if status.is_success() || !BridgeClient::is_auth_denied(status, &body) {
        return (status.is_success(), body);
    }
    let _ = state.session_manager.self_heal_token(&instance.session_id).await;
    let fresh_token = state
        .instances
        .find_by_session_id(&instance.session_id)
        .ok()
        .flatten()
        .and_then(|i| i.token)
        .unwrap_or_else(|| token.to_string());
    state.bridge.send_text(&fresh_token, jid, text, quoted_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_wins_over_bot_asked_context() {
        let decision = decide_name_update("esse não é meu nome", Some("Como posso te chamar?"));
        assert_eq!(decision, NameDecision::Clear);
    }

    #[test]
    fn explicit_self_id_is_detected_without_bot_prompt() {
        let decision = decide_name_update("me chamo Ana", None);
        assert_eq!(decision, NameDecision::Set("Ana".to_string()));
    }

    #[test]
    fn solicited_short_reply_requires_bot_prompt() {
        assert_eq!(decide_name_update("Ana", None), NameDecision::Keep);
        assert_eq!(decide_name_update("Ana", Some("Como posso te chamar?")), NameDecision::Set("Ana".to_string()));
    }

    #[test]
    fn unrelated_message_keeps_name() {
        assert_eq!(decide_name_update("tudo bem por ai?", Some("Oi, tudo bem?")), NameDecision::Keep);
    }

    #[test]
    fn transfer_template_embeds_url_per_language() {
        assert!(transfer_template("en", "https://wa.me/123").contains("https://wa.me/123"));
        assert!(transfer_template("pt", "https://wa.me/123").starts_with("Perfeito"));
    }

    #[test]
    fn fallback_reply_is_language_specific() {
        assert_ne!(fallback_reply("en"), fallback_reply("pt"));
    }
}
