pub mod normalize;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::{HeaderMap, StatusCode}, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    session_manager::{extract_phone_connected, normalize_status},
    AppState,
};
use normalize::{unwrap_message, extract_content, extract_message_type};

#[derive(Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub data: Value,
}

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

/// `POST /webhook/node/` — the single inbound ingress endpoint (spec §4.E/§6).
/// Authenticated by an exact `x-api-key` match against `WEBHOOK_ADMIN_SECRET`.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(envelope): Json<WebhookEnvelope>,
) -> (StatusCode, Json<Value>) {
    let expected = std::env::var("WEBHOOK_ADMIN_SECRET").unwrap_or_default();
    let is_dev = std::env::var("ENVIRONMENT").as_deref() == Ok("development");
    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or("");
    if !is_dev && provided != expected {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "status": "unauthorized" })));
    }

    process_envelope(&state, &envelope).await
}

/// Shared event-processing pipeline: dispatches a decoded envelope by `event_type`,
/// same code path whether it arrived over the HTTP ingress or the `listener` CLI's
/// WebSocket connection to the Bridge.
pub async fn process_envelope(state: &Arc<AppState>, envelope: &WebhookEnvelope) -> (StatusCode, Json<Value>) {
    match envelope.event_type.as_str() {
        "session-update" | "connection.update" | "qr" => handle_connection_event(state, envelope).await,
        "message" => handle_message_event(state, envelope).await,
        "ack" | "message.ack" => handle_ack_event(state, envelope).await,
        other => {
            tracing::debug!(event_type = other, "webhook: ignoring unknown event type");
            (StatusCode::OK, Json(json!({ "status": "ignored" })))
        }
    }
}

/// Correlates a Bridge delivery-ack event back to the dispatch QueueItem carrying
/// the same `wamid` (spec §4.H ack correlation).
async fn handle_ack_event(state: &Arc<AppState>, envelope: &WebhookEnvelope) -> (StatusCode, Json<Value>) {
    let data = &envelope.data;
    let Some(wamid) = data.pointer("/key/id").and_then(Value::as_str) else {
        return (StatusCode::OK, Json(json!({ "status": "ignored" })));
    };
    if let Some(status) = crate::dispatch::ack_status_from_raw(data) {
        let _ = state.dispatch_store.advance_status_by_wamid(wamid, status);
    }
    (StatusCode::OK, Json(json!({ "status": "processed" })))
}

async fn handle_connection_event(state: &Arc<AppState>, envelope: &WebhookEnvelope) -> (StatusCode, Json<Value>) {
    let Ok(Some(instance)) = state.instances.find_by_session_id(&envelope.session_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "status": "ignored" })));
    };
    let Ok(Some(tenant)) = state.identity.find_tenant(instance.tenant_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "status": "ignored" })));
    };
    if !crate::repositories::identity::is_plan_valid(&tenant, now_ts()) {
        return (StatusCode::OK, Json(json!({ "status": "plan_expired_ignored" })));
    }

    let data = &envelope.data;
    let remote_status = data.get("status").and_then(Value::as_str).map(normalize_status);
    let phone = extract_phone_connected(data);
    let token = data.get("token").and_then(Value::as_str);
    let has_qr = data.get("qr").and_then(Value::as_str).is_some() || data.get("qrCode").and_then(Value::as_str).is_some();

    let mut effective_status = remote_status.clone();
    if has_qr && remote_status.as_deref() != Some("CONNECTED") {
        effective_status = Some("QR_SCANNED".to_string());
    }

    if let Err(err) = state.instances.sync_remote_state(
        &envelope.session_id,
        effective_status.as_deref(),
        token,
        phone.as_deref(),
        now_ts(),
    ) {
        let _ = state.webhook_error_log.record(
            Some(instance.id),
            Some(&envelope.session_id),
            Some(&envelope.event_type),
            &err.to_string(),
            Some(&envelope.data.to_string()),
            now_ts(),
        );
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": "error" })));
    }

    if effective_status.as_deref() == Some("CONNECTED") && token.is_none() {
        let session_manager = state.session_manager.clone();
        let session_id = envelope.session_id.clone();
        tokio::spawn(async move {
            let _ = session_manager.self_heal_token(&session_id).await;
        });
    }

    fan_out(state, &instance.id, &envelope.event_type, &envelope.data).await;
    (StatusCode::OK, Json(json!({ "status": "processed" })))
}

async fn handle_message_event(state: &Arc<AppState>, envelope: &WebhookEnvelope) -> (StatusCode, Json<Value>) {
    let Ok(Some(instance)) = state.instances.find_by_session_id(&envelope.session_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "status": "ignored" })));
    };
    let Ok(Some(tenant)) = state.identity.find_tenant(instance.tenant_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "status": "ignored" })));
    };
    if !crate::repositories::identity::is_plan_valid(&tenant, now_ts()) {
        return (StatusCode::OK, Json(json!({ "status": "plan_expired_ignored" })));
    }

    let data = &envelope.data;
    let raw_message = data.get("message").cloned().unwrap_or(Value::Null);
    let inner = unwrap_message(&raw_message);
    let content = extract_content(inner, data.get("content").and_then(Value::as_str));
    let message_type = extract_message_type(inner);
    let remote_jid = data.pointer("/key/remoteJid").and_then(Value::as_str).unwrap_or("").to_string();
    let from_me = data.pointer("/key/fromMe").and_then(Value::as_bool).unwrap_or(false);
    let wamid = data.pointer("/key/id").and_then(Value::as_str).map(|s| s.to_string());
    let push_name = data.get("pushName").and_then(Value::as_str).map(|s| s.to_string());
    let is_group = remote_jid.ends_with("@g.us");

    let already_seen = match &wamid {
        Some(w) => state.message_history.wamid_exists(w).unwrap_or(false),
        None => false,
    };

    if let (Some(_), false) = (&wamid, already_seen) {
        let new_message = crate::models::core::NewMessage {
            instance_id: instance.id,
            remote_jid: remote_jid.clone(),
            from_me,
            push_name: push_name.clone(),
            message_type: message_type.to_string(),
            content: content.clone(),
            media_url: None,
            wamid: wamid.clone(),
            created_at: now_ts(),
        };
        if let Err(err) = state.message_history.append(new_message) {
            let _ = state.webhook_error_log.record(
                Some(instance.id),
                Some(&envelope.session_id),
                Some(&envelope.event_type),
                &err.to_string(),
                Some(&data.to_string()),
                now_ts(),
            );
        }
    }

    if !from_me && !content.is_empty() && !already_seen {
        let state = state.clone();
        let instance = instance.clone();
        let remote_jid = remote_jid.clone();
        let message_key = data.get("key").cloned();
        let quoted_message = data.pointer("/contextInfo/quotedMessage").cloned();
        tokio::spawn(async move {
            crate::chatbot::engine::handle_inbound(
                state,
                instance,
                remote_jid,
                content,
                push_name,
                quoted_message,
                message_key,
                is_group,
            )
            .await;
        });
    }

    fan_out(state, &instance.id, "message", &envelope.data).await;
    (StatusCode::OK, Json(json!({ "status": "processed" })))
}

/// Client fan-out: forwards the original payload to the tenant's callback URL when
/// a matching flag is enabled. Failures are logged, never retried (spec §4.E).
async fn fan_out(state: &Arc<AppState>, instance_id: &i32, event_type: &str, payload: &Value) {
    let Ok(Some(config)) = state.instances.webhook_config(*instance_id) else {
        return;
    };
    let Some(url) = config.callback_url else {
        return;
    };
    let enabled = match event_type {
        "message" => config.send_messages,
        "presence" => config.send_presence,
        "connection.update" => true,
        _ => config.send_ack,
    };
    if !enabled {
        return;
    }
    let client = state.http_client.clone();
    let url = url.clone();
    let payload = payload.clone();
    tokio::spawn(async move {
        if let Err(err) = client.post(&url).timeout(Duration::from_secs(5)).json(&payload).send().await {
            tracing::warn!(url = %url, error = %err, "webhook fan-out failed");
        }
    });
}
