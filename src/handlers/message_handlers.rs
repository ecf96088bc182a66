use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{error::AppError, handlers::instance_auth::InstanceAuth, AppState};

fn require_token(instance: &crate::models::core::Instance) -> Result<&str, AppError> {
    instance
        .token
        .as_deref()
        .ok_or_else(|| AppError::Validation("instance is not connected".to_string()))
}

fn bridge_response(ok: bool, body: Value) -> Result<Json<Value>, AppError> {
    if ok {
        Ok(Json(body))
    } else {
        Err(AppError::Transport(body.to_string()))
    }
}

#[derive(Deserialize)]
pub struct SendTextRequest {
    to: String,
    text: String,
    #[serde(default)]
    quoted_message_id: Option<String>,
}

/// `POST /message/send` (spec §6): plain text, or an image by URL when `text` is
/// empty and the caller instead wants `send-media` — this endpoint only covers text.
pub async fn send_text(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<SendTextRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.send_text(token, &req.to, &req.text, req.quoted_message_id.as_deref()).await;
    bridge_response(ok, body)
}

/// `POST /message/send-media` (multipart): `to`, `file`, optional `caption`.
pub async fn send_media(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    mut form: Multipart,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?.to_string();
    let mut to: Option<String> = None;
    let mut caption: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = "media".to_string();

    while let Some(field) = form.next_field().await.map_err(|e| AppError::Validation(e.to_string()))? {
        match field.name().unwrap_or("") {
            "to" => to = Some(field.text().await.map_err(|e| AppError::Validation(e.to_string()))?),
            "caption" => caption = Some(field.text().await.map_err(|e| AppError::Validation(e.to_string()))?),
            "file" => {
                file_name = field.file_name().unwrap_or("media").to_string();
                file_bytes = Some(field.bytes().await.map_err(|e| AppError::Validation(e.to_string()))?.to_vec());
            }
            _ => {}
        }
    }

    let to = to.ok_or_else(|| AppError::Validation("missing 'to' field".to_string()))?;
    let file_bytes = file_bytes.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    let (ok, body) = state.bridge.send_media(&token, &to, file_bytes, &file_name, caption.as_deref()).await;
    bridge_response(ok, body)
}

/// `POST /message/send-voice` (multipart): `to`, `file` (PTT).
pub async fn send_voice(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    mut form: Multipart,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?.to_string();
    let mut to: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = "voice.ogg".to_string();

    while let Some(field) = form.next_field().await.map_err(|e| AppError::Validation(e.to_string()))? {
        match field.name().unwrap_or("") {
            "to" => to = Some(field.text().await.map_err(|e| AppError::Validation(e.to_string()))?),
            "file" => {
                file_name = field.file_name().unwrap_or("voice.ogg").to_string();
                file_bytes = Some(field.bytes().await.map_err(|e| AppError::Validation(e.to_string()))?.to_vec());
            }
            _ => {}
        }
    }

    let to = to.ok_or_else(|| AppError::Validation("missing 'to' field".to_string()))?;
    let file_bytes = file_bytes.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    let (ok, body) = state.bridge.send_voice(&token, &to, file_bytes, &file_name).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct PollRequest {
    to: String,
    question: String,
    options: Vec<String>,
}

pub async fn send_poll(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<PollRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.send_poll(token, &req.to, &req.question, req.options).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct LocationRequest {
    to: String,
    latitude: f64,
    longitude: f64,
}

pub async fn send_location(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<LocationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.send_location(token, &req.to, req.latitude, req.longitude).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct ContactRequest {
    to: String,
    contact_jid: String,
    display_name: String,
}

pub async fn send_contact(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<ContactRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.send_contact(token, &req.to, &req.contact_jid, &req.display_name).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    key: Value,
    emoji: String,
}

pub async fn send_reaction(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.send_reaction(token, &req.key, &req.emoji).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct EditRequest {
    key: Value,
    text: String,
}

pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<EditRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.edit_message(token, &req.key, &req.text).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct KeyOnlyRequest {
    key: Value,
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<KeyOnlyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.delete_message(token, &req.key).await;
    bridge_response(ok, body)
}

pub async fn pin_message(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<KeyOnlyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.pin_message(token, &req.key).await;
    bridge_response(ok, body)
}

pub async fn unpin_message(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<KeyOnlyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.unpin_message(token, &req.key).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct StarRequest {
    key: Value,
    starred: bool,
}

pub async fn star_message(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<StarRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.star_message(token, &req.key, req.starred).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct ReadKeysRequest {
    keys: Vec<Value>,
}

pub async fn mark_messages_read(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<ReadKeysRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.mark_messages_read(token, req.keys).await;
    bridge_response(ok, body)
}
