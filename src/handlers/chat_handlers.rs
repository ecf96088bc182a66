use std::sync::Arc;

use axum::{extract::State, Json};
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
pub struct JidRequest {
    jid: String,
}

#[derive(Deserialize)]
pub struct ArchiveRequest {
    jid: String,
    archive: bool,
}

pub async fn archive_chat(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<ArchiveRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.archive_chat(token, &req.jid, req.archive).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct MuteRequest {
    jid: String,
    mute: bool,
}

pub async fn mute_chat(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<MuteRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.mute_chat(token, &req.jid, req.mute).await;
    bridge_response(ok, body)
}

pub async fn clear_chat(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<JidRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.clear_chat(token, &req.jid).await;
    bridge_response(ok, body)
}

pub async fn mark_chat_read(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<JidRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.mark_chat_read(token, &req.jid).await;
    bridge_response(ok, body)
}
