use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
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

pub async fn fetch_profile(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(jid): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.fetch_profile(token, &jid).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.update_profile_status(token, &req.status).await;
    bridge_response(ok, body)
}

pub async fn update_picture(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    mut form: Multipart,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?.to_string();
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = "avatar.jpg".to_string();
    while let Some(field) = form.next_field().await.map_err(|e| AppError::Validation(e.to_string()))? {
        if field.name() == Some("file") {
            file_name = field.file_name().unwrap_or("avatar.jpg").to_string();
            file_bytes = Some(field.bytes().await.map_err(|e| AppError::Validation(e.to_string()))?.to_vec());
        }
    }
    let file_bytes = file_bytes.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    let (ok, body) = state.bridge.update_profile_picture(&token, file_bytes, &file_name).await;
    bridge_response(ok, body)
}

pub async fn get_blocklist(State(state): State<Arc<AppState>>, InstanceAuth { instance }: InstanceAuth) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.get_blocklist(token).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct BlockRequest {
    jid: String,
    block: bool,
}

pub async fn block_user(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<BlockRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.block_user(token, &req.jid, req.block).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct CheckRequest {
    numbers: Vec<String>,
}

pub async fn check_on_whatsapp(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<CheckRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.check_on_whatsapp(token, req.numbers).await;
    bridge_response(ok, body)
}
