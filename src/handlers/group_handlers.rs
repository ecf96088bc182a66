use std::sync::Arc;

use axum::{
    extract::{Path, State},
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

pub async fn list_groups(State(state): State<Arc<AppState>>, InstanceAuth { instance }: InstanceAuth) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.list_groups(token).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    subject: String,
    participants: Vec<String>,
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.create_group(token, &req.subject, req.participants).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct JoinGroupRequest {
    invite_code: String,
}

pub async fn join_group(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<JoinGroupRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.join_group(token, &req.invite_code).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct ParticipantsRequest {
    action: String, // "add" | "remove" | "promote" | "demote"
    participants: Vec<String>,
}

pub async fn update_participants(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
    Json(req): Json<ParticipantsRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.update_group_participants(token, &group_id, &req.action, req.participants).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct SubjectRequest {
    subject: String,
}

pub async fn update_subject(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
    Json(req): Json<SubjectRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.update_group_subject(token, &group_id, &req.subject).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct DescriptionRequest {
    description: String,
}

pub async fn update_description(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.update_group_description(token, &group_id, &req.description).await;
    bridge_response(ok, body)
}

#[derive(Deserialize)]
pub struct SettingRequest {
    setting: String,
    value: String,
}

pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
    Json(req): Json<SettingRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.update_group_setting(token, &group_id, &req.setting, &req.value).await;
    bridge_response(ok, body)
}

pub async fn invite_code(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.get_group_invite_code(token, &group_id).await;
    bridge_response(ok, body)
}

pub async fn revoke_invite(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.revoke_group_invite_code(token, &group_id).await;
    bridge_response(ok, body)
}

pub async fn leave_group(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = require_token(&instance)?;
    let (ok, body) = state.bridge.leave_group(token, &group_id).await;
    bridge_response(ok, body)
}
