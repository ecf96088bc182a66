use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    handlers::instance_auth::AdminKeyAuth,
    models::core::Instance,
    repositories::identity::can_create_instance,
    AppState,
};

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

#[derive(Serialize)]
pub struct InstanceResponse {
    id: i32,
    tenant_id: i32,
    name: String,
    session_id: String,
    status: String,
    phone_connected: Option<String>,
    created_at: i32,
    updated_at: i32,
}

impl From<&Instance> for InstanceResponse {
    fn from(i: &Instance) -> Self {
        Self {
            id: i.id,
            tenant_id: i.tenant_id,
            name: i.name.clone(),
            session_id: i.session_id.clone(),
            status: i.status.clone(),
            phone_connected: i.phone_connected.clone(),
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateInstanceRequest {
    tenant_id: i32,
    name: String,
}

/// `POST /admin/instances` (spec §4.A/§4.B): enforces the tenant's `max_instances`
/// quota before creating the Instance row + WebhookConfig. Starting the Bridge
/// session is a separate, explicit step (`POST /admin/instances/{id}/start`) so the
/// documented first-poll `status=CREATED,qr=null` state is reachable.
pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Json(req): Json<CreateInstanceRequest>,
) -> Result<Json<Value>, AppError> {
    let tenant = state
        .identity
        .find_tenant(req.tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant".to_string()))?;
    let plan_id = tenant.plan_id.ok_or_else(|| AppError::PlanDenied("tenant has no active plan".to_string()))?;
    let plan = state.identity.find_plan(plan_id)?.ok_or_else(|| AppError::NotFound("plan".to_string()))?;
    let current = state.identity.count_instances(req.tenant_id)?;
    if !can_create_instance(&plan, current) {
        return Err(AppError::PlanDenied("instance quota reached for this plan".to_string()));
    }

    let instance = state.instances.create(req.tenant_id, &req.name, now_ts())?;
    Ok(Json(json!({ "instance": InstanceResponse::from(&instance) })))
}

pub async fn list_instances(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(tenant_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let instances: Vec<InstanceResponse> = state.instances.list_for_tenant(tenant_id)?.iter().map(InstanceResponse::from).collect();
    Ok(Json(json!({ "instances": instances })))
}

pub async fn get_instance(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(instance_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let instance = state.instances.find(instance_id)?.ok_or_else(|| AppError::NotFound("instance".to_string()))?;
    Ok(Json(json!({ "instance": InstanceResponse::from(&instance) })))
}

/// `DELETE /admin/instances/{id}` (spec §4.B): best-effort Bridge deletion, then
/// local removal, which is authoritative regardless of the Bridge call's outcome.
pub async fn delete_instance(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(instance_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let instance = state.instances.find(instance_id)?.ok_or_else(|| AppError::NotFound("instance".to_string()))?;
    let _ = state.bridge.delete_session(&instance.session_id).await;
    state.instances.delete(instance_id)?;
    Ok(Json(json!({ "status": "deleted" })))
}

pub async fn start_instance(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(instance_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let instance = state.instances.find(instance_id)?.ok_or_else(|| AppError::NotFound("instance".to_string()))?;
    let (ok, body) = state.bridge.start_session(&instance.session_id).await;
    if ok {
        Ok(Json(body))
    } else {
        Err(AppError::Transport(body.to_string()))
    }
}

pub async fn instance_status(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(instance_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let instance = state.instances.find(instance_id)?.ok_or_else(|| AppError::NotFound("instance".to_string()))?;
    Ok(Json(json!({
        "status": instance.status,
        "phone_connected": instance.phone_connected,
        "updated_at": instance.updated_at,
    })))
}

/// `GET /admin/instances/{id}/qr` (spec §4.D QR wait): blocks up to 45s for a QR
/// image or CONNECTED status to show up.
pub async fn instance_qrcode(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(instance_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let instance = state.instances.find(instance_id)?.ok_or_else(|| AppError::NotFound("instance".to_string()))?;
    let body = state
        .session_manager
        .wait_for_qr(&instance.session_id, std::time::Duration::from_secs(45), std::time::Duration::from_millis(1500))
        .await;
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct WebhookConfigRequest {
    callback_url: Option<String>,
    send_messages: bool,
    send_ack: bool,
    send_presence: bool,
}

pub async fn update_webhook_config(
    State(state): State<Arc<AppState>>,
    _auth: AdminKeyAuth,
    Path(instance_id): Path<i32>,
    Json(req): Json<WebhookConfigRequest>,
) -> Result<Json<Value>, AppError> {
    state.instances.update_webhook_config(
        instance_id,
        req.callback_url.as_deref(),
        req.send_messages,
        req.send_ack,
        req.send_presence,
    )?;
    Ok(Json(json!({ "status": "updated" })))
}
