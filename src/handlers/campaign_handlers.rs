use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    dispatch::planner::plan_campaign,
    error::AppError,
    handlers::instance_auth::InstanceAuth,
    models::dispatch::{Campaign, NewCampaign, QueueItem},
    AppState,
};

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

#[derive(Serialize)]
pub struct CampaignResponse {
    id: i32,
    name: String,
    status: String,
    start_at: i32,
    planned: i32,
    sent: i32,
    failed: i32,
}

impl From<&Campaign> for CampaignResponse {
    fn from(c: &Campaign) -> Self {
        Self { id: c.id, name: c.name.clone(), status: c.status.clone(), start_at: c.start_at, planned: c.planned, sent: c.sent, failed: c.failed }
    }
}

async fn owned_campaign(state: &Arc<AppState>, instance_id: i32, campaign_id: i32) -> Result<Campaign, AppError> {
    let campaign = state.dispatch_store.find_campaign(campaign_id)?.ok_or_else(|| AppError::NotFound("campaign".to_string()))?;
    if campaign.instance_id != instance_id {
        return Err(AppError::NotFound("campaign".to_string()));
    }
    Ok(campaign)
}

#[derive(Deserialize)]
pub struct CreateCampaignRequest {
    name: String,
    start_at: i32,
    min_delay_seconds: i32,
    max_delay_seconds: i32,
    messages_per_recipient: i32,
    use_name_placeholder: bool,
    raw_numbers: Option<String>,
    groups: Option<Vec<String>>,
    templates: Vec<String>,
}

/// `POST /campaigns` (spec §4.H): creates a DRAFT campaign scoped to the caller's
/// own Instance, then immediately runs the planner to transition it to SCHEDULED.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<Json<Value>, AppError> {
    if req.templates.is_empty() {
        return Err(AppError::Validation("templates must not be empty".to_string()));
    }
    let campaign = state.dispatch_store.insert_campaign(NewCampaign {
        tenant_id: instance.tenant_id,
        instance_id: instance.id,
        name: req.name,
        start_at: req.start_at,
        min_delay_seconds: req.min_delay_seconds,
        max_delay_seconds: req.max_delay_seconds,
        messages_per_recipient: req.messages_per_recipient,
        use_name_placeholder: req.use_name_placeholder,
        raw_numbers: req.raw_numbers,
        groups: req.groups.map(|g| serde_json::to_string(&g).unwrap_or_default()),
        templates: serde_json::to_string(&req.templates).unwrap_or_default(),
        status: "DRAFT".to_string(),
        planned: 0,
        sent: 0,
        failed: 0,
        created_at: now_ts(),
    })?;

    plan_campaign(&state, campaign.id).await?;
    let campaign = state.dispatch_store.find_campaign(campaign.id)?.ok_or_else(|| AppError::NotFound("campaign".to_string()))?;
    Ok(Json(json!({ "campaign": CampaignResponse::from(&campaign) })))
}

/// `GET /campaigns/{id}` dashboard read: counters plus a delivered/read rollup
/// reconciled from QueueItem status (§9 Open Question: counters are derived, not
/// independently incremented).
pub async fn campaign_status(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(campaign_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let campaign = owned_campaign(&state, instance.id, campaign_id).await?;
    let (delivered, read, total) = state.dispatch_store.campaign_counts(campaign.id)?;
    Ok(Json(json!({
        "campaign": CampaignResponse::from(&campaign),
        "delivered": delivered,
        "read": read,
        "total_items": total,
    })))
}

#[derive(Serialize)]
struct QueueItemResponse {
    id: i32,
    recipient_id: i32,
    step: i32,
    status: String,
    scheduled_at: i32,
    wamid: Option<String>,
}

impl From<&QueueItem> for QueueItemResponse {
    fn from(q: &QueueItem) -> Self {
        Self { id: q.id, recipient_id: q.recipient_id, step: q.step, status: q.status.clone(), scheduled_at: q.scheduled_at, wamid: q.wamid.clone() }
    }
}

pub async fn list_queue_items(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(campaign_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let campaign = owned_campaign(&state, instance.id, campaign_id).await?;
    let items: Vec<QueueItemResponse> = state.dispatch_store.list_queue_items(campaign.id)?.iter().map(QueueItemResponse::from).collect();
    Ok(Json(json!({ "items": items })))
}

#[derive(Deserialize)]
pub struct AttachMediaRequest {
    queue_item_id: i32,
    media_file_id: Option<i32>,
}

/// `POST /campaigns/{id}/media` (§10.4): attaches or clears the media file a
/// specific QueueItem should send alongside its rendered text. The file, if
/// given, must belong to the caller's own tenant.
pub async fn attach_media(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(campaign_id): Path<i32>,
    Json(req): Json<AttachMediaRequest>,
) -> Result<Json<Value>, AppError> {
    let _campaign = owned_campaign(&state, instance.id, campaign_id).await?;
    if let Some(media_file_id) = req.media_file_id {
        let file = state.media_files.find(media_file_id)?.ok_or_else(|| AppError::NotFound("media file".to_string()))?;
        if file.tenant_id != instance.tenant_id {
            return Err(AppError::NotFound("media file".to_string()));
        }
    }
    state.dispatch_store.set_queue_item_media(req.queue_item_id, req.media_file_id)?;
    Ok(Json(json!({ "status": "updated" })))
}

pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(campaign_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let campaign = owned_campaign(&state, instance.id, campaign_id).await?;
    state.dispatch_store.set_campaign_status(campaign.id, "PAUSED")?;
    Ok(Json(json!({ "status": "paused" })))
}

pub async fn resume_campaign(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(campaign_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let campaign = owned_campaign(&state, instance.id, campaign_id).await?;
    state.dispatch_store.set_campaign_status(campaign.id, "RUNNING")?;
    Ok(Json(json!({ "status": "running" })))
}
