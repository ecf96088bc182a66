use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::instance_auth::InstanceAuth,
    models::chatbot::{MediaAsset, NewMediaAsset},
    models::core::{MediaFile, NewMediaFile},
    AppState,
};

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

fn storage_dir() -> String {
    std::env::var("MEDIA_STORAGE_DIR").unwrap_or_else(|_| "storage/media".to_string())
}

async fn save_blob(prefix: &str, original_name: &str, bytes: Vec<u8>) -> Result<String, AppError> {
    let dir = storage_dir();
    tokio::fs::create_dir_all(&dir).await.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let ext = std::path::Path::new(original_name).extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let path = format!("{}/{}-{}.{}", dir, prefix, Uuid::new_v4(), ext);
    tokio::fs::write(&path, bytes).await.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(path)
}

struct UploadForm {
    file_bytes: Vec<u8>,
    file_name: String,
    fields: std::collections::HashMap<String, String>,
}

async fn read_multipart(mut form: Multipart) -> Result<UploadForm, AppError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = "media".to_string();
    let mut fields = std::collections::HashMap::new();
    while let Some(field) = form.next_field().await.map_err(|e| AppError::Validation(e.to_string()))? {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            file_name = field.file_name().unwrap_or("media").to_string();
            file_bytes = Some(field.bytes().await.map_err(|e| AppError::Validation(e.to_string()))?.to_vec());
        } else {
            let value = field.text().await.map_err(|e| AppError::Validation(e.to_string()))?;
            fields.insert(name, value);
        }
    }
    let file_bytes = file_bytes.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    Ok(UploadForm { file_bytes, file_name, fields })
}

#[derive(Serialize)]
struct MediaAssetResponse {
    id: i32,
    chatbot_config_id: i32,
    media_type: String,
    description: String,
    is_accessible_by_ai: bool,
}

impl From<&MediaAsset> for MediaAssetResponse {
    fn from(m: &MediaAsset) -> Self {
        Self {
            id: m.id,
            chatbot_config_id: m.chatbot_config_id,
            media_type: m.media_type.clone(),
            description: m.description.clone(),
            is_accessible_by_ai: m.is_accessible_by_ai,
        }
    }
}

async fn owned_chatbot_config(state: &Arc<AppState>, instance_id: i32) -> Result<crate::models::chatbot::ChatbotConfig, AppError> {
    state
        .chatbot_store
        .find_by_instance(instance_id)?
        .ok_or_else(|| AppError::NotFound("chatbot config".to_string()))
}

async fn owned_media_asset(state: &Arc<AppState>, chatbot_config_id: i32, media_asset_id: i32) -> Result<MediaAsset, AppError> {
    let asset = state.chatbot_store.find_media(media_asset_id)?.ok_or_else(|| AppError::NotFound("media asset".to_string()))?;
    if asset.chatbot_config_id != chatbot_config_id {
        return Err(AppError::NotFound("media asset".to_string()));
    }
    Ok(asset)
}

/// `POST /chatbot/media` (multipart: `file`, `media_type`, `description`,
/// `is_accessible_by_ai`): adds an entry to the chatbot's AI-accessible media
/// catalog (spec §3 `MediaAsset`, grounded on `ChatbotMediaForm`).
pub async fn create_media_asset(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    form: Multipart,
) -> Result<Json<Value>, AppError> {
    let config = owned_chatbot_config(&state, instance.id).await?;
    let upload = read_multipart(form).await?;
    let storage_path = save_blob("asset", &upload.file_name, upload.file_bytes).await?;
    let media_type = upload.fields.get("media_type").cloned().unwrap_or_else(|| "document".to_string());
    let description = upload.fields.get("description").cloned().unwrap_or_default();
    let is_accessible_by_ai = upload.fields.get("is_accessible_by_ai").map(|v| v == "true" || v == "1").unwrap_or(true);

    let asset = state.chatbot_store.insert_media(NewMediaAsset {
        chatbot_config_id: config.id,
        media_type,
        storage_path,
        description,
        is_accessible_by_ai,
        created_at: now_ts(),
    })?;
    Ok(Json(json!({ "media_asset": MediaAssetResponse::from(&asset) })))
}

pub async fn list_media_assets(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
) -> Result<Json<Value>, AppError> {
    let config = owned_chatbot_config(&state, instance.id).await?;
    let assets = state.chatbot_store.accessible_media(config.id)?;
    let items: Vec<MediaAssetResponse> = assets.iter().map(MediaAssetResponse::from).collect();
    Ok(Json(json!({ "media_assets": items })))
}

#[derive(Deserialize)]
pub struct UpdateMediaAssetRequest {
    description: Option<String>,
    is_accessible_by_ai: Option<bool>,
}

pub async fn update_media_asset(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(media_asset_id): Path<i32>,
    Json(req): Json<UpdateMediaAssetRequest>,
) -> Result<Json<Value>, AppError> {
    let config = owned_chatbot_config(&state, instance.id).await?;
    owned_media_asset(&state, config.id, media_asset_id).await?;
    state.chatbot_store.update_media_metadata(media_asset_id, req.description.as_deref(), req.is_accessible_by_ai)?;
    Ok(Json(json!({ "status": "updated" })))
}

/// `POST /chatbot/media/{id}/file` (multipart `file`): replaces the blob behind
/// an existing MediaAsset row, removing the old blob from disk.
pub async fn replace_media_asset_file(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(media_asset_id): Path<i32>,
    form: Multipart,
) -> Result<Json<Value>, AppError> {
    let config = owned_chatbot_config(&state, instance.id).await?;
    owned_media_asset(&state, config.id, media_asset_id).await?;
    let upload = read_multipart(form).await?;
    let new_storage_path = save_blob("asset", &upload.file_name, upload.file_bytes).await?;
    state.chatbot_store.replace_blob(media_asset_id, &new_storage_path)?;
    Ok(Json(json!({ "status": "replaced" })))
}

pub async fn delete_media_asset(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(media_asset_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let config = owned_chatbot_config(&state, instance.id).await?;
    owned_media_asset(&state, config.id, media_asset_id).await?;
    state.chatbot_store.delete_blob(media_asset_id)?;
    Ok(Json(json!({ "status": "deleted" })))
}

#[derive(Serialize)]
struct MediaFileResponse {
    id: i32,
    original_name: String,
    declared_type: String,
    created_at: i32,
}

impl From<&MediaFile> for MediaFileResponse {
    fn from(m: &MediaFile) -> Self {
        Self { id: m.id, original_name: m.original_name.clone(), declared_type: m.declared_type.clone(), created_at: m.created_at }
    }
}

#[derive(Deserialize)]
pub struct ListMediaFilesQuery {
    #[serde(rename = "type")]
    declared_type: Option<String>,
}

/// `GET /media?type=` (§10.4): tenant-scoped catalog of dispatch attachments,
/// grounded on the dispatch-media list view's type filter.
pub async fn list_media_files(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Query(query): Query<ListMediaFilesQuery>,
) -> Result<Json<Value>, AppError> {
    let files = state.media_files.list_for_tenant(instance.tenant_id, query.declared_type.as_deref(), 200)?;
    let items: Vec<MediaFileResponse> = files.iter().map(MediaFileResponse::from).collect();
    Ok(Json(json!({ "media_files": items })))
}

/// `POST /media` (multipart `file`, `original_name`, `type`): uploads a tenant
/// dispatch attachment for later use via `POST /campaigns/{id}/media`.
pub async fn upload_media_file(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    form: Multipart,
) -> Result<Json<Value>, AppError> {
    let upload = read_multipart(form).await?;
    let original_name = upload.fields.get("original_name").cloned().unwrap_or_else(|| upload.file_name.clone());
    let declared_type = upload.fields.get("type").cloned().unwrap_or_else(|| "document".to_string());
    let storage_path = save_blob("file", &upload.file_name, upload.file_bytes).await?;

    let file = state.media_files.create(NewMediaFile {
        tenant_id: instance.tenant_id,
        storage_path,
        original_name,
        declared_type,
        created_at: now_ts(),
    })?;
    Ok(Json(json!({ "media_file": MediaFileResponse::from(&file) })))
}

#[derive(Deserialize)]
pub struct UpdateMediaFileRequest {
    original_name: Option<String>,
    #[serde(rename = "type")]
    declared_type: Option<String>,
}

async fn owned_media_file(state: &Arc<AppState>, tenant_id: i32, media_file_id: i32) -> Result<MediaFile, AppError> {
    let file = state.media_files.find(media_file_id)?.ok_or_else(|| AppError::NotFound("media file".to_string()))?;
    if file.tenant_id != tenant_id {
        return Err(AppError::NotFound("media file".to_string()));
    }
    Ok(file)
}

pub async fn update_media_file(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(media_file_id): Path<i32>,
    Json(req): Json<UpdateMediaFileRequest>,
) -> Result<Json<Value>, AppError> {
    owned_media_file(&state, instance.tenant_id, media_file_id).await?;
    state.media_files.update_metadata(media_file_id, req.original_name.as_deref(), req.declared_type.as_deref())?;
    Ok(Json(json!({ "status": "updated" })))
}

/// `DELETE /media/{id}` (§3 blob invariant): removes the row and its on-disk blob.
pub async fn delete_media_file(
    State(state): State<Arc<AppState>>,
    InstanceAuth { instance }: InstanceAuth,
    Path(media_file_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    owned_media_file(&state, instance.tenant_id, media_file_id).await?;
    state.media_files.delete(media_file_id)?;
    Ok(Json(json!({ "status": "deleted" })))
}
