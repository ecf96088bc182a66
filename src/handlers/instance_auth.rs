use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{models::core::Instance, repositories::identity::is_plan_valid, AppState};

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

#[derive(Debug)]
pub struct AuthError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Bearer-instance-token extractor for the northbound API (spec §6): resolves
/// `Authorization: Bearer <instance.token>` to an `Instance`, then enforces the
/// pre-send check — owning Tenant must be plan-valid AND `module_api=true`.
pub struct InstanceAuth {
    pub instance: Instance,
}

impl FromRequestParts<Arc<AppState>> for InstanceAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AuthError {
                status: StatusCode::UNAUTHORIZED,
                message: "missing bearer token".to_string(),
            })?;

        let instance = state
            .instances
            .find_by_token(token)
            .map_err(|_| AuthError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "internal error".to_string(),
            })?
            .ok_or(AuthError {
                status: StatusCode::UNAUTHORIZED,
                message: "invalid instance token".to_string(),
            })?;

        let tenant = state
            .identity
            .find_tenant(instance.tenant_id)
            .map_err(|_| AuthError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "internal error".to_string(),
            })?
            .ok_or(AuthError {
                status: StatusCode::FORBIDDEN,
                message: "tenant not found".to_string(),
            })?;

        if !is_plan_valid(&tenant, now_ts()) {
            return Err(AuthError {
                status: StatusCode::FORBIDDEN,
                message: "tenant plan is not valid".to_string(),
            });
        }
        if !tenant.module_api {
            return Err(AuthError {
                status: StatusCode::FORBIDDEN,
                message: "api module not enabled for tenant".to_string(),
            });
        }

        Ok(InstanceAuth { instance })
    }
}

/// Shared-secret gate for the control-plane endpoints that predate an Instance
/// having a token of its own (create/list/delete/start/status/qr, campaign admin).
/// Uses the same `x-api-key` convention as the webhook ingress (spec §6).
pub struct AdminKeyAuth;

impl FromRequestParts<Arc<AppState>> for AdminKeyAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let expected = std::env::var("WEBHOOK_ADMIN_SECRET").unwrap_or_default();
        let is_dev = std::env::var("ENVIRONMENT").as_deref() == Ok("development");
        let provided = parts.headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or("");
        if is_dev || provided == expected {
            Ok(AdminKeyAuth)
        } else {
            Err(AuthError { status: StatusCode::UNAUTHORIZED, message: "invalid admin key".to_string() })
        }
    }
}
