use std::sync::Arc;
use std::time::Duration;
use serde_json::Value;
use tokio::time::sleep;

use crate::{
    bridge::BridgeClient,
    repositories::instance_store::InstanceStore,
};

fn now_ts() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

/// `open -> CONNECTED`, `close -> DISCONNECTED`, anything else passes through
/// uppercased (spec §4.D's status mapping table).
pub fn normalize_status(remote: &str) -> String {
    match remote {
        "open" => "CONNECTED".to_string(),
        "close" => "DISCONNECTED".to_string(),
        other => other.to_uppercase(),
    }
}

/// Extracts `phone_connected` from a Bridge session/webhook payload: prefers
/// `me.id` (split on ':'), falls back to `phoneNumber` (spec §4.D/§4.E).
pub fn extract_phone_connected(data: &Value) -> Option<String> {
    if let Some(me_id) = data.pointer("/me/id").and_then(Value::as_str) {
        return me_id.split(':').next().map(|s| s.to_string());
    }
    data.get("phoneNumber").and_then(Value::as_str).map(|s| s.to_string())
}

fn extract_token(session: &Value) -> Option<String> {
    for key in ["token", "sessionToken", "bearerToken"] {
        if let Some(token) = session.get(key).and_then(Value::as_str) {
            return Some(token.to_string());
        }
    }
    None
}

pub struct SessionManager {
    bridge: Arc<BridgeClient>,
    instances: Arc<InstanceStore>,
}

impl SessionManager {
    pub fn new(bridge: Arc<BridgeClient>, instances: Arc<InstanceStore>) -> Self {
        Self { bridge, instances }
    }

    /// Invariant: after this returns `Ok(true)`, `instance.token` equals the
    /// Bridge's current token for this session_id (spec §4.D Token Self-Heal).
    pub async fn self_heal_token(&self, session_id: &str) -> anyhow::Result<bool> {
        let (ok, body) = self.bridge.list_sessions().await;
        if !ok {
            return Ok(false);
        }
        let Some(session) = find_session_entry(&body, session_id) else {
            return Ok(false);
        };
        let remote_token = extract_token(&session);
        let remote_status = session.get("status").and_then(Value::as_str).map(normalize_status);
        let remote_phone = extract_phone_connected(&session);
        let Some(instance) = self.instances.find_by_session_id(session_id)? else {
            return Ok(false);
        };
        let mut changed = false;
        if remote_token.as_deref() != instance.token.as_deref() {
            changed = true;
        }
        if remote_status.as_deref() != Some(instance.status.as_str()) {
            changed = true;
        }
        if remote_phone.as_deref() != instance.phone_connected.as_deref() {
            changed = true;
        }
        if changed {
            self.instances.sync_remote_state(
                session_id,
                remote_status.as_deref(),
                remote_token.as_deref(),
                remote_phone.as_deref(),
                now_ts(),
            )?;
        }
        Ok(remote_token.is_some())
    }

    /// Polls the Bridge QR endpoint until CONNECTED or a QR image shows up, or the
    /// deadline elapses (spec §4.D QR wait). Returns the last observed payload.
    pub async fn wait_for_qr(&self, session_id: &str, deadline: Duration, interval: Duration) -> Value {
        let start = tokio::time::Instant::now();
        let mut last = serde_json::json!({});
        loop {
            let (_ok, body) = self.bridge.get_qrcode(session_id).await;
            last = body.clone();
            let status = body.get("status").and_then(Value::as_str).map(normalize_status);
            let has_qr = body.get("qr").and_then(Value::as_str).is_some() || body.get("qrCode").and_then(Value::as_str).is_some();
            if status.as_deref() == Some("CONNECTED") || has_qr {
                return last;
            }
            if start.elapsed() >= deadline {
                return last;
            }
            sleep(interval).await;
        }
    }

    /// One reconciliation sweep (spec §4.D Reconciler). `stale_threshold` of `None`
    /// reconciles every instance; `Some(secs)` restricts to instances whose
    /// `updated_at` is older than `now - secs`.
    pub async fn reconcile_once(&self, start_if_missing: bool, stale_threshold: Option<i32>, max: Option<usize>) -> anyhow::Result<ReconcileReport> {
        let now = now_ts();
        let mut candidates = match stale_threshold {
            Some(secs) => self.instances.list_stale(now - secs)?,
            None => self.instances.list_all()?,
        };
        if let Some(max) = max {
            candidates.truncate(max);
        }
        let (ok, body) = self.bridge.list_sessions().await;
        let mut report = ReconcileReport::default();
        if !ok {
            tracing::warn!("reconciler: bridge list_sessions failed, skipping cycle");
            return Ok(report);
        }
        for instance in candidates {
            report.checked += 1;
            match find_session_entry(&body, &instance.session_id) {
                Some(session) => {
                    let remote_status = session.get("status").and_then(Value::as_str).map(normalize_status);
                    let remote_token = extract_token(&session);
                    let remote_phone = extract_phone_connected(&session);
                    let status_changed = remote_status.as_deref().map_or(false, |s| s != instance.status);
                    let token_changed = remote_token.as_deref() != instance.token.as_deref();
                    let phone_changed = remote_phone.as_deref() != instance.phone_connected.as_deref();
                    if status_changed || token_changed || phone_changed {
                        self.instances.sync_remote_state(
                            &instance.session_id,
                            remote_status.as_deref(),
                            remote_token.as_deref(),
                            remote_phone.as_deref(),
                            now_ts(),
                        )?;
                        report.updated += 1;
                    }
                }
                None => {
                    if instance.status == "CONNECTED" {
                        tracing::warn!(session_id = %instance.session_id, "reconciler: zombie detected, instance connected locally but absent from bridge");
                        self.instances.clear_token_and_phone(instance.id, "DISCONNECTED", now_ts())?;
                        report.zombies += 1;
                    } else if instance.status == "QR_SCANNED" {
                        self.instances.set_status(instance.id, "DISCONNECTED", now_ts())?;
                        report.updated += 1;
                    }
                    if start_if_missing && (instance.status == "CREATED" || instance.status == "DISCONNECTED") {
                        self.bridge.start_session(&instance.session_id).await;
                        report.started += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Continuous reconciler loop driving the `reconcile` CLI command.
    pub async fn reconcile_loop(
        &self,
        cycle_interval: Duration,
        per_instance_pause: Duration,
        start_if_missing: bool,
        stale_threshold: Option<i32>,
        max_per_cycle: Option<usize>,
    ) -> anyhow::Result<()> {
        loop {
            let report = self.reconcile_once(start_if_missing, stale_threshold, max_per_cycle).await?;
            tracing::info!(checked = report.checked, updated = report.updated, zombies = report.zombies, started = report.started, "reconciler cycle complete");
            if !per_instance_pause.is_zero() && report.checked > 0 {
                sleep(per_instance_pause * report.checked as u32).await;
            }
            sleep(cycle_interval).await;
        }
    }
}

#[derive(Default, Debug)]
pub struct ReconcileReport {
    pub checked: usize,
    pub updated: usize,
    pub zombies: usize,
    pub started: usize,
}

/// Normalizes the Bridge's `list_sessions` response shape (a bare list, or an
/// object keyed by `sessions`/`data`/`result`) and locates the entry for `session_id`.
fn find_session_entry(body: &Value, session_id: &str) -> Option<Value> {
    let list = if let Some(arr) = body.as_array() {
        arr.clone()
    } else {
        ["sessions", "data", "result"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default()
    };
    list.into_iter().find(|entry| {
        entry.get("sessionId").and_then(Value::as_str) == Some(session_id)
            || entry.get("id").and_then(Value::as_str) == Some(session_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_open_and_close() {
        assert_eq!(normalize_status("open"), "CONNECTED");
        assert_eq!(normalize_status("close"), "DISCONNECTED");
        assert_eq!(normalize_status("connecting"), "CONNECTING");
    }

    #[test]
    fn phone_prefers_me_id_over_phone_number() {
        let data = serde_json::json!({ "me": { "id": "5511999999999:12@s.whatsapp.net" }, "phoneNumber": "999" });
        assert_eq!(extract_phone_connected(&data), Some("5511999999999".to_string()));
    }

    #[test]
    fn phone_falls_back_to_phone_number_field() {
        let data = serde_json::json!({ "phoneNumber": "5511999999999" });
        assert_eq!(extract_phone_connected(&data), Some("5511999999999".to_string()));
    }

    #[test]
    fn finds_session_in_wrapped_list_shape() {
        let body = serde_json::json!({ "sessions": [{ "sessionId": "sess_a" }, { "sessionId": "sess_b" }] });
        assert!(find_session_entry(&body, "sess_b").is_some());
        assert!(find_session_entry(&body, "sess_c").is_none());
    }
}
