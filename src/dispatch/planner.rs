use std::sync::Arc;

use serde_json::Value;

use crate::{
    bridge::BridgeClient,
    dispatch::normalize_jid,
    error::AppError,
    models::dispatch::{NewQueueItem, NewRecipient},
    AppState,
};

/// Looks up the participant JIDs of the configured groups via the Bridge's group
/// listing (each group entry embeds its own `participants` array) — spec §4.H step 1.
async fn resolve_group_participants(bridge: &BridgeClient, token: &str, group_jids: &[String]) -> Vec<String> {
    let (ok, body) = bridge.list_groups(token).await;
    if !ok {
        return Vec::new();
    }
    let groups = body.as_array().cloned().unwrap_or_else(|| {
        ["groups", "data", "result"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default()
    });
    let mut jids = Vec::new();
    for group in groups {
        let group_id = group.get("id").or_else(|| group.get("jid")).and_then(Value::as_str).unwrap_or("");
        if !group_jids.iter().any(|g| g == group_id) {
            continue;
        }
        if let Some(participants) = group.get("participants").and_then(Value::as_array) {
            for participant in participants {
                let jid = participant
                    .get("id")
                    .or_else(|| participant.get("jid"))
                    .and_then(Value::as_str)
                    .or_else(|| participant.as_str());
                if let Some(jid) = jid {
                    jids.push(jid.to_string());
                }
            }
        }
    }
    jids
}

/// Drives a Campaign's DRAFT -> SCHEDULED transition (spec §4.H "Planning"): resolves
/// and dedupes recipients, creates one QueueItem per (recipient, step) with round-robin
/// template assignment, and sets the planned total.
pub async fn plan_campaign(state: &Arc<AppState>, campaign_id: i32) -> Result<(), AppError> {
    let campaign = state
        .dispatch_store
        .find_campaign(campaign_id)?
        .ok_or_else(|| AppError::NotFound("campaign".to_string()))?;
    if campaign.status != "DRAFT" {
        return Ok(());
    }

    let instance = state
        .instances
        .find(campaign.instance_id)?
        .ok_or_else(|| AppError::NotFound("instance".to_string()))?;

    let mut jids: Vec<String> = Vec::new();
    if let Some(raw) = &campaign.raw_numbers {
        for entry in raw.split(|c| c == '\n' || c == ',') {
            if let Some(jid) = normalize_jid(entry.trim()) {
                jids.push(jid);
            }
        }
    }
    if let Some(groups_json) = &campaign.groups {
        let group_jids: Vec<String> = serde_json::from_str(groups_json).unwrap_or_default();
        if !group_jids.is_empty() {
            if let Some(token) = &instance.token {
                jids.extend(resolve_group_participants(&state.bridge, token, &group_jids).await);
            }
        }
    }
    jids.sort();
    jids.dedup();

    let templates: Vec<String> = serde_json::from_str(&campaign.templates).unwrap_or_default();
    if templates.is_empty() {
        return Err(AppError::Validation("campaign has no templates configured".to_string()));
    }

    let mut template_counter: usize = 0;
    let mut planned = 0;
    for jid in &jids {
        if state.dispatch_store.recipient_exists(campaign.id, jid)? {
            continue;
        }
        let recipient = state.dispatch_store.insert_recipient(NewRecipient {
            campaign_id: campaign.id,
            jid: jid.clone(),
            display_name: None,
        })?;
        for step in 1..=campaign.messages_per_recipient {
            let template_index = template_counter % templates.len();
            template_counter += 1;
            let rendered_body = if campaign.use_name_placeholder {
                let display_name = recipient.display_name.clone().unwrap_or_default();
                templates[template_index].replace("{nome}", &display_name)
            } else {
                templates[template_index].clone()
            };
            state.dispatch_store.insert_queue_item(NewQueueItem {
                campaign_id: campaign.id,
                recipient_id: recipient.id,
                step,
                scheduled_at: campaign.start_at,
                status: "QUEUED".to_string(),
                rendered_body,
                template_index: template_index as i32,
                media_file_id: None,
                attempts: 0,
            })?;
            planned += 1;
        }
    }

    state.dispatch_store.set_campaign_planned(campaign.id, planned)?;
    state.dispatch_store.set_campaign_status(campaign.id, "SCHEDULED")?;
    Ok(())
}
