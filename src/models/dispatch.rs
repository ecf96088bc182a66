use diesel::prelude::*;
use crate::schema::{campaigns, recipients, queue_items, instance_dispatch_states};

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = campaigns)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Campaign {
    pub id: i32,
    pub tenant_id: i32,
    pub instance_id: i32,
    pub name: String,
    pub start_at: i32,
    pub min_delay_seconds: i32,
    pub max_delay_seconds: i32,
    pub messages_per_recipient: i32,
    pub use_name_placeholder: bool,
    pub raw_numbers: Option<String>, // newline/comma separated, parsed at planning time
    pub groups: Option<String>, // JSON array of group jids
    pub templates: String, // JSON array of template bodies
    pub status: String, // DRAFT | SCHEDULED | RUNNING | PAUSED | COMPLETED | CANCELED | FAILED
    pub planned: i32,
    pub sent: i32,
    pub failed: i32,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = campaigns)]
pub struct NewCampaign {
    pub tenant_id: i32,
    pub instance_id: i32,
    pub name: String,
    pub start_at: i32,
    pub min_delay_seconds: i32,
    pub max_delay_seconds: i32,
    pub messages_per_recipient: i32,
    pub use_name_placeholder: bool,
    pub raw_numbers: Option<String>,
    pub groups: Option<String>,
    pub templates: String,
    pub status: String,
    pub planned: i32,
    pub sent: i32,
    pub failed: i32,
    pub created_at: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = recipients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Recipient {
    pub id: i32,
    pub campaign_id: i32,
    pub jid: String,
    pub display_name: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = recipients)]
pub struct NewRecipient {
    pub campaign_id: i32,
    pub jid: String,
    pub display_name: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = queue_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueItem {
    pub id: i32,
    pub campaign_id: i32,
    pub recipient_id: i32,
    pub step: i32,
    pub scheduled_at: i32,
    pub status: String, // QUEUED|SENDING|SENT|DELIVERED|READ|PLAYED|FAILED|CANCELED
    pub rendered_body: String,
    pub template_index: i32,
    pub media_file_id: Option<i32>,
    pub wamid: Option<String>,
    pub response_payload: Option<String>,
    pub attempts: i32,
}

#[derive(Insertable)]
#[diesel(table_name = queue_items)]
pub struct NewQueueItem {
    pub campaign_id: i32,
    pub recipient_id: i32,
    pub step: i32,
    pub scheduled_at: i32,
    pub status: String,
    pub rendered_body: String,
    pub template_index: i32,
    pub media_file_id: Option<i32>,
    pub attempts: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = instance_dispatch_states)]
#[diesel(primary_key(instance_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstanceDispatchState {
    pub instance_id: i32,
    pub next_available_at: i32,
}
