use diesel::prelude::*;
use crate::schema::{tenants, plans, instances, webhook_configs, messages, media_files, webhook_error_log};

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = tenants)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Tenant {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub plan_id: Option<i32>,
    pub plan_started_at: Option<i32>,
    pub plan_ends_at: Option<i32>, // None = lifetime plan, no row = no plan at all
    pub module_api: bool,
    pub module_scheduler: bool,
    pub module_chatbot: bool,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = tenants)]
pub struct NewTenant {
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub module_api: bool,
    pub module_scheduler: bool,
    pub module_chatbot: bool,
    pub created_at: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = plans)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Plan {
    pub id: i32,
    pub name: String,
    pub max_instances: i32,
    pub max_chatbots: i32,
    pub monthly_conversations: i32,
    pub duration_kind: String, // "days" | "months" | "years" | "lifetime"
    pub duration_value: i32,
    pub periodicity: String, // "daily" | "monthly" | "quarterly" | "semiannual" | "yearly" | "lifetime"
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = instances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Instance {
    pub id: i32,
    pub tenant_id: i32,
    pub name: String,
    pub session_id: String,
    pub token: Option<String>,
    pub phone_connected: Option<String>,
    pub status: String, // CREATED | QR_SCANNED | CONNECTED | DISCONNECTED | BAN
    pub battery: Option<i32>,
    pub platform: Option<String>,
    pub created_at: i32,
    pub updated_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = instances)]
pub struct NewInstance {
    pub tenant_id: i32,
    pub name: String,
    pub session_id: String,
    pub status: String,
    pub created_at: i32,
    pub updated_at: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = webhook_configs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WebhookConfig {
    pub id: i32,
    pub instance_id: i32,
    pub callback_url: Option<String>,
    pub secret: String,
    pub send_messages: bool,
    pub send_ack: bool,
    pub send_presence: bool,
}

#[derive(Insertable)]
#[diesel(table_name = webhook_configs)]
pub struct NewWebhookConfig {
    pub instance_id: i32,
    pub callback_url: Option<String>,
    pub secret: String,
    pub send_messages: bool,
    pub send_ack: bool,
    pub send_presence: bool,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Message {
    pub id: i32,
    pub instance_id: i32,
    pub remote_jid: String,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub message_type: String,
    pub content: String,
    pub media_url: Option<String>,
    pub wamid: Option<String>,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub instance_id: i32,
    pub remote_jid: String,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub message_type: String,
    pub content: String,
    pub media_url: Option<String>,
    pub wamid: Option<String>,
    pub created_at: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = media_files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MediaFile {
    pub id: i32,
    pub tenant_id: i32,
    pub storage_path: String,
    pub original_name: String,
    pub declared_type: String,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = media_files)]
pub struct NewMediaFile {
    pub tenant_id: i32,
    pub storage_path: String,
    pub original_name: String,
    pub declared_type: String,
    pub created_at: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = webhook_error_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WebhookErrorLogRow {
    pub id: i32,
    pub instance_id: Option<i32>,
    pub session_id: Option<String>,
    pub event_type: Option<String>,
    pub error: String,
    pub payload: Option<String>,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = webhook_error_log)]
pub struct NewWebhookErrorLogRow {
    pub instance_id: Option<i32>,
    pub session_id: Option<String>,
    pub event_type: Option<String>,
    pub error: String,
    pub payload: Option<String>,
    pub created_at: i32,
}
