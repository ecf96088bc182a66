use diesel::prelude::*;
use crate::schema::{chatbot_configs, chatbot_transfers, chatbot_contacts, media_assets};

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = chatbot_configs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChatbotConfig {
    pub id: i32,
    pub tenant_id: i32,
    pub instance_id: i32,
    pub active: bool,
    pub company_name: String,
    pub tone: String,
    pub segment: String, // "sales" | "support" | "scheduling" | "legal" | "education" | ...
    pub trigger_on_groups: bool,
    pub simulate_typing: bool,
    pub typing_time_min: i32,
    pub typing_time_max: i32,
    pub use_history: bool,
    pub history_limit: i32, // <= 30
    pub ai_provider: String, // "openai" | "gemini"
    pub ai_model: String,
    pub ai_api_key: String,
    pub allow_media_response: bool,
    pub business_summary: Option<String>,
    pub business_hours: Option<String>,
    pub context: Option<String>,
    pub skills: Option<String>,
    pub extras: Option<String>,
    pub internal_notes: Option<String>,
    pub conversations_count: i32,
    pub last_reset_date: i32,
    pub current_tokens_used: i32,
    pub token_limit: i32,
    pub token_usage_kind: String, // "infinity" | "finite"
}

#[derive(Insertable)]
#[diesel(table_name = chatbot_configs)]
pub struct NewChatbotConfig {
    pub tenant_id: i32,
    pub instance_id: i32,
    pub active: bool,
    pub company_name: String,
    pub tone: String,
    pub segment: String,
    pub trigger_on_groups: bool,
    pub simulate_typing: bool,
    pub typing_time_min: i32,
    pub typing_time_max: i32,
    pub use_history: bool,
    pub history_limit: i32,
    pub ai_provider: String,
    pub ai_model: String,
    pub ai_api_key: String,
    pub allow_media_response: bool,
    pub conversations_count: i32,
    pub last_reset_date: i32,
    pub current_tokens_used: i32,
    pub token_limit: i32,
    pub token_usage_kind: String,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = chatbot_transfers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChatbotTransfer {
    pub id: i32,
    pub chatbot_config_id: i32,
    pub label: String,
    pub phone_number: String,
    pub active: bool,
    pub position: i32,
}

#[derive(Insertable)]
#[diesel(table_name = chatbot_transfers)]
pub struct NewChatbotTransfer {
    pub chatbot_config_id: i32,
    pub label: String,
    pub phone_number: String,
    pub active: bool,
    pub position: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = chatbot_contacts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChatbotContact {
    pub id: i32,
    pub chatbot_config_id: i32,
    pub remote_jid: String,
    pub confirmed_name: Option<String>,
    pub notes: Option<String>,
    pub is_blocked: bool,
    pub first_interaction_at: i32,
    pub last_interaction_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = chatbot_contacts)]
pub struct NewChatbotContact {
    pub chatbot_config_id: i32,
    pub remote_jid: String,
    pub confirmed_name: Option<String>,
    pub notes: Option<String>,
    pub is_blocked: bool,
    pub first_interaction_at: i32,
    pub last_interaction_at: i32,
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = media_assets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MediaAsset {
    pub id: i32,
    pub chatbot_config_id: i32,
    pub media_type: String, // "image" | "audio" | "video" | "document"
    pub storage_path: String,
    pub description: String,
    pub is_accessible_by_ai: bool,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = media_assets)]
pub struct NewMediaAsset {
    pub chatbot_config_id: i32,
    pub media_type: String,
    pub storage_path: String,
    pub description: String,
    pub is_accessible_by_ai: bool,
    pub created_at: i32,
}
