use diesel::prelude::*;
use diesel::result::Error as DieselError;
use crate::{
    models::chatbot::{ChatbotConfig, ChatbotTransfer, ChatbotContact, NewChatbotContact, MediaAsset},
    schema::{chatbot_configs, chatbot_transfers, chatbot_contacts, media_assets},
    DbPool,
};

pub struct ChatbotStore {
    pool: DbPool,
}

impl ChatbotStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn find(&self, chatbot_config_id: i32) -> Result<Option<ChatbotConfig>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        chatbot_configs::table.find(chatbot_config_id).first::<ChatbotConfig>(&mut conn).optional()
    }

    pub fn find_by_instance(&self, instance_id: i32) -> Result<Option<ChatbotConfig>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        chatbot_configs::table
            .filter(chatbot_configs::instance_id.eq(instance_id))
            .first::<ChatbotConfig>(&mut conn)
            .optional()
    }

    pub fn active_transfers(&self, chatbot_config_id: i32) -> Result<Vec<ChatbotTransfer>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        chatbot_transfers::table
            .filter(chatbot_transfers::chatbot_config_id.eq(chatbot_config_id))
            .filter(chatbot_transfers::active.eq(true))
            .order(chatbot_transfers::position.asc())
            .limit(5)
            .load::<ChatbotTransfer>(&mut conn)
    }

    pub fn accessible_media(&self, chatbot_config_id: i32) -> Result<Vec<MediaAsset>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        media_assets::table
            .filter(media_assets::chatbot_config_id.eq(chatbot_config_id))
            .filter(media_assets::is_accessible_by_ai.eq(true))
            .limit(30)
            .load::<MediaAsset>(&mut conn)
    }

    pub fn find_media(&self, media_asset_id: i32) -> Result<Option<MediaAsset>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        media_assets::table.find(media_asset_id).first::<MediaAsset>(&mut conn).optional()
    }

    pub fn insert_media(&self, new_media: crate::models::chatbot::NewMediaAsset) -> Result<MediaAsset, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(media_assets::table).values(&new_media).execute(&mut conn)?;
        media_assets::table.order(media_assets::id.desc()).first::<MediaAsset>(&mut conn)
    }

    pub fn update_media_metadata(
        &self,
        media_asset_id: i32,
        description: Option<&str>,
        is_accessible_by_ai: Option<bool>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(media_assets::table.find(media_asset_id))
            .set((
                description.map(|d| media_assets::description.eq(d.to_string())),
                is_accessible_by_ai.map(|a| media_assets::is_accessible_by_ai.eq(a)),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// `replace_blob`/`delete_blob` are the only places that touch the filesystem for
    /// media assets (spec §9's redesign note): both the row and the on-disk blob are
    /// owned here, so neither can be deleted/replaced without the other following.
    pub fn replace_blob(&self, media_asset_id: i32, new_storage_path: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let old = media_assets::table
            .find(media_asset_id)
            .select(media_assets::storage_path)
            .first::<String>(&mut conn)?;
        diesel::update(media_assets::table.find(media_asset_id))
            .set(media_assets::storage_path.eq(new_storage_path))
            .execute(&mut conn)?;
        if old != new_storage_path {
            let _ = std::fs::remove_file(&old);
        }
        Ok(())
    }

    pub fn delete_blob(&self, media_asset_id: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let path = media_assets::table
            .find(media_asset_id)
            .select(media_assets::storage_path)
            .first::<String>(&mut conn)?;
        diesel::delete(media_assets::table.find(media_asset_id)).execute(&mut conn)?;
        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    pub fn get_or_create_contact(
        &self,
        chatbot_config_id: i32,
        remote_jid: &str,
        now: i32,
    ) -> Result<ChatbotContact, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        conn.transaction::<_, DieselError, _>(|conn| {
            let existing = chatbot_contacts::table
                .filter(chatbot_contacts::chatbot_config_id.eq(chatbot_config_id))
                .filter(chatbot_contacts::remote_jid.eq(remote_jid))
                .first::<ChatbotContact>(conn)
                .optional()?;
            if let Some(contact) = existing {
                diesel::update(chatbot_contacts::table.find(contact.id))
                    .set(chatbot_contacts::last_interaction_at.eq(now))
                    .execute(conn)?;
                return chatbot_contacts::table.find(contact.id).first::<ChatbotContact>(conn);
            }
            diesel::insert_into(chatbot_contacts::table)
                .values(&NewChatbotContact {
                    chatbot_config_id,
                    remote_jid: remote_jid.to_string(),
                    confirmed_name: None,
                    notes: None,
                    is_blocked: false,
                    first_interaction_at: now,
                    last_interaction_at: now,
                })
                .execute(conn)?;
            chatbot_contacts::table.order(chatbot_contacts::id.desc()).first::<ChatbotContact>(conn)
        })
    }

    pub fn set_confirmed_name(&self, contact_id: i32, name: Option<&str>) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(chatbot_contacts::table.find(contact_id))
            .set(chatbot_contacts::confirmed_name.eq(name.map(|s| s.to_string())))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Rollover-aware quota check (spec §4.A/§4.G). Performed under a single UPDATE so
    /// the rollover reset and the subsequent increment happen atomically with respect
    /// to other workers touching the same row (spec §9's "self-referential bookkeeping"
    /// note, addressed here instead of via an app-level lock).
    pub fn check_and_increment_conversation_quota(
        &self,
        chatbot_config_id: i32,
        periodicity: &str,
        monthly_conversations_limit: i32,
        now: i32,
    ) -> Result<bool, DieselError> {
        use crate::repositories::identity::quota_bucket_changed;
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        conn.transaction::<_, DieselError, _>(|conn| {
            let config = chatbot_configs::table.find(chatbot_config_id).first::<ChatbotConfig>(conn)?;
            let (count, reset_date) = if quota_bucket_changed(periodicity, config.last_reset_date, now) {
                (0, now)
            } else {
                (config.conversations_count, config.last_reset_date)
            };
            if count >= monthly_conversations_limit {
                diesel::update(chatbot_configs::table.find(chatbot_config_id))
                    .set((
                        chatbot_configs::conversations_count.eq(count),
                        chatbot_configs::last_reset_date.eq(reset_date),
                    ))
                    .execute(conn)?;
                return Ok(false);
            }
            diesel::update(chatbot_configs::table.find(chatbot_config_id))
                .set((
                    chatbot_configs::conversations_count.eq(count + 1),
                    chatbot_configs::last_reset_date.eq(reset_date),
                ))
                .execute(conn)?;
            Ok(true)
        })
    }

    pub fn add_tokens_used(&self, chatbot_config_id: i32, tokens: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(chatbot_configs::table.find(chatbot_config_id))
            .set(chatbot_configs::current_tokens_used.eq(chatbot_configs::current_tokens_used + tokens))
            .execute(&mut conn)?;
        Ok(())
    }
}
