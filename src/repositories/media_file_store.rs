use diesel::prelude::*;
use diesel::result::Error as DieselError;
use crate::{
    models::core::{MediaFile, NewMediaFile},
    schema::media_files,
    DbPool,
};

/// Tenant-owned dispatch media catalog backing campaign attachments (spec §3
/// `MediaFile`). Distinct from `ChatbotStore`'s `media_assets`, which is the
/// per-chatbot AI-accessible catalog the engine draws on for conversational replies.
pub struct MediaFileStore {
    pool: DbPool,
}

impl MediaFileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, new_file: NewMediaFile) -> Result<MediaFile, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(media_files::table).values(&new_file).execute(&mut conn)?;
        media_files::table.order(media_files::id.desc()).first::<MediaFile>(&mut conn)
    }

    pub fn find(&self, media_file_id: i32) -> Result<Option<MediaFile>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        media_files::table.find(media_file_id).first::<MediaFile>(&mut conn).optional()
    }

    pub fn list_for_tenant(&self, tenant_id: i32, declared_type: Option<&str>, limit: i64) -> Result<Vec<MediaFile>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let mut query = media_files::table.filter(media_files::tenant_id.eq(tenant_id)).into_boxed();
        if let Some(t) = declared_type {
            query = query.filter(media_files::declared_type.eq(t.to_string()));
        }
        query.order(media_files::created_at.desc()).limit(limit).load::<MediaFile>(&mut conn)
    }

    pub fn update_metadata(&self, media_file_id: i32, original_name: Option<&str>, declared_type: Option<&str>) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(media_files::table.find(media_file_id))
            .set((
                original_name.map(|s| media_files::original_name.eq(s.to_string())),
                declared_type.map(|s| media_files::declared_type.eq(s.to_string())),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Deletes the row and removes its blob from disk — the only place that touches
    /// the filesystem for tenant dispatch media (spec §3 `MediaFile` lifecycle).
    pub fn delete(&self, media_file_id: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let path = media_files::table
            .find(media_file_id)
            .select(media_files::storage_path)
            .first::<String>(&mut conn)?;
        diesel::delete(media_files::table.find(media_file_id)).execute(&mut conn)?;
        let _ = std::fs::remove_file(&path);
        Ok(())
    }
}
