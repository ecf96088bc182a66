use diesel::prelude::*;
use diesel::result::Error as DieselError;
use crate::{
    models::core::NewWebhookErrorLogRow,
    schema::webhook_error_log,
    DbPool,
};

pub struct WebhookErrorLogRepository {
    pool: DbPool,
}

impl WebhookErrorLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn record(
        &self,
        instance_id: Option<i32>,
        session_id: Option<&str>,
        event_type: Option<&str>,
        error: &str,
        payload: Option<&str>,
        now: i32,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(webhook_error_log::table)
            .values(&NewWebhookErrorLogRow {
                instance_id,
                session_id: session_id.map(|s| s.to_string()),
                event_type: event_type.map(|s| s.to_string()),
                error: error.to_string(),
                payload: payload.map(|s| s.to_string()),
                created_at: now,
            })
            .execute(&mut conn)?;
        Ok(())
    }
}
