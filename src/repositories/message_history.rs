use diesel::prelude::*;
use diesel::result::Error as DieselError;
use crate::{
    models::core::{Message, NewMessage},
    schema::messages,
    DbPool,
};

pub const MAX_HISTORY_CHARS_PER_MSG: usize = 900;
pub const MAX_HISTORY_MESSAGES_HARD_CAP: i64 = 30;

pub struct MessageHistory {
    pool: DbPool,
}

impl MessageHistory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn wamid_exists(&self, wamid: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let count: i64 = messages::table
            .filter(messages::wamid.eq(wamid))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    pub fn append(&self, new_message: NewMessage) -> Result<Message, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(messages::table)
            .values(&new_message)
            .execute(&mut conn)?;
        messages::table.order(messages::id.desc()).first::<Message>(&mut conn)
    }

    /// Up to `limit` (<= 30) most-recent non-empty messages for (instance, remote_jid),
    /// in chronological order, each truncated to 900 chars (§4.F).
    pub fn recent(&self, instance_id: i32, remote_jid: &str, limit: i64) -> Result<Vec<Message>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let limit = limit.min(MAX_HISTORY_MESSAGES_HARD_CAP);
        let mut rows = messages::table
            .filter(messages::instance_id.eq(instance_id))
            .filter(messages::remote_jid.eq(remote_jid))
            .filter(messages::content.ne(""))
            .order(messages::id.desc())
            .limit(limit)
            .load::<Message>(&mut conn)?;
        rows.reverse();
        for row in rows.iter_mut() {
            if row.content.chars().count() > MAX_HISTORY_CHARS_PER_MSG {
                row.content = row.content.chars().take(MAX_HISTORY_CHARS_PER_MSG).collect();
            }
        }
        Ok(rows)
    }

    pub fn last_from_bot(&self, instance_id: i32, remote_jid: &str) -> Result<Option<Message>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        messages::table
            .filter(messages::instance_id.eq(instance_id))
            .filter(messages::remote_jid.eq(remote_jid))
            .filter(messages::from_me.eq(true))
            .order(messages::id.desc())
            .first::<Message>(&mut conn)
            .optional()
    }
}
