use diesel::prelude::*;
use diesel::result::Error as DieselError;
use rand::Rng;
use crate::{
    models::core::{Instance, NewInstance, WebhookConfig, NewWebhookConfig},
    schema::{instances, webhook_configs},
    DbPool,
};

pub struct InstanceStore {
    pool: DbPool,
}

fn random_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

impl InstanceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates the Instance row (status=CREATED) and its 1:1 WebhookConfig with a
    /// freshly generated secret. Caller is responsible for the plan/quota gate (§4.A).
    pub fn create(&self, tenant_id: i32, name: &str, now: i32) -> Result<Instance, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let session_id = format!("sess_{}", random_hex(8));
        let new_instance = NewInstance {
            tenant_id,
            name: name.to_string(),
            session_id,
            status: "CREATED".to_string(),
            created_at: now,
            updated_at: now,
        };
        let instance = conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(instances::table)
                .values(&new_instance)
                .execute(conn)?;
            let instance = instances::table
                .order(instances::id.desc())
                .first::<Instance>(conn)?;
            diesel::insert_into(webhook_configs::table)
                .values(&NewWebhookConfig {
                    instance_id: instance.id,
                    callback_url: None,
                    secret: random_hex(24),
                    send_messages: true,
                    send_ack: false,
                    send_presence: false,
                })
                .execute(conn)?;
            Ok(instance)
        })?;
        Ok(instance)
    }

    pub fn find(&self, instance_id: i32) -> Result<Option<Instance>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table.find(instance_id).first::<Instance>(&mut conn).optional()
    }

    pub fn find_by_session_id(&self, session_id: &str) -> Result<Option<Instance>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table
            .filter(instances::session_id.eq(session_id))
            .first::<Instance>(&mut conn)
            .optional()
    }

    pub fn find_by_token(&self, token: &str) -> Result<Option<Instance>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table
            .filter(instances::token.eq(token))
            .first::<Instance>(&mut conn)
            .optional()
    }

    pub fn list_for_tenant(&self, tenant_id: i32) -> Result<Vec<Instance>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table
            .filter(instances::tenant_id.eq(tenant_id))
            .load::<Instance>(&mut conn)
    }

    pub fn list_all(&self) -> Result<Vec<Instance>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table.load::<Instance>(&mut conn)
    }

    pub fn list_stale(&self, older_than: i32) -> Result<Vec<Instance>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table
            .filter(instances::updated_at.lt(older_than))
            .load::<Instance>(&mut conn)
    }

    /// Field-scoped status/token/phone update, keyed on session_id (compare-and-set
    /// semantics per spec §5's shared-resource policy: the reconciler and webhook
    /// ingress only ever touch these three fields together).
    pub fn sync_remote_state(
        &self,
        session_id: &str,
        status: Option<&str>,
        token: Option<&str>,
        phone_connected: Option<&str>,
        now: i32,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(instances::table.filter(instances::session_id.eq(session_id)))
            .set((
                status.map(|s| instances::status.eq(s.to_string())),
                token.map(|t| instances::token.eq(Some(t.to_string()))),
                phone_connected.map(|p| instances::phone_connected.eq(Some(p.to_string()))),
                instances::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn clear_token_and_phone(&self, instance_id: i32, status: &str, now: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(instances::table.find(instance_id))
            .set((
                instances::status.eq(status.to_string()),
                instances::token.eq(None::<String>),
                instances::phone_connected.eq(None::<String>),
                instances::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn set_status(&self, instance_id: i32, status: &str, now: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(instances::table.find(instance_id))
            .set((instances::status.eq(status.to_string()), instances::updated_at.eq(now)))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Local removal is authoritative regardless of the Bridge delete call's outcome (§4.B).
    pub fn delete(&self, instance_id: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::delete(instances::table.find(instance_id)).execute(&mut conn)?;
        Ok(())
    }

    pub fn webhook_config(&self, instance_id: i32) -> Result<Option<WebhookConfig>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        webhook_configs::table
            .filter(webhook_configs::instance_id.eq(instance_id))
            .first::<WebhookConfig>(&mut conn)
            .optional()
    }

    pub fn update_webhook_config(
        &self,
        instance_id: i32,
        callback_url: Option<&str>,
        send_messages: bool,
        send_ack: bool,
        send_presence: bool,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(webhook_configs::table.filter(webhook_configs::instance_id.eq(instance_id)))
            .set((
                webhook_configs::callback_url.eq(callback_url.map(|s| s.to_string())),
                webhook_configs::send_messages.eq(send_messages),
                webhook_configs::send_ack.eq(send_ack),
                webhook_configs::send_presence.eq(send_presence),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::random_hex;

    #[test]
    fn random_hex_has_expected_length() {
        assert_eq!(random_hex(16).len(), 32);
    }
}
