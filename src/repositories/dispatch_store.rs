use diesel::prelude::*;
use diesel::result::Error as DieselError;
use crate::{
    models::dispatch::{Campaign, NewCampaign, NewRecipient, Recipient, NewQueueItem, QueueItem, InstanceDispatchState},
    schema::{campaigns, recipients, queue_items, instance_dispatch_states},
    DbPool,
};

pub struct DispatchStore {
    pool: DbPool,
}

impl DispatchStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert_campaign(&self, new_campaign: NewCampaign) -> Result<Campaign, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(campaigns::table)
            .values(&new_campaign)
            .execute(&mut conn)?;
        campaigns::table.order(campaigns::id.desc()).first::<Campaign>(&mut conn)
    }

    pub fn find_campaign(&self, campaign_id: i32) -> Result<Option<Campaign>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        campaigns::table.find(campaign_id).first::<Campaign>(&mut conn).optional()
    }

    pub fn set_campaign_status(&self, campaign_id: i32, status: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(campaigns::table.find(campaign_id))
            .set(campaigns::status.eq(status.to_string()))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn set_campaign_planned(&self, campaign_id: i32, planned: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(campaigns::table.find(campaign_id))
            .set(campaigns::planned.eq(planned))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn insert_recipient(&self, new_recipient: NewRecipient) -> Result<Recipient, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(recipients::table)
            .values(&new_recipient)
            .execute(&mut conn)?;
        recipients::table.order(recipients::id.desc()).first::<Recipient>(&mut conn)
    }

    pub fn find_recipient(&self, recipient_id: i32) -> Result<Option<Recipient>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        recipients::table.find(recipient_id).first::<Recipient>(&mut conn).optional()
    }

    pub fn recipient_exists(&self, campaign_id: i32, jid: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let count: i64 = recipients::table
            .filter(recipients::campaign_id.eq(campaign_id))
            .filter(recipients::jid.eq(jid))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    pub fn insert_queue_item(&self, new_item: NewQueueItem) -> Result<QueueItem, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(queue_items::table)
            .values(&new_item)
            .execute(&mut conn)?;
        queue_items::table.order(queue_items::id.desc()).first::<QueueItem>(&mut conn)
    }

    /// Candidate QueueItems: QUEUED, due, whose Campaign is RUNNING and whose
    /// owning Instance is not still cooling down (§4.H worker loop steps 1-2).
    pub fn due_items_for_instance(&self, instance_id: i32, now: i32, limit: i64) -> Result<Vec<QueueItem>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        queue_items::table
            .inner_join(campaigns::table)
            .filter(campaigns::instance_id.eq(instance_id))
            .filter(campaigns::status.eq("RUNNING"))
            .filter(queue_items::status.eq("QUEUED"))
            .filter(queue_items::scheduled_at.le(now))
            .order(queue_items::scheduled_at.asc())
            .limit(limit)
            .select(QueueItem::as_select())
            .load::<QueueItem>(&mut conn)
    }

    /// Single-claim lock: only the caller whose UPDATE affects a row wins the
    /// QUEUED -> SENDING transition (spec §5's shared-resource policy).
    pub fn try_claim(&self, queue_item_id: i32) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let affected = diesel::update(
            queue_items::table
                .filter(queue_items::id.eq(queue_item_id))
                .filter(queue_items::status.eq("QUEUED")),
        )
        .set((queue_items::status.eq("SENDING"), queue_items::attempts.eq(queue_items::attempts + 1)))
        .execute(&mut conn)?;
        Ok(affected == 1)
    }

    pub fn mark_sent(&self, queue_item_id: i32, wamid: Option<&str>) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(queue_items::table.find(queue_item_id))
            .set((queue_items::status.eq("SENT"), queue_items::wamid.eq(wamid.map(|s| s.to_string()))))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn mark_failed(&self, queue_item_id: i32, error: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(queue_items::table.find(queue_item_id))
            .set((queue_items::status.eq("FAILED"), queue_items::response_payload.eq(Some(error.to_string()))))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn increment_campaign_counter(&self, campaign_id: i32, field: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        match field {
            "sent" => diesel::update(campaigns::table.find(campaign_id))
                .set(campaigns::sent.eq(campaigns::sent + 1))
                .execute(&mut conn)?,
            "failed" => diesel::update(campaigns::table.find(campaign_id))
                .set(campaigns::failed.eq(campaigns::failed + 1))
                .execute(&mut conn)?,
            _ => 0,
        };
        Ok(())
    }

    /// Monotonic status advance for ack correlation (spec §4.H): never regresses
    /// SENT -> DELIVERED -> READ -> PLAYED.
    pub fn advance_status_by_wamid(&self, wamid: &str, new_status: &str) -> Result<(), DieselError> {
        const ORDER: [&str; 4] = ["SENT", "DELIVERED", "READ", "PLAYED"];
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let Some(item) = queue_items::table
            .filter(queue_items::wamid.eq(wamid))
            .first::<QueueItem>(&mut conn)
            .optional()?
        else {
            return Ok(());
        };
        let current_rank = ORDER.iter().position(|s| *s == item.status).unwrap_or(0);
        let new_rank = ORDER.iter().position(|s| *s == new_status).unwrap_or(0);
        if new_rank > current_rank {
            diesel::update(queue_items::table.find(item.id))
                .set(queue_items::status.eq(new_status.to_string()))
                .execute(&mut conn)?;
        }
        Ok(())
    }

    pub fn campaign_counts(&self, campaign_id: i32) -> Result<(i64, i64, i64), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let delivered: i64 = queue_items::table
            .filter(queue_items::campaign_id.eq(campaign_id))
            .filter(queue_items::status.eq_any(["DELIVERED", "READ", "PLAYED"]))
            .count()
            .get_result(&mut conn)?;
        let read: i64 = queue_items::table
            .filter(queue_items::campaign_id.eq(campaign_id))
            .filter(queue_items::status.eq_any(["READ", "PLAYED"]))
            .count()
            .get_result(&mut conn)?;
        let total: i64 = queue_items::table
            .filter(queue_items::campaign_id.eq(campaign_id))
            .count()
            .get_result(&mut conn)?;
        Ok((delivered, read, total))
    }

    pub fn list_queue_items(&self, campaign_id: i32) -> Result<Vec<QueueItem>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        queue_items::table
            .filter(queue_items::campaign_id.eq(campaign_id))
            .order(queue_items::id.asc())
            .load::<QueueItem>(&mut conn)
    }

    pub fn next_available_at(&self, instance_id: i32) -> Result<i32, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let state = instance_dispatch_states::table
            .find(instance_id)
            .first::<InstanceDispatchState>(&mut conn)
            .optional()?;
        Ok(state.map(|s| s.next_available_at).unwrap_or(0))
    }

    /// Attaches or clears the media file a campaign's queue items should send
    /// alongside their rendered text (§10.4 campaign media attachment endpoints).
    pub fn set_queue_item_media(&self, queue_item_id: i32, media_file_id: Option<i32>) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(queue_items::table.find(queue_item_id))
            .set(queue_items::media_file_id.eq(media_file_id))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn set_next_available_at(&self, instance_id: i32, at: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(instance_dispatch_states::table)
            .values(InstanceDispatchState { instance_id, next_available_at: at })
            .on_conflict(instance_dispatch_states::instance_id)
            .do_update()
            .set(instance_dispatch_states::next_available_at.eq(at))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn instances_with_due_work(&self, now: i32) -> Result<Vec<i32>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        queue_items::table
            .inner_join(campaigns::table)
            .filter(campaigns::status.eq_any(["RUNNING", "SCHEDULED"]))
            .filter(queue_items::status.eq("QUEUED"))
            .filter(queue_items::scheduled_at.le(now))
            .select(campaigns::instance_id)
            .distinct()
            .load::<i32>(&mut conn)
    }

    /// Transitions any campaign whose start_at has arrived from SCHEDULED to RUNNING.
    pub fn activate_scheduled_campaigns(&self, now: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        diesel::update(
            campaigns::table
                .filter(campaigns::status.eq("SCHEDULED"))
                .filter(campaigns::start_at.le(now)),
        )
        .set(campaigns::status.eq("RUNNING"))
        .execute(&mut conn)?;
        Ok(())
    }

    /// Completes any RUNNING campaign whose sent+failed+canceled has reached its
    /// planned total. CANCELED queue items are terminal and must count toward
    /// completion or a campaign with any canceled recipient never finishes.
    pub fn complete_finished_campaigns(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let running = campaigns::table
            .filter(campaigns::status.eq("RUNNING"))
            .load::<Campaign>(&mut conn)?;
        for campaign in running {
            let canceled: i64 = queue_items::table
                .filter(queue_items::campaign_id.eq(campaign.id))
                .filter(queue_items::status.eq("CANCELED"))
                .count()
                .get_result(&mut conn)?;
            if (campaign.sent + campaign.failed) as i64 + canceled >= campaign.planned as i64 {
                diesel::update(campaigns::table.find(campaign.id))
                    .set(campaigns::status.eq("COMPLETED"))
                    .execute(&mut conn)?;
            }
        }
        Ok(())
    }
}
