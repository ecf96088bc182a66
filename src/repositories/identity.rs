use diesel::prelude::*;
use diesel::result::Error as DieselError;
use crate::{
    models::core::{Tenant, Plan},
    schema::{tenants, plans},
    DbPool,
};

pub struct IdentityRepository {
    pool: DbPool,
}

impl IdentityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn find_tenant(&self, tenant_id: i32) -> Result<Option<Tenant>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        tenants::table.find(tenant_id).first::<Tenant>(&mut conn).optional()
    }

    pub fn find_plan(&self, plan_id: i32) -> Result<Option<Plan>, DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        plans::table.find(plan_id).first::<Plan>(&mut conn).optional()
    }

    pub fn count_instances(&self, tenant_id: i32) -> Result<i64, DieselError> {
        use crate::schema::instances;
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        instances::table
            .filter(instances::tenant_id.eq(tenant_id))
            .count()
            .get_result(&mut conn)
    }

    pub fn count_chatbots(&self, tenant_id: i32) -> Result<i64, DieselError> {
        use crate::schema::chatbot_configs;
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        chatbot_configs::table
            .filter(chatbot_configs::tenant_id.eq(tenant_id))
            .count()
            .get_result(&mut conn)
    }

    pub fn assign_plan(&self, tenant_id: i32, plan: &Plan, now: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().expect("Failed to get DB connection");
        let ends_at = match plan.duration_kind.as_str() {
            "lifetime" => None,
            "days" => Some(now + plan.duration_value * 86_400),
            "months" => Some(now + plan.duration_value * 30 * 86_400),
            "years" => Some(now + plan.duration_value * 365 * 86_400),
            _ => None,
        };
        diesel::update(tenants::table.find(tenant_id))
            .set((
                tenants::plan_id.eq(Some(plan.id)),
                tenants::plan_started_at.eq(Some(now)),
                tenants::plan_ends_at.eq(ends_at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}

/// True iff the tenant has a plan AND (the plan has no end, or `now` precedes it).
pub fn is_plan_valid(tenant: &Tenant, now: i32) -> bool {
    tenant.plan_id.is_some() && tenant.plan_ends_at.map_or(true, |end| now < end)
}

/// Instance-creation gate (spec §4.A): the tenant's current Instance count must stay
/// strictly below the plan's `max_instances`.
pub fn can_create_instance(plan: &Plan, current_instances: i64) -> bool {
    current_instances < plan.max_instances as i64
}

/// ChatbotConfig-creation gate (spec §4.A), same shape as `can_create_instance`.
pub fn can_create_chatbot(plan: &Plan, current_chatbots: i64) -> bool {
    current_chatbots < plan.max_chatbots as i64
}

/// Calendar-bucket rollover rule shared by chatbot quota counters (spec §4.A).
///
/// `periodicity` is one of "daily" | "monthly" | "quarterly" | "semiannual" | "yearly" | "lifetime".
pub fn quota_bucket_changed(periodicity: &str, last_reset_date: i32, now: i32) -> bool {
    use chrono::{DateTime, Datelike, Utc};
    if periodicity == "lifetime" {
        return false;
    }
    let last = DateTime::<Utc>::from_timestamp(last_reset_date as i64, 0).unwrap_or_default();
    let cur = DateTime::<Utc>::from_timestamp(now as i64, 0).unwrap_or_default();
    match periodicity {
        "daily" => last.date_naive() != cur.date_naive(),
        "monthly" => (last.year(), last.month()) != (cur.year(), cur.month()),
        "quarterly" => (last.year(), (last.month() - 1) / 3) != (cur.year(), (cur.month() - 1) / 3),
        "semiannual" => (last.year(), (last.month() - 1) / 6) != (cur.year(), (cur.month() - 1) / 6),
        "yearly" => last.year() != cur.year(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_plan_is_always_valid() {
        let tenant = Tenant {
            id: 1,
            email: "a@b.com".into(),
            name: "a".into(),
            phone_number: None,
            plan_id: Some(1),
            plan_started_at: Some(0),
            plan_ends_at: None,
            module_api: true,
            module_scheduler: false,
            module_chatbot: true,
            created_at: 0,
        };
        assert!(is_plan_valid(&tenant, 9_999_999_999));
    }

    #[test]
    fn expired_plan_is_invalid() {
        let tenant = Tenant {
            id: 1,
            email: "a@b.com".into(),
            name: "a".into(),
            phone_number: None,
            plan_id: Some(1),
            plan_started_at: Some(0),
            plan_ends_at: Some(100),
            module_api: true,
            module_scheduler: false,
            module_chatbot: true,
            created_at: 0,
        };
        assert!(!is_plan_valid(&tenant, 200));
        assert!(is_plan_valid(&tenant, 50));
    }

    #[test]
    fn monthly_rollover_crosses_month_boundary() {
        // 2025-01-31 23:00 UTC -> 2025-02-01 00:00 UTC
        let last = 1738364400;
        let now = 1738368000;
        assert!(quota_bucket_changed("monthly", last, now));
        assert!(!quota_bucket_changed("monthly", last, last + 60));
    }

    #[test]
    fn quarterly_bucket_spans_three_months() {
        // Jan and Mar 2025 are the same quarter; Apr is not.
        let jan = 1736120400; // 2025-01-06
        let mar = 1741252800; // 2025-03-06
        let apr = 1743930000; // 2025-04-06
        assert!(!quota_bucket_changed("quarterly", jan, mar));
        assert!(quota_bucket_changed("quarterly", jan, apr));
    }
}
