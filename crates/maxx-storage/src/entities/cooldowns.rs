use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One row per `(provider_id, client_dialect, reason)` (§3 Cooldown, §4.3
/// Cooldown Manager). An expired row (`until` in the past) is invisible to
/// the Router and is swept by the cooldown GC background loop.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cooldowns")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub provider_id: i64,
    /// Empty string = applies to all client dialects.
    pub client_dialect: String,
    pub reason: String,
    pub until: OffsetDateTime,
    pub failure_count: i32,
}

impl ActiveModelBehavior for ActiveModel {}
