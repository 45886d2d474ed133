use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Versioned: a price change inserts a new row rather than mutating the old
/// one, and the old row is soft-deleted via `retired_at` (§3 ModelPrice).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub model_name: String,
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cache_read_per_million: f64,
    pub cache_write_per_million: f64,
    pub effective_at: OffsetDateTime,
    pub retired_at: Option<OffsetDateTime>,
}

impl ActiveModelBehavior for ActiveModel {}
