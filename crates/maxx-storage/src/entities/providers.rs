use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `custom` | `antigravity` | `kiro` | `codex` (§3 Provider.kind).
    pub kind: String,
    pub name: String,
    /// Discriminated-by-kind config blob (baseURL/apiKey/tokens/...).
    pub config_json: Json,
    /// Set of `ClientDialect::as_str()` values this provider accepts.
    pub supported_client_dialects_json: Json,
    /// Glob patterns; empty array means "all models".
    pub supported_models_json: Json,
    pub updated_at: OffsetDateTime,
    #[sea_orm(has_many)]
    pub routes: HasMany<super::routes::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
