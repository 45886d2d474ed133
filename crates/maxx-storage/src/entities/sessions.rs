use sea_orm::entity::prelude::*;

/// `projectId` may be bound after creation by the Project Waiter background
/// loop once the client's first request names a project slug (§3 Session).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "session_key")]
    pub session_id: String,
    pub client_dialect: String,
    pub project_id: Option<i64>,
}

impl ActiveModelBehavior for ActiveModel {}
