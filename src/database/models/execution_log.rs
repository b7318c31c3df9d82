//! `SeaORM` Entity for the record of a single execution attempt

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "execution_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    /// HTTP status line on success, otherwise an outcome code such as `failed`.
    pub status: String,
    /// Numeric HTTP status, 0 when no response was received.
    pub status_code: i32,
    #[sea_orm(column_type = "Text")]
    pub response: String,
    pub run_at: DateTime,
    pub duration_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the attempt got a response back from the remote end.
    pub const fn received_response(&self) -> bool {
        self.status_code != 0
    }
}
