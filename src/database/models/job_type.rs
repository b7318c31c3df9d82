use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Kind of action a job performs when it runs.
///
/// Only `Http` ships with an executor; the others are accepted by the store
/// and left for executors registered by the embedding application.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "job_type")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[sea_orm(string_value = "http")]
    Http,
    #[sea_orm(string_value = "sql")]
    Sql,
    #[sea_orm(string_value = "queue")]
    Queue,
}
