use sea_orm::{ActiveEnum, DbBackend, Schema};
use sea_orm_migration::{
    prelude::*,
    schema::{json_binary, string, text, timestamp, uuid},
};
use sea_query::extension::postgres::Type;

use crate::database::models::{job_status::JobStatus, job_type::JobType};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(DbBackend::Postgres);

        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE OR REPLACE FUNCTION touch_updated_at()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = CURRENT_TIMESTAMP;
                    RETURN NEW;
                END;
                $$ language 'plpgsql';
                ",
            )
            .await?;

        manager
            .create_type(schema.create_enum_from_active_enum::<JobStatus>())
            .await?;

        manager
            .create_type(schema.create_enum_from_active_enum::<JobType>())
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Job::Table)
                    .if_not_exists()
                    .col(
                        uuid(Job::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(uuid(Job::UserId).not_null())
                    .col(string(Job::Name).not_null())
                    .col(string(Job::Schedule).not_null().default("* * * * *"))
                    .col(string(Job::Timezone).not_null().default("UTC"))
                    .col(ColumnDef::new(Job::Type).custom(JobType::name()).not_null())
                    .col(json_binary(Job::Payload).not_null())
                    .col(
                        ColumnDef::new(Job::Status)
                            .custom(JobStatus::name())
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Job::NextRun).timestamp().null())
                    .col(ColumnDef::new(Job::LastRun).timestamp().null())
                    .col(ColumnDef::new(Job::Retry).integer().not_null().default(0))
                    .col(ColumnDef::new(Job::Enabled).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Job::Recurring)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        timestamp(Job::CreatedAt)
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(Job::UpdatedAt)
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .to_owned(),
            )
            .await?;

        // Serves the scheduler's due-job scan
        manager
            .create_index(
                Index::create()
                    .name("idx-job-enabled-status-next_run")
                    .table(Job::Table)
                    .col(Job::Enabled)
                    .col(Job::Status)
                    .col(Job::NextRun)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-job-user_id")
                    .table(Job::Table)
                    .col(Job::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExecutionLog::Table)
                    .if_not_exists()
                    .col(
                        uuid(ExecutionLog::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(uuid(ExecutionLog::JobId).not_null())
                    .col(string(ExecutionLog::Status).not_null())
                    .col(
                        ColumnDef::new(ExecutionLog::StatusCode)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(text(ExecutionLog::Response).not_null())
                    .col(
                        timestamp(ExecutionLog::RunAt)
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        ColumnDef::new(ExecutionLog::DurationMs)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-execution_log-job_id")
                            .from(ExecutionLog::Table, ExecutionLog::JobId)
                            .to(Job::Table, Job::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-execution_log-job_id")
                    .table(ExecutionLog::Table)
                    .col(ExecutionLog::JobId)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE TRIGGER update_job_updated_at
                    BEFORE UPDATE ON job
                    FOR EACH ROW
                    EXECUTE FUNCTION touch_updated_at();
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS update_job_updated_at ON job;")
            .await?;

        manager
            .drop_table(Table::drop().table(ExecutionLog::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(JobType::name()).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(JobStatus::name()).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS touch_updated_at();")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
    UserId,
    Name,
    Schedule,
    Timezone,
    Type,
    Payload,
    Status,
    NextRun,
    LastRun,
    Retry,
    Enabled,
    Recurring,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ExecutionLog {
    Table,
    Id,
    JobId,
    Status,
    StatusCode,
    Response,
    RunAt,
    DurationMs,
}
