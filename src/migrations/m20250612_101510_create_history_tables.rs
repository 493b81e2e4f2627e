use sea_orm_migration::prelude::*;

use super::m20250612_101500_create_inventory_tables::{Endpoint, Project};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TestHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestHistory::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TestHistory::Title).string().not_null())
                    .col(ColumnDef::new(TestHistory::Description).text())
                    .col(ColumnDef::new(TestHistory::TargetTps).double())
                    .col(
                        ColumnDef::new(TestHistory::TestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TestHistory::JobName).string().not_null())
                    .col(ColumnDef::new(TestHistory::K6ScriptFileName).string())
                    .col(
                        ColumnDef::new(TestHistory::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TestHistory::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(TestHistory::IsAnalysisCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(TestHistory::AnalysisCompletedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(TestHistory::ProjectId).integer())
                    .col(ColumnDef::new(TestHistory::MaxTps).double())
                    .col(ColumnDef::new(TestHistory::MinTps).double())
                    .col(ColumnDef::new(TestHistory::AvgTps).double())
                    .col(ColumnDef::new(TestHistory::MaxResponseTime).double())
                    .col(ColumnDef::new(TestHistory::MinResponseTime).double())
                    .col(ColumnDef::new(TestHistory::AvgResponseTime).double())
                    .col(ColumnDef::new(TestHistory::P50ResponseTime).double())
                    .col(ColumnDef::new(TestHistory::P95ResponseTime).double())
                    .col(ColumnDef::new(TestHistory::P99ResponseTime).double())
                    .col(ColumnDef::new(TestHistory::MaxErrorRate).double())
                    .col(ColumnDef::new(TestHistory::MinErrorRate).double())
                    .col(ColumnDef::new(TestHistory::AvgErrorRate).double())
                    .col(ColumnDef::new(TestHistory::MaxVus).double())
                    .col(ColumnDef::new(TestHistory::MinVus).double())
                    .col(ColumnDef::new(TestHistory::AvgVus).double())
                    .col(ColumnDef::new(TestHistory::TotalRequests).big_integer())
                    .col(ColumnDef::new(TestHistory::FailedRequests).big_integer())
                    .col(ColumnDef::new(TestHistory::TestDuration).double())
                    .foreign_key(
                        ForeignKey::create()
                            .from(TestHistory::Table, TestHistory::ProjectId)
                            .to(Project::Table, Project::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_test_history_job_name")
                    .table(TestHistory::Table)
                    .col(TestHistory::JobName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScenarioHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScenarioHistory::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScenarioHistory::Name).string().not_null())
                    .col(
                        ColumnDef::new(ScenarioHistory::ScenarioTag)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScenarioHistory::EndpointId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScenarioHistory::ThinkTime)
                            .double()
                            .not_null()
                            .default(1.0),
                    )
                    .col(ColumnDef::new(ScenarioHistory::Executor).string().not_null())
                    .col(ColumnDef::new(ScenarioHistory::ResponseTimeTarget).double())
                    .col(ColumnDef::new(ScenarioHistory::ErrorRateTarget).double())
                    .col(ColumnDef::new(ScenarioHistory::TotalRequests).big_integer())
                    .col(ColumnDef::new(ScenarioHistory::FailedRequests).big_integer())
                    .col(ColumnDef::new(ScenarioHistory::TestDuration).double())
                    .col(ColumnDef::new(ScenarioHistory::MaxTps).double())
                    .col(ColumnDef::new(ScenarioHistory::MinTps).double())
                    .col(ColumnDef::new(ScenarioHistory::AvgTps).double())
                    .col(ColumnDef::new(ScenarioHistory::MaxResponseTime).double())
                    .col(ColumnDef::new(ScenarioHistory::MinResponseTime).double())
                    .col(ColumnDef::new(ScenarioHistory::AvgResponseTime).double())
                    .col(ColumnDef::new(ScenarioHistory::P50ResponseTime).double())
                    .col(ColumnDef::new(ScenarioHistory::P95ResponseTime).double())
                    .col(ColumnDef::new(ScenarioHistory::P99ResponseTime).double())
                    .col(ColumnDef::new(ScenarioHistory::MaxErrorRate).double())
                    .col(ColumnDef::new(ScenarioHistory::MinErrorRate).double())
                    .col(ColumnDef::new(ScenarioHistory::AvgErrorRate).double())
                    .col(
                        ColumnDef::new(ScenarioHistory::TestHistoryId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ScenarioHistory::Table, ScenarioHistory::EndpointId)
                            .to(Endpoint::Table, Endpoint::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ScenarioHistory::Table, ScenarioHistory::TestHistoryId)
                            .to(TestHistory::Table, TestHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StageHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StageHistory::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StageHistory::Duration).string().not_null())
                    .col(ColumnDef::new(StageHistory::Target).integer().not_null())
                    .col(ColumnDef::new(StageHistory::ScenarioId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(StageHistory::Table, StageHistory::ScenarioId)
                            .to(ScenarioHistory::Table, ScenarioHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TestParameterHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestParameterHistory::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TestParameterHistory::Name).string().not_null())
                    .col(
                        ColumnDef::new(TestParameterHistory::ParamType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TestParameterHistory::Value).string().not_null())
                    .col(
                        ColumnDef::new(TestParameterHistory::ScenarioId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TestParameterHistory::Table, TestParameterHistory::ScenarioId)
                            .to(ScenarioHistory::Table, ScenarioHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TestHeaderHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestHeaderHistory::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TestHeaderHistory::HeaderKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestHeaderHistory::HeaderValue)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestHeaderHistory::ScenarioId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TestHeaderHistory::Table, TestHeaderHistory::ScenarioId)
                            .to(ScenarioHistory::Table, ScenarioHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestHeaderHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestParameterHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StageHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScenarioHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TestHistory {
    Table,
    Id,
    Title,
    Description,
    TargetTps,
    TestedAt,
    JobName,
    K6ScriptFileName,
    IsCompleted,
    CompletedAt,
    IsAnalysisCompleted,
    AnalysisCompletedAt,
    ProjectId,
    MaxTps,
    MinTps,
    AvgTps,
    MaxResponseTime,
    MinResponseTime,
    AvgResponseTime,
    P50ResponseTime,
    P95ResponseTime,
    P99ResponseTime,
    MaxErrorRate,
    MinErrorRate,
    AvgErrorRate,
    MaxVus,
    MinVus,
    AvgVus,
    TotalRequests,
    FailedRequests,
    TestDuration,
}

#[derive(DeriveIden)]
pub enum ScenarioHistory {
    Table,
    Id,
    Name,
    ScenarioTag,
    EndpointId,
    ThinkTime,
    Executor,
    ResponseTimeTarget,
    ErrorRateTarget,
    TotalRequests,
    FailedRequests,
    TestDuration,
    MaxTps,
    MinTps,
    AvgTps,
    MaxResponseTime,
    MinResponseTime,
    AvgResponseTime,
    P50ResponseTime,
    P95ResponseTime,
    P99ResponseTime,
    MaxErrorRate,
    MinErrorRate,
    AvgErrorRate,
    TestHistoryId,
}

#[derive(DeriveIden)]
pub enum StageHistory {
    Table,
    Id,
    Duration,
    Target,
    ScenarioId,
}

#[derive(DeriveIden)]
pub enum TestParameterHistory {
    Table,
    Id,
    Name,
    ParamType,
    Value,
    ScenarioId,
}

#[derive(DeriveIden)]
pub enum TestHeaderHistory {
    Table,
    Id,
    HeaderKey,
    HeaderValue,
    ScenarioId,
}
