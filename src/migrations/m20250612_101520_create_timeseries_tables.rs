use sea_orm_migration::prelude::*;

use super::m20250612_101500_create_inventory_tables::ServerInfra;
use super::m20250612_101510_create_history_tables::{ScenarioHistory, TestHistory};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TestMetricsTimeseries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestMetricsTimeseries::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TestMetricsTimeseries::ScenarioHistoryId).integer())
                    .col(
                        ColumnDef::new(TestMetricsTimeseries::TestHistoryId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestMetricsTimeseries::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TestMetricsTimeseries::Tps).double())
                    .col(ColumnDef::new(TestMetricsTimeseries::ErrorRate).double())
                    .col(ColumnDef::new(TestMetricsTimeseries::Vus).integer())
                    .col(ColumnDef::new(TestMetricsTimeseries::AvgResponseTime).double())
                    .col(ColumnDef::new(TestMetricsTimeseries::P95ResponseTime).double())
                    .col(ColumnDef::new(TestMetricsTimeseries::P99ResponseTime).double())
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                TestMetricsTimeseries::Table,
                                TestMetricsTimeseries::ScenarioHistoryId,
                            )
                            .to(ScenarioHistory::Table, ScenarioHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                TestMetricsTimeseries::Table,
                                TestMetricsTimeseries::TestHistoryId,
                            )
                            .to(TestHistory::Table, TestHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TestResourceTimeseries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestResourceTimeseries::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TestResourceTimeseries::ScenarioHistoryId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResourceTimeseries::ServerInfraId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResourceTimeseries::MetricType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TestResourceTimeseries::Unit).string().not_null())
                    .col(
                        ColumnDef::new(TestResourceTimeseries::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResourceTimeseries::Value)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TestResourceTimeseries::CpuRequestMillicores).double())
                    .col(ColumnDef::new(TestResourceTimeseries::CpuLimitMillicores).double())
                    .col(ColumnDef::new(TestResourceTimeseries::MemoryRequestMb).double())
                    .col(ColumnDef::new(TestResourceTimeseries::MemoryLimitMb).double())
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                TestResourceTimeseries::Table,
                                TestResourceTimeseries::ScenarioHistoryId,
                            )
                            .to(ScenarioHistory::Table, ScenarioHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                TestResourceTimeseries::Table,
                                TestResourceTimeseries::ServerInfraId,
                            )
                            .to(ServerInfra::Table, ServerInfra::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalysisHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisHistory::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AnalysisHistory::PrimaryTestId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalysisHistory::AnalysisCategory)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalysisHistory::AnalysisType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AnalysisHistory::AnalysisResult)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisHistory::ModelName).string().not_null())
                    .col(
                        ColumnDef::new(AnalysisHistory::AnalyzedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AnalysisHistory::Table, AnalysisHistory::PrimaryTestId)
                            .to(TestHistory::Table, TestHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestResourceTimeseries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestMetricsTimeseries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TestMetricsTimeseries {
    Table,
    Id,
    ScenarioHistoryId,
    TestHistoryId,
    Timestamp,
    Tps,
    ErrorRate,
    Vus,
    AvgResponseTime,
    P95ResponseTime,
    P99ResponseTime,
}

#[derive(DeriveIden)]
pub enum TestResourceTimeseries {
    Table,
    Id,
    ScenarioHistoryId,
    ServerInfraId,
    MetricType,
    Unit,
    Timestamp,
    Value,
    CpuRequestMillicores,
    CpuLimitMillicores,
    MemoryRequestMb,
    MemoryLimitMb,
}

#[derive(DeriveIden)]
pub enum AnalysisHistory {
    Table,
    Id,
    PrimaryTestId,
    AnalysisCategory,
    AnalysisType,
    AnalysisResult,
    ModelName,
    AnalyzedAt,
}
