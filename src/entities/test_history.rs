use sea_orm::entity::prelude::*;

/// One load-test run. Aggregate metric columns stay null until the job
/// monitor observes the generator job finishing and fills them in.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub target_tps: Option<f64>,
    pub tested_at: DateTimeUtc,
    pub job_name: String,
    pub k6_script_file_name: Option<String>,
    pub is_completed: bool,
    pub completed_at: Option<DateTimeUtc>,
    pub is_analysis_completed: bool,
    pub analysis_completed_at: Option<DateTimeUtc>,
    pub project_id: Option<i32>,
    pub max_tps: Option<f64>,
    pub min_tps: Option<f64>,
    pub avg_tps: Option<f64>,
    pub max_response_time: Option<f64>,
    pub min_response_time: Option<f64>,
    pub avg_response_time: Option<f64>,
    pub p50_response_time: Option<f64>,
    pub p95_response_time: Option<f64>,
    pub p99_response_time: Option<f64>,
    pub max_error_rate: Option<f64>,
    pub min_error_rate: Option<f64>,
    pub avg_error_rate: Option<f64>,
    pub max_vus: Option<f64>,
    pub min_vus: Option<f64>,
    pub avg_vus: Option<f64>,
    pub total_requests: Option<i64>,
    pub failed_requests: Option<i64>,
    pub test_duration: Option<f64>,
}

impl Model {
    /// Derived on read; the stored error-rate columns are bucket statistics.
    pub fn overall_error_rate(&self) -> Option<f64> {
        match (self.total_requests, self.failed_requests) {
            (Some(total), Some(failed)) if total > 0 => {
                Some(failed as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Project,
    #[sea_orm(has_many = "super::scenario_history::Entity")]
    ScenarioHistory,
    #[sea_orm(has_many = "super::test_metrics_timeseries::Entity")]
    TestMetricsTimeseries,
    #[sea_orm(has_many = "super::analysis_history::Entity")]
    AnalysisHistory,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::scenario_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScenarioHistory.def()
    }
}

impl Related<super::test_metrics_timeseries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestMetricsTimeseries.def()
    }
}

impl Related<super::analysis_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
