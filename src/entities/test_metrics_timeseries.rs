use sea_orm::entity::prelude::*;

/// 10 s bucketed performance samples. `scenario_history_id = NULL` marks the
/// job-wide series; otherwise the row belongs to one scenario.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_metrics_timeseries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scenario_history_id: Option<i32>,
    pub test_history_id: i32,
    pub timestamp: DateTimeUtc,
    pub tps: Option<f64>,
    pub error_rate: Option<f64>,
    pub vus: Option<i32>,
    pub avg_response_time: Option<f64>,
    pub p95_response_time: Option<f64>,
    pub p99_response_time: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scenario_history::Entity",
        from = "Column::ScenarioHistoryId",
        to = "super::scenario_history::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ScenarioHistory,
    #[sea_orm(
        belongs_to = "super::test_history::Entity",
        from = "Column::TestHistoryId",
        to = "super::test_history::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TestHistory,
}

impl Related<super::test_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
