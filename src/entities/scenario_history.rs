use sea_orm::entity::prelude::*;

/// Per-endpoint execution within one test run. `scenario_tag` matches the
/// tag the generator attaches to every emitted sample.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scenario_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub scenario_tag: String,
    pub endpoint_id: i32,
    pub think_time: f64,
    pub executor: String,
    pub response_time_target: Option<f64>,
    pub error_rate_target: Option<f64>,
    pub total_requests: Option<i64>,
    pub failed_requests: Option<i64>,
    pub test_duration: Option<f64>,
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
    pub test_history_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::endpoint::Entity",
        from = "Column::EndpointId",
        to = "super::endpoint::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Endpoint,
    #[sea_orm(
        belongs_to = "super::test_history::Entity",
        from = "Column::TestHistoryId",
        to = "super::test_history::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TestHistory,
    #[sea_orm(has_many = "super::stage_history::Entity")]
    StageHistory,
    #[sea_orm(has_many = "super::test_parameter_history::Entity")]
    TestParameterHistory,
    #[sea_orm(has_many = "super::test_header_history::Entity")]
    TestHeaderHistory,
}

impl Related<super::endpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Endpoint.def()
    }
}

impl Related<super::test_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestHistory.def()
    }
}

impl Related<super::stage_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
