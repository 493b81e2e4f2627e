use sea_orm::entity::prelude::*;

/// 10 s bucketed container samples for one pod during one scenario, tagged
/// with the pod's resource requests and limits at collection time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_resource_timeseries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scenario_history_id: i32,
    pub server_infra_id: i32,
    /// `cpu` or `memory`.
    pub metric_type: String,
    /// `millicores` for cpu, `mb` for memory.
    pub unit: String,
    pub timestamp: DateTimeUtc,
    pub value: f64,
    pub cpu_request_millicores: Option<f64>,
    pub cpu_limit_millicores: Option<f64>,
    pub memory_request_mb: Option<f64>,
    pub memory_limit_mb: Option<f64>,
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
        belongs_to = "super::server_infra::Entity",
        from = "Column::ServerInfraId",
        to = "super::server_infra::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ServerInfra,
}

impl Related<super::server_infra::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServerInfra.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
