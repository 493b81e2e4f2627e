use sea_orm::entity::prelude::*;

/// Persistent identity of one cluster workload member (a pod). `group_name`
/// is the Service that selects it; `(namespace, name)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "server_infra")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub openapi_spec_id: Option<i32>,
    /// Pod, Deployment, StatefulSet, DaemonSet or ReplicaSet.
    pub resource_type: String,
    pub environment: String,
    /// SERVER or DATABASE, classified from container images.
    pub service_type: String,
    pub name: String,
    pub group_name: String,
    pub labels: Option<Json>,
    pub namespace: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::openapi_spec::Entity",
        from = "Column::OpenapiSpecId",
        to = "super::openapi_spec::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    OpenapiSpec,
    #[sea_orm(has_many = "super::test_resource_timeseries::Entity")]
    TestResourceTimeseries,
}

impl Related<super::openapi_spec::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OpenapiSpec.def()
    }
}

impl Related<super::test_resource_timeseries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestResourceTimeseries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
