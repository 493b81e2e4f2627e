use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "openapi_spec")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: Option<String>,
    pub version: Option<String>,
    pub base_url: String,
    pub project_id: Option<i32>,
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
    #[sea_orm(has_many = "super::openapi_spec_version::Entity")]
    OpenapiSpecVersion,
    #[sea_orm(has_many = "super::server_infra::Entity")]
    ServerInfra,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::openapi_spec_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OpenapiSpecVersion.def()
    }
}

impl Related<super::server_infra::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServerInfra.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
