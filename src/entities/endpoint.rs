use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "endpoint")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub path: String,
    pub method: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub tag_name: Option<String>,
    pub tag_description: Option<String>,
    pub openapi_spec_version_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::openapi_spec_version::Entity",
        from = "Column::OpenapiSpecVersionId",
        to = "super::openapi_spec_version::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    OpenapiSpecVersion,
    #[sea_orm(has_many = "super::parameter::Entity")]
    Parameter,
    #[sea_orm(has_many = "super::scenario_history::Entity")]
    ScenarioHistory,
}

impl Related<super::openapi_spec_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OpenapiSpecVersion.def()
    }
}

impl Related<super::parameter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parameter.def()
    }
}

impl Related<super::scenario_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScenarioHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
