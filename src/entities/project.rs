use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "project")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub summary: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::openapi_spec::Entity")]
    OpenapiSpec,
    #[sea_orm(has_many = "super::test_history::Entity")]
    TestHistory,
}

impl Related<super::openapi_spec::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OpenapiSpec.def()
    }
}

impl Related<super::test_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
