use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "openapi_spec_version")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTimeUtc,
    pub commit_hash: Option<String>,
    pub is_active: bool,
    pub openapi_spec_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::openapi_spec::Entity",
        from = "Column::OpenapiSpecId",
        to = "super::openapi_spec::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    OpenapiSpec,
    #[sea_orm(has_many = "super::endpoint::Entity")]
    Endpoint,
}

impl Related<super::openapi_spec::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OpenapiSpec.def()
    }
}

impl Related<super::endpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Endpoint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
