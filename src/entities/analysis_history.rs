use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub primary_test_id: i32,
    /// `single` or `comprehensive`.
    pub analysis_category: String,
    /// `comprehensive`, `response_time`, `tps`, `error_rate`, `resource_usage`.
    pub analysis_type: String,
    pub analysis_result: Json,
    pub model_name: String,
    pub analyzed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_history::Entity",
        from = "Column::PrimaryTestId",
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
