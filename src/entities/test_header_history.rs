use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "test_header_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub header_key: String,
    pub header_value: String,
    pub scenario_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scenario_history::Entity",
        from = "Column::ScenarioId",
        to = "super::scenario_history::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ScenarioHistory,
}

impl Related<super::scenario_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScenarioHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
