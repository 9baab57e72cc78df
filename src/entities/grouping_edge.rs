use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "grouping_edges")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Subject that holds the role
    pub child: String,
    /// Role being held
    pub parent: String,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
