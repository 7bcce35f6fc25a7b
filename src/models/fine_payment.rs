use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fine_payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub fine_id: i32,
    pub amount_paid: f64,
    /// 'cash', 'card', 'online' or 'cheque'
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub paid_by: Option<i32>,
    pub paid_at: String,
    pub notes: Option<String>,
    pub created_at: String,
}

pub const PAYMENT_METHODS: [&str; 4] = ["cash", "card", "online", "cheque"];

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fine::Entity",
        from = "Column::FineId",
        to = "super::fine::Column::Id",
        on_delete = "Cascade"
    )]
    Fine,
}

impl Related<super::fine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
