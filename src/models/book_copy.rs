use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "book_copies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub book_id: i32,
    pub barcode: String,
    pub acquisition_date: Option<String>,
    /// Physical condition of this copy.
    /// Valid values: 'excellent', 'good', 'fair', 'poor', 'damaged'
    pub condition: String,
    pub location: Option<String>,
    pub price: Option<f64>,
    pub is_available: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub const CONDITIONS: [&str; 5] = ["excellent", "good", "fair", "poor", "damaged"];

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id",
        on_delete = "Cascade"
    )]
    Book,
    #[sea_orm(has_many = "super::borrowing::Entity")]
    Borrowings,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::borrowing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Borrowings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
