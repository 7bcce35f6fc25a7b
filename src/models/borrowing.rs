use chrono::{NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "borrowings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub copy_id: i32,
    /// Dates are stored as 'YYYY-MM-DD'.
    pub borrow_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    /// 'borrowed', 'overdue' or 'returned'
    pub status: String,
    pub renewal_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id",
        on_delete = "Cascade"
    )]
    Book,
    #[sea_orm(
        belongs_to = "super::book_copy::Entity",
        from = "Column::CopyId",
        to = "super::book_copy::Column::Id",
        on_delete = "Cascade"
    )]
    Copy,
    #[sea_orm(has_many = "super::fine::Entity")]
    Fines,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::book_copy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Copy.def()
    }
}

impl Related<super::fine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// An open loan whose due date has passed.
    pub fn is_overdue(&self) -> bool {
        if self.status == "returned" {
            return false;
        }
        match NaiveDate::parse_from_str(&self.due_date, "%Y-%m-%d") {
            Ok(due) => due < Utc::now().date_naive(),
            Err(_) => false,
        }
    }

    pub fn days_overdue(&self) -> i64 {
        if self.status == "returned" {
            return 0;
        }
        match NaiveDate::parse_from_str(&self.due_date, "%Y-%m-%d") {
            Ok(due) => (Utc::now().date_naive() - due).num_days().max(0),
            Err(_) => 0,
        }
    }
}
