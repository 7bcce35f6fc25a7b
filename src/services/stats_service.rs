use chrono::Utc;
use sea_orm::*;

use crate::models::book::{self, Entity as Book};
use crate::models::borrowing::{self, Entity as Borrowing};
use crate::models::library_event::{self, Entity as LibraryEvent};
use crate::models::user::{self, Entity as User};
use crate::services::{borrowing_service, fine_service, ServiceError};

#[derive(Debug, serde::Serialize)]
pub struct LibrarySummary {
    pub total_books: u64,
    pub total_users: u64,
    pub active_borrowings: i64,
    pub overdue_borrowings: u64,
    pub unpaid_fines_total: f64,
    pub upcoming_events: u64,
}

/// Headline counters for the reports endpoint.
pub async fn summary(db: &DatabaseConnection) -> Result<LibrarySummary, ServiceError> {
    let today_str = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let total_books = Book::find()
        .filter(book::Column::IsActive.eq(true))
        .count(db)
        .await?;

    let total_users = User::find()
        .filter(user::Column::IsActive.eq(true))
        .count(db)
        .await?;

    let overdue_borrowings = Borrowing::find()
        .filter(borrowing::Column::Status.is_in(["borrowed", "overdue"]))
        .filter(borrowing::Column::DueDate.lt(today_str))
        .count(db)
        .await?;

    let upcoming_events = LibraryEvent::find()
        .filter(library_event::Column::StartTime.gt(Utc::now().to_rfc3339()))
        .count(db)
        .await?;

    Ok(LibrarySummary {
        total_books,
        total_users,
        active_borrowings: borrowing_service::count_open_borrowings(db).await?,
        overdue_borrowings,
        unpaid_fines_total: fine_service::unpaid_total(db).await?,
        upcoming_events,
    })
}
