use chrono::{Duration, Utc};
use sea_orm::*;
use std::collections::HashMap;

use crate::models::book::{self, Entity as Book};
use crate::models::book_copy::{self, Entity as BookCopy};
use crate::models::borrowing::{self, Entity as Borrowing};
use crate::models::fine::{self, Entity as Fine};
use crate::services::{membership_service, ServiceError};

pub const DEFAULT_LOAN_DAYS: i64 = 14;
pub const MAX_CUSTOM_DAYS: i64 = 30;
pub const MAX_RENEWALS: i32 = 3;
/// Fine accrued per day overdue.
pub const DAILY_FINE_RATE: f64 = 1.0;

fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Borrow a specific copy for a user, enforcing membership and availability
/// rules. The borrowing row, copy flag and book counter move together in one
/// transaction.
pub async fn borrow_copy(
    db: &DatabaseConnection,
    user_id: i32,
    copy_id: i32,
    custom_days: Option<i64>,
) -> Result<borrowing::Model, ServiceError> {
    let (membership, tier) = membership_service::active_membership(db, user_id)
        .await?
        .ok_or_else(|| ServiceError::InvalidState("No valid membership found".to_string()))?;

    if membership_service::is_expired(&membership) {
        return Err(ServiceError::InvalidState(
            "Membership has expired".to_string(),
        ));
    }

    if let Some(days) = custom_days {
        if !(1..=MAX_CUSTOM_DAYS).contains(&days) {
            return Err(ServiceError::Validation(format!(
                "Loan duration must be between 1 and {} days",
                MAX_CUSTOM_DAYS
            )));
        }
    }

    let open_count = Borrowing::find()
        .filter(borrowing::Column::UserId.eq(user_id))
        .filter(borrowing::Column::Status.is_in(["borrowed", "overdue"]))
        .count(db)
        .await?;

    if open_count >= tier.max_books as u64 {
        return Err(ServiceError::InvalidState(format!(
            "Maximum borrowing limit ({}) reached",
            tier.max_books
        )));
    }

    let copy = BookCopy::find_by_id(copy_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if !copy.is_available {
        return Err(ServiceError::InvalidState(
            "Book copy is not available".to_string(),
        ));
    }

    let book = Book::find_by_id(copy.book_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let loan_days = custom_days.unwrap_or(tier.max_days as i64);
    let borrow_date = today();
    let due_date = borrow_date + Duration::days(loan_days);
    let now = now_rfc3339();

    let txn = db.begin().await?;

    let new_borrowing = borrowing::ActiveModel {
        user_id: Set(user_id),
        book_id: Set(copy.book_id),
        copy_id: Set(copy.id),
        borrow_date: Set(borrow_date.format("%Y-%m-%d").to_string()),
        due_date: Set(due_date.format("%Y-%m-%d").to_string()),
        return_date: Set(None),
        status: Set("borrowed".to_owned()),
        renewal_count: Set(0),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let saved = new_borrowing.insert(&txn).await?;

    let mut copy_active: book_copy::ActiveModel = copy.into();
    copy_active.is_available = Set(false);
    copy_active.updated_at = Set(now.clone());
    copy_active.update(&txn).await?;

    let available = (book.copies_available - 1).max(0);
    let mut book_active: book::ActiveModel = book.into();
    book_active.copies_available = Set(available);
    book_active.updated_at = Set(now);
    book_active.update(&txn).await?;

    txn.commit().await?;

    Ok(saved)
}

/// Return an open borrowing. An overdue return leaves one unpaid fine
/// covering the full overdue period.
pub async fn return_borrowing(
    db: &DatabaseConnection,
    borrowing_id: i32,
) -> Result<borrowing::Model, ServiceError> {
    let loan = Borrowing::find_by_id(borrowing_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if loan.status == "returned" {
        return Err(ServiceError::InvalidState(
            "Borrowing is already returned".to_string(),
        ));
    }

    let days_overdue = loan.days_overdue();
    let now = now_rfc3339();

    let txn = db.begin().await?;

    let mut loan_active: borrowing::ActiveModel = loan.clone().into();
    loan_active.status = Set("returned".to_owned());
    loan_active.return_date = Set(Some(today().format("%Y-%m-%d").to_string()));
    loan_active.updated_at = Set(now.clone());
    let updated = loan_active.update(&txn).await?;

    let copy = BookCopy::find_by_id(loan.copy_id)
        .one(&txn)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let mut copy_active: book_copy::ActiveModel = copy.into();
    copy_active.is_available = Set(true);
    copy_active.updated_at = Set(now.clone());
    copy_active.update(&txn).await?;

    let book = Book::find_by_id(loan.book_id)
        .one(&txn)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let available = (book.copies_available + 1).min(book.copies_total);
    let mut book_active: book::ActiveModel = book.into();
    book_active.copies_available = Set(available);
    book_active.updated_at = Set(now.clone());
    book_active.update(&txn).await?;

    if days_overdue > 0 {
        upsert_overdue_fine(&txn, loan.id, days_overdue, &now).await?;
    }

    txn.commit().await?;

    Ok(updated)
}

/// Renew an open borrowing: not overdue, at most `MAX_RENEWALS` times.
pub async fn renew_borrowing(
    db: &DatabaseConnection,
    borrowing_id: i32,
) -> Result<borrowing::Model, ServiceError> {
    let loan = Borrowing::find_by_id(borrowing_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if loan.status != "borrowed" {
        return Err(ServiceError::InvalidState(
            "Only borrowed books can be renewed".to_string(),
        ));
    }

    if loan.is_overdue() {
        return Err(ServiceError::InvalidState(
            "Overdue books cannot be renewed".to_string(),
        ));
    }

    if loan.renewal_count >= MAX_RENEWALS {
        return Err(ServiceError::InvalidState(
            "Maximum renewal limit reached".to_string(),
        ));
    }

    let loan_days = match membership_service::active_membership(db, loan.user_id).await? {
        Some((membership, tier)) if !membership_service::is_expired(&membership) => {
            tier.max_days as i64
        }
        _ => DEFAULT_LOAN_DAYS,
    };

    let due_date = today() + Duration::days(loan_days);
    let renewals = loan.renewal_count + 1;

    let mut loan_active: borrowing::ActiveModel = loan.into();
    loan_active.due_date = Set(due_date.format("%Y-%m-%d").to_string());
    loan_active.renewal_count = Set(renewals);
    loan_active.updated_at = Set(now_rfc3339());

    Ok(loan_active.update(db).await?)
}

/// Flip open loans past their due date to 'overdue' and keep their pending
/// fines in step with the days elapsed. Returns the number of loans touched.
pub async fn refresh_overdue(db: &DatabaseConnection) -> Result<u64, ServiceError> {
    let today_str = today().format("%Y-%m-%d").to_string();

    let late = Borrowing::find()
        .filter(borrowing::Column::Status.is_in(["borrowed", "overdue"]))
        .filter(borrowing::Column::DueDate.lt(today_str))
        .all(db)
        .await?;

    let mut touched = 0u64;
    for loan in late {
        let days_overdue = loan.days_overdue();
        if days_overdue == 0 {
            continue;
        }

        let now = now_rfc3339();
        let txn = db.begin().await?;

        if loan.status == "borrowed" {
            let mut active: borrowing::ActiveModel = loan.clone().into();
            active.status = Set("overdue".to_owned());
            active.updated_at = Set(now.clone());
            active.update(&txn).await?;
        }

        upsert_overdue_fine(&txn, loan.id, days_overdue, &now).await?;
        txn.commit().await?;
        touched += 1;
    }

    Ok(touched)
}

/// Background task: periodically run the overdue sweep.
pub async fn run_sweeper(db: DatabaseConnection, interval_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        match refresh_overdue(&db).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("overdue sweep: {} borrowing(s) updated", n),
            Err(e) => tracing::error!("overdue sweep failed: {}", e),
        }
    }
}

// One unpaid 'overdue' fine per borrowing; its amount tracks days_overdue.
async fn upsert_overdue_fine<C: ConnectionTrait>(
    conn: &C,
    borrowing_id: i32,
    days_overdue: i64,
    now: &str,
) -> Result<(), ServiceError> {
    let amount = days_overdue as f64 * DAILY_FINE_RATE;

    let existing = Fine::find()
        .filter(fine::Column::BorrowingId.eq(borrowing_id))
        .filter(fine::Column::IsPaid.eq(false))
        .one(conn)
        .await?;

    match existing {
        Some(f) => {
            if (f.amount - amount).abs() > f64::EPSILON {
                let mut active: fine::ActiveModel = f.into();
                active.amount = Set(amount);
                active.updated_at = Set(now.to_owned());
                active.update(conn).await?;
            }
        }
        None => {
            let new_fine = fine::ActiveModel {
                borrowing_id: Set(borrowing_id),
                amount: Set(amount),
                reason: Set("overdue".to_owned()),
                is_paid: Set(false),
                paid_at: Set(None),
                created_at: Set(now.to_owned()),
                updated_at: Set(now.to_owned()),
                ..Default::default()
            };
            new_fine.insert(conn).await?;
        }
    }

    Ok(())
}

/// Enriched borrowing with book info for list endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BorrowingWithDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub copy_id: i32,
    pub borrow_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub status: String,
    pub renewal_count: i32,
    pub book_title: String,
    pub book_isbn: String,
    pub days_overdue: i64,
    pub unpaid_fines: f64,
}

/// List a user's borrowings, open loans first, newest first.
pub async fn user_borrowings(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<BorrowingWithDetails>, ServiceError> {
    let loans = Borrowing::find()
        .filter(borrowing::Column::UserId.eq(user_id))
        .order_by_desc(borrowing::Column::BorrowDate)
        .all(db)
        .await?;

    enrich(db, loans).await
}

/// List every loan currently past due (staff view).
pub async fn overdue_borrowings(
    db: &DatabaseConnection,
) -> Result<Vec<BorrowingWithDetails>, ServiceError> {
    let today_str = today().format("%Y-%m-%d").to_string();

    let loans = Borrowing::find()
        .filter(borrowing::Column::Status.is_in(["borrowed", "overdue"]))
        .filter(borrowing::Column::DueDate.lt(today_str))
        .order_by_asc(borrowing::Column::DueDate)
        .all(db)
        .await?;

    enrich(db, loans).await
}

async fn enrich(
    db: &DatabaseConnection,
    loans: Vec<borrowing::Model>,
) -> Result<Vec<BorrowingWithDetails>, ServiceError> {
    let book_ids: Vec<i32> = loans.iter().map(|l| l.book_id).collect();
    let loan_ids: Vec<i32> = loans.iter().map(|l| l.id).collect();

    let mut books: HashMap<i32, book::Model> = HashMap::new();
    if !book_ids.is_empty() {
        for b in Book::find()
            .filter(book::Column::Id.is_in(book_ids))
            .all(db)
            .await?
        {
            books.insert(b.id, b);
        }
    }

    let mut unpaid: HashMap<i32, f64> = HashMap::new();
    if !loan_ids.is_empty() {
        for f in Fine::find()
            .filter(fine::Column::BorrowingId.is_in(loan_ids))
            .filter(fine::Column::IsPaid.eq(false))
            .all(db)
            .await?
        {
            *unpaid.entry(f.borrowing_id).or_insert(0.0) += f.amount;
        }
    }

    let result = loans
        .into_iter()
        .map(|loan| {
            let book = books.get(&loan.book_id);
            BorrowingWithDetails {
                days_overdue: loan.days_overdue(),
                unpaid_fines: unpaid.get(&loan.id).copied().unwrap_or(0.0),
                book_title: book.map(|b| b.title.clone()).unwrap_or_default(),
                book_isbn: book.map(|b| b.isbn.clone()).unwrap_or_default(),
                id: loan.id,
                user_id: loan.user_id,
                book_id: loan.book_id,
                copy_id: loan.copy_id,
                borrow_date: loan.borrow_date,
                due_date: loan.due_date,
                return_date: loan.return_date,
                status: loan.status,
                renewal_count: loan.renewal_count,
            }
        })
        .collect();

    Ok(result)
}

/// Count open loans across the library.
pub async fn count_open_borrowings(db: &DatabaseConnection) -> Result<i64, ServiceError> {
    let count = Borrowing::find()
        .filter(borrowing::Column::Status.is_in(["borrowed", "overdue"]))
        .count(db)
        .await?;
    Ok(count as i64)
}
