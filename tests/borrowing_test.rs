use chrono::{Duration, Utc};
use libris::db;
use libris::models::{book, book_copy, borrowing, fine, user};
use libris::services::{borrowing_service, membership_service, ServiceError};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_test_user(db: &DatabaseConnection, username: &str) -> i32 {
    let now = Utc::now().to_rfc3339();
    let model = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set("hash".to_string()),
        email: Set(format!("{}@test.local", username)),
        full_name: Set(username.to_string()),
        role: Set("member".to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await.expect("Failed to create user").id
}

async fn create_test_book_with_copy(db: &DatabaseConnection, isbn: &str) -> (i32, i32) {
    let now = Utc::now().to_rfc3339();
    let saved_book = book::ActiveModel {
        isbn: Set(isbn.to_string()),
        title: Set(format!("Book {}", isbn)),
        copies_total: Set(1),
        copies_available: Set(1),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create book");

    let saved_copy = book_copy::ActiveModel {
        book_id: Set(saved_book.id),
        barcode: Set(format!("bc-{}", isbn)),
        condition: Set("good".to_string()),
        is_available: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create copy");

    (saved_book.id, saved_copy.id)
}

// Membership type 1 ('Basic', 3 books / 14 days) is seeded by the migrations.
async fn give_membership(db: &DatabaseConnection, user_id: i32) {
    membership_service::assign_membership(db, user_id, 1, Some(365))
        .await
        .expect("Failed to assign membership");
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "alice").await;
    give_membership(&db, user_id).await;
    let (book_id, copy_id) = create_test_book_with_copy(&db, "111").await;

    let loan = borrowing_service::borrow_copy(&db, user_id, copy_id, None)
        .await
        .expect("Borrow should succeed");

    assert_eq!(loan.status, "borrowed");
    assert_eq!(loan.book_id, book_id);
    assert_eq!(loan.renewal_count, 0);

    // Due date follows the Basic tier's 14-day duration
    let due = chrono::NaiveDate::parse_from_str(&loan.due_date, "%Y-%m-%d").unwrap();
    assert_eq!(due, Utc::now().date_naive() + Duration::days(14));

    // Copy and book counters moved together
    let copy = book_copy::Entity::find_by_id(copy_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(!copy.is_available);

    let b = book::Entity::find_by_id(book_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.copies_available, 0);

    // Same copy cannot be borrowed twice
    let other = create_test_user(&db, "bob").await;
    give_membership(&db, other).await;
    let err = borrowing_service::borrow_copy(&db, other, copy_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Return restores everything
    let returned = borrowing_service::return_borrowing(&db, loan.id)
        .await
        .expect("Return should succeed");
    assert_eq!(returned.status, "returned");
    assert!(returned.return_date.is_some());

    let copy = book_copy::Entity::find_by_id(copy_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(copy.is_available);

    let b = book::Entity::find_by_id(book_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.copies_available, 1);

    // Double return is rejected
    let err = borrowing_service::return_borrowing(&db, loan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_borrow_requires_membership() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "nomember").await;
    let (_, copy_id) = create_test_book_with_copy(&db, "222").await;

    let err = borrowing_service::borrow_copy(&db, user_id, copy_id, None)
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidState(msg) => assert!(msg.contains("membership")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_borrow_limit_enforced() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "heavy").await;
    give_membership(&db, user_id).await;

    // Basic tier allows 3 open loans
    for i in 0..3 {
        let (_, copy_id) = create_test_book_with_copy(&db, &format!("33{}", i)).await;
        borrowing_service::borrow_copy(&db, user_id, copy_id, None)
            .await
            .expect("Borrow within limit should succeed");
    }

    let (_, copy_id) = create_test_book_with_copy(&db, "339").await;
    let err = borrowing_service::borrow_copy(&db, user_id, copy_id, None)
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidState(msg) => assert!(msg.contains("limit")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_custom_duration_bounds() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "custom").await;
    give_membership(&db, user_id).await;
    let (_, copy_id) = create_test_book_with_copy(&db, "444").await;

    let err = borrowing_service::borrow_copy(&db, user_id, copy_id, Some(31))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let loan = borrowing_service::borrow_copy(&db, user_id, copy_id, Some(7))
        .await
        .expect("Borrow with custom duration should succeed");
    let due = chrono::NaiveDate::parse_from_str(&loan.due_date, "%Y-%m-%d").unwrap();
    assert_eq!(due, Utc::now().date_naive() + Duration::days(7));
}

#[tokio::test]
async fn test_renewal_rules() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "renewer").await;
    give_membership(&db, user_id).await;
    let (_, copy_id) = create_test_book_with_copy(&db, "555").await;

    let loan = borrowing_service::borrow_copy(&db, user_id, copy_id, None)
        .await
        .unwrap();

    for expected in 1..=3 {
        let renewed = borrowing_service::renew_borrowing(&db, loan.id)
            .await
            .expect("Renewal within limit should succeed");
        assert_eq!(renewed.renewal_count, expected);
    }

    let err = borrowing_service::renew_borrowing(&db, loan.id)
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidState(msg) => assert!(msg.contains("renewal")),
        other => panic!("unexpected error: {:?}", other),
    }
}

// Insert a loan that is already past due, bypassing the service
async fn insert_overdue_loan(
    db: &DatabaseConnection,
    user_id: i32,
    book_id: i32,
    copy_id: i32,
    days_late: i64,
) -> i32 {
    let now = Utc::now().to_rfc3339();
    let today = Utc::now().date_naive();
    let loan = borrowing::ActiveModel {
        user_id: Set(user_id),
        book_id: Set(book_id),
        copy_id: Set(copy_id),
        borrow_date: Set((today - Duration::days(days_late + 14))
            .format("%Y-%m-%d")
            .to_string()),
        due_date: Set((today - Duration::days(days_late))
            .format("%Y-%m-%d")
            .to_string()),
        return_date: Set(None),
        status: Set("borrowed".to_string()),
        renewal_count: Set(0),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    loan.insert(db).await.expect("Failed to insert loan").id
}

#[tokio::test]
async fn test_overdue_return_creates_fine() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "late").await;
    give_membership(&db, user_id).await;
    let (book_id, copy_id) = create_test_book_with_copy(&db, "666").await;

    let loan_id = insert_overdue_loan(&db, user_id, book_id, copy_id, 5).await;

    borrowing_service::return_borrowing(&db, loan_id)
        .await
        .expect("Return should succeed");

    let fines = fine::Entity::find()
        .filter(fine::Column::BorrowingId.eq(loan_id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].amount, 5.0 * borrowing_service::DAILY_FINE_RATE);
    assert_eq!(fines[0].reason, "overdue");
    assert!(!fines[0].is_paid);
}

#[tokio::test]
async fn test_overdue_loans_cannot_be_renewed() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "verylate").await;
    give_membership(&db, user_id).await;
    let (book_id, copy_id) = create_test_book_with_copy(&db, "777").await;

    let loan_id = insert_overdue_loan(&db, user_id, book_id, copy_id, 2).await;

    let err = borrowing_service::renew_borrowing(&db, loan_id)
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidState(msg) => assert!(msg.contains("Overdue")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_overdue_is_idempotent() {
    let db = setup_test_db().await;
    let user_id = create_test_user(&db, "sweep").await;
    give_membership(&db, user_id).await;
    let (book_id, copy_id) = create_test_book_with_copy(&db, "888").await;

    let loan_id = insert_overdue_loan(&db, user_id, book_id, copy_id, 3).await;

    let updated = borrowing_service::refresh_overdue(&db).await.unwrap();
    assert_eq!(updated, 1);

    let loan = borrowing::Entity::find_by_id(loan_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loan.status, "overdue");

    // A second sweep keeps a single unpaid fine with the current amount
    borrowing_service::refresh_overdue(&db).await.unwrap();

    let unpaid = fine::Entity::find()
        .filter(fine::Column::BorrowingId.eq(loan_id))
        .filter(fine::Column::IsPaid.eq(false))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(unpaid, 1);

    let f = fine::Entity::find()
        .filter(fine::Column::BorrowingId.eq(loan_id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(f.amount, 3.0 * borrowing_service::DAILY_FINE_RATE);
}
