use chrono::Utc;
use libris::db;
use libris::models::{book, book_copy, borrowing, fine, user};
use libris::services::{fine_service, ServiceError};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

// A fine needs a borrowing chain behind it; build the minimum fixture.
async fn create_test_fine(db: &DatabaseConnection, amount: f64) -> (i32, i32) {
    let now = Utc::now().to_rfc3339();
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let yesterday = (Utc::now().date_naive() - chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();

    let owner = user::ActiveModel {
        username: Set(format!("owner-{}", amount)),
        password_hash: Set("hash".to_string()),
        email: Set(format!("owner-{}@test.local", amount)),
        full_name: Set("Owner".to_string()),
        role: Set("member".to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let b = book::ActiveModel {
        isbn: Set(format!("isbn-{}", amount)),
        title: Set("Fined Book".to_string()),
        copies_total: Set(1),
        copies_available: Set(0),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let copy = book_copy::ActiveModel {
        book_id: Set(b.id),
        barcode: Set(format!("bc-fine-{}", amount)),
        condition: Set("good".to_string()),
        is_available: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let loan = borrowing::ActiveModel {
        user_id: Set(owner.id),
        book_id: Set(b.id),
        copy_id: Set(copy.id),
        borrow_date: Set(yesterday),
        due_date: Set(today),
        return_date: Set(None),
        status: Set("borrowed".to_string()),
        renewal_count: Set(0),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let f = fine::ActiveModel {
        borrowing_id: Set(loan.id),
        amount: Set(amount),
        reason: Set("overdue".to_string()),
        is_paid: Set(false),
        paid_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    (f.id, owner.id)
}

fn payment(amount: f64) -> fine_service::PaymentRequest {
    fine_service::PaymentRequest {
        amount,
        payment_method: "cash".to_string(),
        payment_reference: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_full_payment_marks_fine_paid() {
    let db = setup_test_db().await;
    let (fine_id, owner_id) = create_test_fine(&db, 5.0).await;

    let updated = fine_service::pay_fine(&db, fine_id, owner_id, payment(5.0))
        .await
        .expect("Payment should succeed");

    assert!(updated.is_paid);
    assert!(updated.paid_at.is_some());
}

#[tokio::test]
async fn test_partial_payments_accumulate() {
    let db = setup_test_db().await;
    let (fine_id, owner_id) = create_test_fine(&db, 10.0).await;

    let after_first = fine_service::pay_fine(&db, fine_id, owner_id, payment(4.0))
        .await
        .unwrap();
    assert!(!after_first.is_paid);

    let total = fine_service::paid_total(&db, fine_id).await.unwrap();
    assert_eq!(total, 4.0);

    let after_second = fine_service::pay_fine(&db, fine_id, owner_id, payment(6.0))
        .await
        .unwrap();
    assert!(after_second.is_paid);
}

#[tokio::test]
async fn test_overpayment_rejected() {
    let db = setup_test_db().await;
    let (fine_id, owner_id) = create_test_fine(&db, 3.0).await;

    let err = fine_service::pay_fine(&db, fine_id, owner_id, payment(5.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_paying_settled_fine_rejected() {
    let db = setup_test_db().await;
    let (fine_id, owner_id) = create_test_fine(&db, 2.0).await;

    fine_service::pay_fine(&db, fine_id, owner_id, payment(2.0))
        .await
        .unwrap();

    let err = fine_service::pay_fine(&db, fine_id, owner_id, payment(1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_invalid_payment_inputs() {
    let db = setup_test_db().await;
    let (fine_id, owner_id) = create_test_fine(&db, 2.0).await;

    let err = fine_service::pay_fine(&db, fine_id, owner_id, payment(0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let mut bad_method = payment(1.0);
    bad_method.payment_method = "barter".to_string();
    let err = fine_service::pay_fine(&db, fine_id, owner_id, bad_method)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = fine_service::pay_fine(&db, 9999, owner_id, payment(1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}
