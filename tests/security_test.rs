use libris::auth::{create_jwt, decode_jwt, hash_password, verify_password};
use libris::db;
use libris::services::audit;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serial_test::serial;

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

#[tokio::test]
async fn test_password_hashing() {
    let password = "super_secret_password";
    let hash = hash_password(password).expect("Failed to hash password");

    assert_ne!(password, hash);
    assert!(verify_password(password, &hash).unwrap());
    assert!(!verify_password("wrong_password", &hash).unwrap());
}

#[tokio::test]
#[serial]
async fn test_jwt_creation_and_verification() {
    let token = create_jwt("test_user", 42, "admin").expect("Failed to create JWT");
    assert!(!token.is_empty());

    let claims = decode_jwt(&token).expect("Failed to verify JWT");
    assert_eq!(claims.sub, "test_user");
    assert_eq!(claims.uid, 42);
    assert_eq!(claims.role, "admin");
    assert!(claims.is_staff());

    let member = decode_jwt(&create_jwt("reader", 7, "member").unwrap()).unwrap();
    assert!(!member.is_staff());
}

#[tokio::test]
#[serial]
async fn test_tampered_token_rejected() {
    let token = create_jwt("test_user", 1, "member").unwrap();
    let mut tampered = token.clone();
    tampered.push('x');
    assert!(decode_jwt(&tampered).is_err());
}

#[tokio::test]
async fn test_audit_log_appends() {
    let db = setup_test_db().await;

    audit::log_action(
        &db,
        Some(1),
        "borrow",
        "borrowing",
        Some(10),
        Some(serde_json::json!({ "copy_id": 3 })),
    )
    .await
    .expect("audit write should succeed");

    audit::log_action(&db, None, "login", "user", None, None)
        .await
        .expect("audit write should succeed");

    use libris::models::audit_log;
    let entries = audit_log::Entity::find().all(&db).await.unwrap();
    assert_eq!(entries.len(), 2);

    let borrow_entries = audit_log::Entity::find()
        .filter(audit_log::Column::Action.eq("borrow"))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(borrow_entries.len(), 1);
    assert_eq!(borrow_entries[0].resource_type, "borrowing");
    assert_eq!(borrow_entries[0].resource_id, Some(10));
    assert!(borrow_entries[0]
        .details
        .as_deref()
        .unwrap()
        .contains("copy_id"));
}
