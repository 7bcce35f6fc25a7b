use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use libris::auth::{create_jwt, hash_password};
use libris::models::user;
use libris::{db, server};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serial_test::serial;
use tower::util::ServiceExt; // for `oneshot`

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn setup_app() -> (Router, DatabaseConnection) {
    let db = setup_test_db().await;
    (server::build_router(db.clone()), db)
}

async fn create_user_with_role(db: &DatabaseConnection, username: &str, role: &str) -> i32 {
    let now = Utc::now().to_rfc3339();
    let model = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(hash_password("password123").unwrap()),
        email: Set(format!("{}@test.local", username)),
        full_name: Set(username.to_string()),
        role: Set(role.to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await.expect("Failed to create user").id
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or_default()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
#[serial]
async fn test_login_flow() {
    let (app, db) = setup_app().await;
    create_user_with_role(&db, "admin", "admin").await;

    // Success
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "username": "admin", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().expect("token in response");

    // Token works on /auth/me
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Wrong password
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "username": "admin", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_book_crud_via_api() {
    let (app, db) = setup_app().await;
    let admin_id = create_user_with_role(&db, "librarian", "librarian").await;
    let token = create_jwt("librarian", admin_id, "librarian").unwrap();

    // Create
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books",
            Some(&token),
            serde_json::json!({
                "isbn": "9780441172719",
                "title": "Dune",
                "publication_year": 1965
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let book_id = body["book"]["id"].as_i64().expect("book id") as i32;

    // List
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/books?search=Dune")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);

    // Get
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/books/{}", book_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/books/{}", book_id))
                .method("DELETE")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/books/{}", book_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_member_cannot_mutate_catalog() {
    let (app, db) = setup_app().await;
    let member_id = create_user_with_role(&db, "reader", "member").await;
    let token = create_jwt("reader", member_id, "member").unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/books",
            Some(&token),
            serde_json::json!({ "isbn": "123", "title": "Nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_protected_route_requires_token() {
    let (app, _db) = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/borrowings/user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_event_registration_flow() {
    let (app, db) = setup_app().await;
    let staff_id = create_user_with_role(&db, "organizer", "librarian").await;
    let staff_token = create_jwt("organizer", staff_id, "librarian").unwrap();
    let member_id = create_user_with_role(&db, "attendee", "member").await;
    let member_token = create_jwt("attendee", member_id, "member").unwrap();

    // Staff creates an event with capacity 1
    let start = (Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    let end = (Utc::now() + chrono::Duration::days(7) + chrono::Duration::hours(2)).to_rfc3339();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/events",
            Some(&staff_token),
            serde_json::json!({
                "title": "Book club",
                "event_type": "book_club",
                "start_time": start,
                "end_time": end,
                "capacity": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let event_id = body["event_id"].as_i64().unwrap();

    // Member registers
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/events/{}/register", event_id),
            Some(&member_token),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Duplicate registration is rejected
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/events/{}/register", event_id),
            Some(&member_token),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Event is now full for anyone else
    let other_id = create_user_with_role(&db, "latecomer", "member").await;
    let other_token = create_jwt("latecomer", other_id, "member").unwrap();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/events/{}/register", event_id),
            Some(&other_token),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Occupancy is reflected in the event detail
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/events/{}", event_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["is_full"], true);
    assert_eq!(body["registrations_count"], 1);
}

#[tokio::test]
#[serial]
async fn test_borrow_via_api() {
    let (app, db) = setup_app().await;
    let staff_id = create_user_with_role(&db, "desk", "librarian").await;
    let staff_token = create_jwt("desk", staff_id, "librarian").unwrap();
    let member_id = create_user_with_role(&db, "patron", "member").await;
    let member_token = create_jwt("patron", member_id, "member").unwrap();

    // Staff assigns the seeded Basic membership
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/memberships/assign",
            Some(&staff_token),
            serde_json::json!({ "user_id": member_id, "membership_type_id": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Staff creates a book and a copy
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books",
            Some(&staff_token),
            serde_json::json!({ "isbn": "9780553293357", "title": "Foundation" }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let book_id = body["book"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/copies",
            Some(&staff_token),
            serde_json::json!({ "book_id": book_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let copy_id = body["id"].as_i64().unwrap();

    // Member borrows the copy
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/borrowings/borrow",
            Some(&member_token),
            serde_json::json!({ "copy_id": copy_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let borrowing_id = body["borrowing"]["id"].as_i64().unwrap();

    // Loan shows up in their list
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/borrowings/user")
                .header("Authorization", format!("Bearer {}", member_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["borrowings"].as_array().unwrap().len(), 1);

    // And can be returned
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/borrowings/return",
            Some(&member_token),
            serde_json::json!({ "borrowing_id": borrowing_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
