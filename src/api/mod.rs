pub mod audit;
pub mod auth;
pub mod authors;
pub mod books;
pub mod borrowings;
pub mod categories;
pub mod copies;
pub mod events;
pub mod export;
pub mod fines;
pub mod health;
pub mod memberships;
pub mod reports;
pub mod reviews;
pub mod tags;
pub mod users;

use axum::{
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use crate::services::ServiceError;

/// Translate a service error into an HTTP response.
pub(crate) fn service_error(e: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::InvalidState(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("service error: {}", e);
    }
    (status, Json(json!({ "error": e.to_string() })))
}

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::get_me))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::deactivate_user),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/copies", get(copies::list_book_copies))
        .route("/books/:id/tags", post(books::attach_tag))
        .route("/books/:id/tags/:tag_id", delete(books::detach_tag))
        .route(
            "/books/:id/reviews",
            get(reviews::list_book_reviews).post(reviews::create_review),
        )
        // Authors
        .route(
            "/authors",
            get(authors::list_authors).post(authors::create_author),
        )
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Tags
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/:id", get(tags::get_tag).delete(tags::delete_tag))
        // Copies
        .route("/copies", post(copies::create_copy))
        .route(
            "/copies/:id",
            get(copies::get_copy).delete(copies::delete_copy),
        )
        .route("/copies/:id/condition", put(copies::update_condition))
        // Borrowings
        .route("/borrowings/borrow", post(borrowings::borrow_book))
        .route("/borrowings/return", post(borrowings::return_book))
        .route("/borrowings/:id/renew", put(borrowings::renew_borrowing))
        .route("/borrowings/user", get(borrowings::my_borrowings))
        .route("/borrowings/user/:id", get(borrowings::user_borrowings))
        .route("/borrowings/overdue", get(borrowings::overdue_borrowings))
        .route(
            "/borrowings/refresh-overdue",
            post(borrowings::refresh_overdue),
        )
        // Fines
        .route("/fines", get(fines::list_fines).post(fines::create_fine))
        .route("/fines/pending", get(fines::pending_fines))
        .route("/fines/user/:id", get(fines::user_fines))
        .route("/fines/:id", get(fines::get_fine))
        .route("/fines/:id/pay", post(fines::pay_fine))
        // Memberships
        .route(
            "/memberships/types",
            get(memberships::list_types).post(memberships::create_type),
        )
        .route("/memberships/types/:id", put(memberships::update_type))
        .route("/memberships/assign", post(memberships::assign_membership))
        .route("/memberships/user/:id", get(memberships::user_membership))
        // Events
        .route(
            "/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/register", post(events::register))
        .route(
            "/events/:id/registrations",
            get(events::list_registrations),
        )
        .route(
            "/events/registrations/:id",
            put(events::update_registration),
        )
        // Reviews
        .route("/reviews/:id", delete(reviews::delete_review))
        // Audit log
        .route("/audit-logs", get(audit::list_logs))
        .route("/audit-logs/:id", get(audit::get_log))
        // Reports
        .route("/reports/summary", get(reports::summary))
        // Export
        .route("/export/books.csv", get(export::export_books_csv))
        .with_state(db)
}
