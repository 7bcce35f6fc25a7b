use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::service_error;
use crate::auth::Claims;
use crate::services::{audit, borrowing_service};

#[derive(Deserialize)]
pub struct BorrowRequest {
    copy_id: i32,
    /// Optional custom loan duration in days (1 to 30).
    days: Option<i64>,
}

pub async fn borrow_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<BorrowRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let borrowing =
        borrowing_service::borrow_copy(&db, claims.uid, payload.copy_id, payload.days)
            .await
            .map_err(service_error)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "borrow",
        "borrowing",
        Some(borrowing.id),
        Some(json!({ "copy_id": payload.copy_id, "due_date": borrowing.due_date })),
    )
    .await;

    Ok(Json(json!({
        "message": "Book borrowed successfully",
        "borrowing": borrowing
    })))
}

#[derive(Deserialize)]
pub struct ReturnRequest {
    borrowing_id: i32,
}

pub async fn return_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<ReturnRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Members may return their own loans; staff may return anyone's
    if !claims.is_staff() {
        let loans = borrowing_service::user_borrowings(&db, claims.uid)
            .await
            .map_err(service_error)?;
        if !loans.iter().any(|l| l.id == payload.borrowing_id) {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Permission denied" })),
            ));
        }
    }

    let borrowing = borrowing_service::return_borrowing(&db, payload.borrowing_id)
        .await
        .map_err(service_error)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "return",
        "borrowing",
        Some(borrowing.id),
        None,
    )
    .await;

    Ok(Json(json!({
        "message": "Book returned successfully",
        "borrowing": borrowing
    })))
}

pub async fn renew_borrowing(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !claims.is_staff() {
        let loans = borrowing_service::user_borrowings(&db, claims.uid)
            .await
            .map_err(service_error)?;
        if !loans.iter().any(|l| l.id == id) {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Permission denied" })),
            ));
        }
    }

    let borrowing = borrowing_service::renew_borrowing(&db, id)
        .await
        .map_err(service_error)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "renew",
        "borrowing",
        Some(borrowing.id),
        Some(json!({ "due_date": borrowing.due_date })),
    )
    .await;

    Ok(Json(json!({
        "message": "Borrowing renewed",
        "borrowing": borrowing
    })))
}

pub async fn my_borrowings(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let borrowings = borrowing_service::user_borrowings(&db, claims.uid)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "borrowings": borrowings })))
}

pub async fn user_borrowings(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if claims.uid != user_id {
        claims.require_staff()?;
    }

    let borrowings = borrowing_service::user_borrowings(&db, user_id)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "borrowings": borrowings })))
}

pub async fn overdue_borrowings(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let borrowings = borrowing_service::overdue_borrowings(&db)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "borrowings": borrowings })))
}

/// Manual trigger of the overdue sweep (also runs in the background).
pub async fn refresh_overdue(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let updated = borrowing_service::refresh_overdue(&db)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "updated": updated })))
}
