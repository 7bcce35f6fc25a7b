use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::models::book::{self, Entity as Book};
use crate::models::book_copy::{self, Entity as BookCopy, CONDITIONS};
use crate::services::audit;

pub async fn list_book_copies(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
) -> impl IntoResponse {
    let copies = BookCopy::find()
        .filter(book_copy::Column::BookId.eq(book_id))
        .order_by_asc(book_copy::Column::Id)
        .all(&db)
        .await
        .unwrap_or(vec![]);
    (StatusCode::OK, Json(json!({ "copies": copies }))).into_response()
}

#[derive(Deserialize)]
pub struct CreateCopyRequest {
    book_id: i32,
    barcode: Option<String>,
    condition: Option<String>,
    location: Option<String>,
    price: Option<f64>,
    acquisition_date: Option<String>,
    notes: Option<String>,
}

/// Register a new physical copy. The parent book's counters move with it.
pub async fn create_copy(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateCopyRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let condition = payload.condition.unwrap_or_else(|| "good".to_string());
    if !CONDITIONS.contains(&condition.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Invalid condition '{}'", condition) })),
        ));
    }

    let book = Book::find_by_id(payload.book_id)
        .one(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
        ))?;

    let barcode = payload
        .barcode
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let now = chrono::Utc::now().to_rfc3339();

    let txn = db.begin().await.map_err(internal)?;

    let new_copy = book_copy::ActiveModel {
        book_id: Set(payload.book_id),
        barcode: Set(barcode),
        acquisition_date: Set(payload.acquisition_date),
        condition: Set(condition),
        location: Set(payload.location),
        price: Set(payload.price),
        is_available: Set(true),
        notes: Set(payload.notes),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let saved = new_copy.insert(&txn).await.map_err(internal)?;

    let total = book.copies_total + 1;
    let available = book.copies_available + 1;
    let mut book_active: book::ActiveModel = book.into();
    book_active.copies_total = Set(total);
    book_active.copies_available = Set(available);
    book_active.updated_at = Set(now);
    book_active.update(&txn).await.map_err(internal)?;

    txn.commit().await.map_err(internal)?;

    let _ = audit::log_action(&db, Some(claims.uid), "create", "copy", Some(saved.id), None).await;

    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn get_copy(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let found = BookCopy::find_by_id(id).one(&db).await.unwrap_or(None);
    match found {
        Some(model) => (StatusCode::OK, Json(model)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Copy not found" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct UpdateConditionRequest {
    condition: String,
    notes: Option<String>,
}

pub async fn update_condition(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateConditionRequest>,
) -> Result<Json<book_copy::Model>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    if !CONDITIONS.contains(&payload.condition.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Invalid condition '{}'", payload.condition) })),
        ));
    }

    let found = BookCopy::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Copy not found" })),
        ))?;

    let mut active: book_copy::ActiveModel = found.into();
    active.condition = Set(payload.condition);
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let updated = active.update(&db).await.map_err(internal)?;

    Ok(Json(updated))
}

/// Remove a copy from the shelf. Rejected while the copy is out on loan.
pub async fn delete_copy(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let copy = BookCopy::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Copy not found" })),
        ))?;

    if !copy.is_available {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Copy is currently borrowed" })),
        ));
    }

    let book = Book::find_by_id(copy.book_id)
        .one(&db)
        .await
        .map_err(internal)?;

    let txn = db.begin().await.map_err(internal)?;

    copy.delete(&txn).await.map_err(internal)?;

    if let Some(book) = book {
        let total = (book.copies_total - 1).max(0);
        let available = (book.copies_available - 1).max(0);
        let mut book_active: book::ActiveModel = book.into();
        book_active.copies_total = Set(total);
        book_active.copies_available = Set(available);
        book_active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        book_active.update(&txn).await.map_err(internal)?;
    }

    txn.commit().await.map_err(internal)?;

    let _ = audit::log_action(&db, Some(claims.uid), "delete", "copy", Some(id), None).await;

    Ok(Json(json!({ "message": "Copy deleted" })))
}

fn internal(e: sea_orm::DbErr) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}
