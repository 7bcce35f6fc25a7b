use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Claims;
use crate::models::book::Entity as Book;
use crate::models::review::{self, Entity as BookReview};

fn internal(e: sea_orm::DbErr) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

pub async fn list_book_reviews(
    State(db): State<DatabaseConnection>,
    Path(book_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let reviews = BookReview::find()
        .filter(review::Column::BookId.eq(book_id))
        .order_by_desc(review::Column::CreatedAt)
        .all(&db)
        .await
        .map_err(internal)?;

    let average = if reviews.is_empty() {
        0.0
    } else {
        reviews.iter().map(|r| r.rating as f64).sum::<f64>() / reviews.len() as f64
    };

    Ok(Json(json!({
        "reviews": reviews,
        "average_rating": average,
        "count": reviews.len()
    })))
}

#[derive(Deserialize)]
pub struct CreateReviewRequest {
    rating: i32,
    review_text: Option<String>,
}

pub async fn create_review(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(book_id): Path<i32>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<review::Model>), (StatusCode, Json<Value>)> {
    if !(1..=5).contains(&payload.rating) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Rating must be between 1 and 5" })),
        ));
    }

    Book::find_by_id(book_id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
        ))?;

    let existing = BookReview::find()
        .filter(review::Column::BookId.eq(book_id))
        .filter(review::Column::UserId.eq(claims.uid))
        .one(&db)
        .await
        .map_err(internal)?;

    if existing.is_some() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "You have already reviewed this book" })),
        ));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let new_review = review::ActiveModel {
        book_id: Set(book_id),
        user_id: Set(claims.uid),
        rating: Set(payload.rating),
        review_text: Set(payload.review_text),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_review.insert(&db).await.map_err(internal)?;

    Ok((StatusCode::CREATED, Json(model)))
}

pub async fn delete_review(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let found = BookReview::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Review not found" })),
        ))?;

    if found.user_id != claims.uid {
        claims.require_staff()?;
    }

    found.delete(&db).await.map_err(internal)?;

    Ok(Json(json!({ "message": "Review deleted" })))
}
