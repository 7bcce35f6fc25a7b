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
use crate::models::author::{self, Entity as Author};
use crate::models::book_authors;

pub async fn list_authors(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let authors = Author::find()
        .order_by_asc(author::Column::LastName)
        .all(&db)
        .await
        .unwrap_or(vec![]);
    (StatusCode::OK, Json(authors)).into_response()
}

#[derive(Deserialize)]
pub struct AuthorRequest {
    first_name: String,
    last_name: String,
    biography: Option<String>,
    /// Books to link on creation.
    book_ids: Option<Vec<i32>>,
}

pub async fn create_author(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<AuthorRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_author = author::ActiveModel {
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        biography: Set(payload.biography),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_author.insert(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    if let Some(book_ids) = payload.book_ids {
        for book_id in book_ids {
            let link = book_authors::ActiveModel {
                book_id: Set(book_id),
                author_id: Set(model.id),
            };
            let _ = book_authors::Entity::insert(link)
                .on_conflict(
                    sea_orm::sea_query::OnConflict::columns([
                        book_authors::Column::BookId,
                        book_authors::Column::AuthorId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec(&db)
                .await;
        }
    }

    Ok((StatusCode::CREATED, Json(model)))
}

pub async fn get_author(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let found = Author::find_by_id(id).one(&db).await.unwrap_or(None);
    match found {
        Some(model) => (StatusCode::OK, Json(model)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Author not found" })),
        )
            .into_response(),
    }
}

pub async fn update_author(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<AuthorRequest>,
) -> Result<Json<author::Model>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let found = Author::find_by_id(id)
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
            Json(json!({ "error": "Author not found" })),
        ))?;

    let mut active: author::ActiveModel = found.into();
    active.first_name = Set(payload.first_name);
    active.last_name = Set(payload.last_name);
    active.biography = Set(payload.biography);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let updated = active.update(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(updated))
}

pub async fn delete_author(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    match Author::delete_by_id(id).exec(&db).await {
        Ok(res) if res.rows_affected > 0 => Ok(Json(json!({ "message": "Author deleted" }))),
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Author not found" })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}
