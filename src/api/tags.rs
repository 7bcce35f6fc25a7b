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
use crate::models::tag::{self, Entity as Tag};

#[derive(Deserialize)]
pub struct CreateTagRequest {
    name: String,
    color: Option<String>,
}

pub async fn list_tags(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let tags = Tag::find().all(&db).await.unwrap_or(vec![]);
    (StatusCode::OK, Json(tags)).into_response()
}

pub async fn create_tag(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_tag = tag::ActiveModel {
        name: Set(payload.name),
        color: Set(payload.color),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_tag.insert(&db).await {
        Ok(model) => Ok((StatusCode::CREATED, Json(model))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn get_tag(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let found = Tag::find_by_id(id).one(&db).await.unwrap_or(None);
    match found {
        Some(model) => (StatusCode::OK, Json(model)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Tag not found" })),
        )
            .into_response(),
    }
}

pub async fn delete_tag(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    match Tag::delete_by_id(id).exec(&db).await {
        Ok(res) if res.rows_affected > 0 => Ok(Json(json!({ "message": "Tag deleted" }))),
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Tag not found" })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}
