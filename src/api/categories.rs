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
use crate::models::category::{self, Entity as Category};

pub async fn list_categories(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let categories = Category::find()
        .order_by_asc(category::Column::Name)
        .all(&db)
        .await
        .unwrap_or(vec![]);
    (StatusCode::OK, Json(categories)).into_response()
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    name: String,
    description: Option<String>,
}

pub async fn create_category(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_category = category::ActiveModel {
        name: Set(payload.name),
        description: Set(payload.description),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_category.insert(&db).await {
        Ok(model) => Ok((StatusCode::CREATED, Json(model))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn get_category(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let found = Category::find_by_id(id).one(&db).await.unwrap_or(None);
    match found {
        Some(model) => (StatusCode::OK, Json(model)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Category not found" })),
        )
            .into_response(),
    }
}

pub async fn update_category(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<category::Model>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let found = Category::find_by_id(id)
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
            Json(json!({ "error": "Category not found" })),
        ))?;

    let mut active: category::ActiveModel = found.into();
    active.name = Set(payload.name);
    active.description = Set(payload.description);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let updated = active.update(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(updated))
}

pub async fn delete_category(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    match Category::delete_by_id(id).exec(&db).await {
        Ok(res) if res.rows_affected > 0 => Ok(Json(json!({ "message": "Category deleted" }))),
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Category not found" })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}
