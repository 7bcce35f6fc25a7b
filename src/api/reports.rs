use axum::{extract::State, http::StatusCode, Json};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use crate::api::service_error;
use crate::auth::Claims;
use crate::services::stats_service;

pub async fn summary(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let summary = stats_service::summary(&db).await.map_err(service_error)?;

    Ok(Json(json!({ "summary": summary })))
}
