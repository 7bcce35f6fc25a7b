use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Claims;
use crate::models::audit_log::{self, Entity as AuditLog};

#[derive(Deserialize)]
pub struct ListLogsQuery {
    pub user_id: Option<i32>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<i32>,
    pub limit: Option<u64>,
}

pub async fn list_logs(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(query): Query<ListLogsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let mut condition = Condition::all();
    if let Some(user_id) = query.user_id {
        condition = condition.add(audit_log::Column::UserId.eq(user_id));
    }
    if let Some(action) = query.action {
        condition = condition.add(audit_log::Column::Action.eq(action));
    }
    if let Some(resource_type) = query.resource_type {
        condition = condition.add(audit_log::Column::ResourceType.eq(resource_type));
    }
    if let Some(resource_id) = query.resource_id {
        condition = condition.add(audit_log::Column::ResourceId.eq(resource_id));
    }

    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let logs = AuditLog::find()
        .filter(condition)
        .order_by_desc(audit_log::Column::CreatedAt)
        .limit(limit)
        .all(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(json!({ "logs": logs, "count": logs.len() })))
}

pub async fn get_log(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<audit_log::Model>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let found = AuditLog::find_by_id(id).one(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    found.map(Json).ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Log not found" })),
    ))
}
