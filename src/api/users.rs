use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{hash_password, Claims};
use crate::models::user::{self, Entity as User};
use crate::services::audit;

const ROLES: [&str; 3] = ["admin", "librarian", "member"];

pub async fn list_users(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_admin()?;

    let users = User::find()
        .order_by_asc(user::Column::Username)
        .all(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(json!({ "users": users, "total": users.len() })))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    username: String,
    password: String,
    email: String,
    full_name: String,
    role: String,
    phone: Option<String>,
    address: Option<String>,
}

pub async fn create_user(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    claims.require_admin()?;

    if payload.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password must be at least 8 characters" })),
        ));
    }

    if !ROLES.contains(&payload.role.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Invalid role '{}'", payload.role) })),
        ));
    }

    let exists = User::find()
        .filter(user::Column::Username.eq(&payload.username))
        .one(&db)
        .await
        .unwrap_or(None);
    if exists.is_some() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Username already exists" })),
        ));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to create user" })),
        )
    })?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_user = user::ActiveModel {
        username: Set(payload.username),
        password_hash: Set(password_hash),
        email: Set(payload.email),
        full_name: Set(payload.full_name),
        role: Set(payload.role),
        phone: Set(payload.phone),
        address: Set(payload.address),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_user.insert(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let _ = audit::log_action(&db, Some(claims.uid), "create", "user", Some(model.id), None).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created", "user_id": model.id })),
    ))
}

pub async fn get_user(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<user::Model>, (StatusCode, Json<serde_json::Value>)> {
    // Members may only fetch themselves
    if claims.uid != id {
        claims.require_staff()?;
    }

    let found = User::find_by_id(id).one(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    found.map(Json).ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "User not found" })),
    ))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    email: Option<String>,
    full_name: Option<String>,
    role: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    password: Option<String>,
}

pub async fn update_user(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<user::Model>, (StatusCode, Json<serde_json::Value>)> {
    if claims.uid != id {
        claims.require_admin()?;
    }

    // Role changes are admin-only even on your own account
    if payload.role.is_some() {
        claims.require_admin()?;
    }

    let found = User::find_by_id(id)
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
            Json(json!({ "error": "User not found" })),
        ))?;

    let mut active: user::ActiveModel = found.into();
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    if let Some(full_name) = payload.full_name {
        active.full_name = Set(full_name);
    }
    if let Some(role) = payload.role {
        if !ROLES.contains(&role.as_str()) {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid role '{}'", role) })),
            ));
        }
        active.role = Set(role);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(password) = payload.password {
        if password.len() < 8 {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Password must be at least 8 characters" })),
            ));
        }
        let hash = hash_password(&password).map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to hash password" })),
            )
        })?;
        active.password_hash = Set(hash);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let updated = active.update(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let _ = audit::log_action(&db, Some(claims.uid), "update", "user", Some(id), None).await;

    Ok(Json(updated))
}

/// Accounts are deactivated, never hard-deleted: audit history keeps its
/// user reference.
pub async fn deactivate_user(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    claims.require_admin()?;

    let found = User::find_by_id(id)
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
            Json(json!({ "error": "User not found" })),
        ))?;

    let mut active: user::ActiveModel = found.into();
    active.is_active = Set(false);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    active.update(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let _ = audit::log_action(&db, Some(claims.uid), "delete", "user", Some(id), None).await;

    Ok(Json(json!({ "message": "User deactivated" })))
}
