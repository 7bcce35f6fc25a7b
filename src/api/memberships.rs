use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::service_error;
use crate::auth::Claims;
use crate::models::membership_type::{self, Entity as MembershipType};
use crate::services::{audit, membership_service};

fn internal(e: sea_orm::DbErr) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

pub async fn list_types(
    State(db): State<DatabaseConnection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let types = MembershipType::find()
        .filter(membership_type::Column::IsActive.eq(true))
        .order_by_asc(membership_type::Column::Price)
        .all(&db)
        .await
        .map_err(internal)?;

    Ok(Json(json!({ "membership_types": types })))
}

#[derive(Deserialize)]
pub struct MembershipTypeRequest {
    name: String,
    description: Option<String>,
    max_books: Option<i32>,
    max_days: Option<i32>,
    price: Option<f64>,
    is_active: Option<bool>,
}

pub async fn create_type(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<MembershipTypeRequest>,
) -> Result<(StatusCode, Json<membership_type::Model>), (StatusCode, Json<Value>)> {
    claims.require_admin()?;

    let max_books = payload.max_books.unwrap_or(3);
    let max_days = payload.max_days.unwrap_or(14);
    if max_books < 1 || max_days < 1 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "max_books and max_days must be positive" })),
        ));
    }

    let new_type = membership_type::ActiveModel {
        name: Set(payload.name),
        description: Set(payload.description),
        max_books: Set(max_books),
        max_days: Set(max_days),
        price: Set(payload.price.unwrap_or(0.0)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        ..Default::default()
    };

    let model = new_type.insert(&db).await.map_err(internal)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "create",
        "membership",
        Some(model.id),
        None,
    )
    .await;

    Ok((StatusCode::CREATED, Json(model)))
}

pub async fn update_type(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<MembershipTypeRequest>,
) -> Result<Json<membership_type::Model>, (StatusCode, Json<Value>)> {
    claims.require_admin()?;

    let found = MembershipType::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Membership type not found" })),
        ))?;

    let mut active: membership_type::ActiveModel = found.into();
    active.name = Set(payload.name);
    active.description = Set(payload.description);
    if let Some(max_books) = payload.max_books {
        active.max_books = Set(max_books);
    }
    if let Some(max_days) = payload.max_days {
        active.max_days = Set(max_days);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(&db).await.map_err(internal)?;

    let _ = audit::log_action(&db, Some(claims.uid), "update", "membership", Some(id), None).await;

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct AssignMembershipRequest {
    user_id: i32,
    membership_type_id: i32,
    duration_days: Option<i64>,
}

pub async fn assign_membership(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<AssignMembershipRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let membership = membership_service::assign_membership(
        &db,
        payload.user_id,
        payload.membership_type_id,
        payload.duration_days,
    )
    .await
    .map_err(service_error)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "create",
        "membership",
        Some(membership.id),
        Some(json!({ "user_id": payload.user_id, "type_id": payload.membership_type_id })),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "membership": membership })),
    ))
}

pub async fn user_membership(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if claims.uid != user_id {
        claims.require_staff()?;
    }

    match membership_service::active_membership(&db, user_id)
        .await
        .map_err(service_error)?
    {
        Some((membership, tier)) => Ok(Json(json!({
            "membership": membership,
            "membership_type": tier,
            "is_expired": membership_service::is_expired(&membership),
        }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No active membership" })),
        )),
    }
}
