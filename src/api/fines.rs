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
use crate::models::borrowing::{self, Entity as Borrowing};
use crate::models::fine::{self, Entity as Fine};
use crate::models::fine_payment::{self, Entity as FinePayment};
use crate::services::{audit, fine_service};

fn internal(e: sea_orm::DbErr) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

// Resolve the user a fine belongs to, through its borrowing.
async fn fine_owner(db: &DatabaseConnection, f: &fine::Model) -> Result<i32, DbErr> {
    let loan = Borrowing::find_by_id(f.borrowing_id).one(db).await?;
    Ok(loan.map(|l| l.user_id).unwrap_or(-1))
}

async fn fine_with_payments(
    db: &DatabaseConnection,
    f: fine::Model,
) -> Result<Value, DbErr> {
    let payments = FinePayment::find()
        .filter(fine_payment::Column::FineId.eq(f.id))
        .order_by_desc(fine_payment::Column::PaidAt)
        .all(db)
        .await?;
    let mut body = serde_json::to_value(&f).unwrap_or_default();
    if let Some(obj) = body.as_object_mut() {
        obj.insert("payments".to_string(), json!(payments));
    }
    Ok(body)
}

pub async fn list_fines(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let fines = if claims.is_staff() {
        Fine::find()
            .order_by_desc(fine::Column::CreatedAt)
            .all(&db)
            .await
            .map_err(internal)?
    } else {
        fines_for_user(&db, claims.uid).await.map_err(internal)?
    };

    Ok(Json(json!({ "fines": fines })))
}

async fn fines_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<fine::Model>, DbErr> {
    Fine::find()
        .join(JoinType::InnerJoin, fine::Relation::Borrowing.def())
        .filter(borrowing::Column::UserId.eq(user_id))
        .order_by_desc(fine::Column::CreatedAt)
        .all(db)
        .await
}

pub async fn get_fine(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let found = Fine::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Fine not found" })),
        ))?;

    if !claims.is_staff() {
        let owner = fine_owner(&db, &found).await.map_err(internal)?;
        if owner != claims.uid {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Permission denied" })),
            ));
        }
    }

    let body = fine_with_payments(&db, found).await.map_err(internal)?;
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct PayFineRequest {
    amount: f64,
    payment_method: Option<String>,
    payment_reference: Option<String>,
    notes: Option<String>,
}

pub async fn pay_fine(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<PayFineRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let found = Fine::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Fine not found" })),
        ))?;

    if !claims.is_staff() {
        let owner = fine_owner(&db, &found).await.map_err(internal)?;
        if owner != claims.uid {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Permission denied" })),
            ));
        }
    }

    let updated = fine_service::pay_fine(
        &db,
        id,
        claims.uid,
        fine_service::PaymentRequest {
            amount: payload.amount,
            payment_method: payload.payment_method.unwrap_or_else(|| "cash".to_string()),
            payment_reference: payload.payment_reference,
            notes: payload.notes,
        },
    )
    .await
    .map_err(service_error)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "payment",
        "fine",
        Some(id),
        Some(json!({ "amount": payload.amount })),
    )
    .await;

    let body = fine_with_payments(&db, updated).await.map_err(internal)?;
    Ok(Json(body))
}

pub async fn pending_fines(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let fines = Fine::find()
        .filter(fine::Column::IsPaid.eq(false))
        .order_by_desc(fine::Column::CreatedAt)
        .all(&db)
        .await
        .map_err(internal)?;

    Ok(Json(json!({ "fines": fines })))
}

pub async fn user_fines(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if claims.uid != user_id {
        claims.require_staff()?;
    }

    let fines = fines_for_user(&db, user_id).await.map_err(internal)?;
    Ok(Json(json!({ "fines": fines })))
}

#[derive(Deserialize)]
pub struct CreateFineRequest {
    borrowing_id: i32,
    amount: f64,
    reason: Option<String>,
}

/// Manual fine entry for damage, loss, and similar charges.
pub async fn create_fine(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CreateFineRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    if payload.amount < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Fine amount must not be negative" })),
        ));
    }

    Borrowing::find_by_id(payload.borrowing_id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Borrowing record not found" })),
        ))?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_fine = fine::ActiveModel {
        borrowing_id: Set(payload.borrowing_id),
        amount: Set(payload.amount),
        reason: Set(payload.reason.unwrap_or_else(|| "manual".to_string())),
        is_paid: Set(false),
        paid_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_fine.insert(&db).await.map_err(internal)?;

    let _ = audit::log_action(&db, Some(claims.uid), "create", "fine", Some(model.id), None).await;

    Ok((StatusCode::CREATED, Json(json!({ "fine": model }))))
}
