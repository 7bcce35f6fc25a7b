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
use crate::models::event_registration::{self, Entity as EventRegistration};
use crate::models::library_event::{self, Entity as LibraryEvent};
use crate::services::{audit, event_service};

fn internal(e: sea_orm::DbErr) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

pub async fn list_events(
    State(db): State<DatabaseConnection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let events = LibraryEvent::find()
        .order_by_asc(library_event::Column::StartTime)
        .all(&db)
        .await
        .map_err(internal)?;

    let mut result = Vec::with_capacity(events.len());
    for event in &events {
        result.push(
            event_service::event_details(&db, event)
                .await
                .map_err(service_error)?,
        );
    }

    Ok(Json(json!({ "events": result })))
}

pub async fn get_event(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let event = LibraryEvent::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Event not found" })),
        ))?;

    let details = event_service::event_details(&db, &event)
        .await
        .map_err(service_error)?;
    Ok(Json(details))
}

#[derive(Deserialize)]
pub struct EventRequest {
    title: String,
    description: Option<String>,
    event_type: String,
    start_time: String,
    end_time: String,
    location: Option<String>,
    capacity: Option<i32>,
    registration_deadline: Option<String>,
}

pub async fn create_event(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<EventRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    if payload.end_time <= payload.start_time {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "end_time must be after start_time" })),
        ));
    }

    if let Some(capacity) = payload.capacity {
        if capacity < 1 {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "capacity must be at least 1" })),
            ));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    let new_event = library_event::ActiveModel {
        title: Set(payload.title),
        description: Set(payload.description),
        event_type: Set(payload.event_type),
        start_time: Set(payload.start_time),
        end_time: Set(payload.end_time),
        location: Set(payload.location),
        capacity: Set(payload.capacity),
        registration_deadline: Set(payload.registration_deadline),
        created_by: Set(Some(claims.uid)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_event.insert(&db).await.map_err(internal)?;

    let _ = audit::log_action(&db, Some(claims.uid), "create", "event", Some(model.id), None).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event created", "event_id": model.id })),
    ))
}

pub async fn update_event(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<EventRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let found = LibraryEvent::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Event not found" })),
        ))?;

    if payload.end_time <= payload.start_time {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "end_time must be after start_time" })),
        ));
    }

    let mut active: library_event::ActiveModel = found.into();
    active.title = Set(payload.title);
    active.description = Set(payload.description);
    active.event_type = Set(payload.event_type);
    active.start_time = Set(payload.start_time);
    active.end_time = Set(payload.end_time);
    active.location = Set(payload.location);
    active.capacity = Set(payload.capacity);
    active.registration_deadline = Set(payload.registration_deadline);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let updated = active.update(&db).await.map_err(internal)?;

    let _ = audit::log_action(&db, Some(claims.uid), "update", "event", Some(id), None).await;

    let details = event_service::event_details(&db, &updated)
        .await
        .map_err(service_error)?;
    Ok(Json(details))
}

pub async fn delete_event(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    match LibraryEvent::delete_by_id(id).exec(&db).await {
        Ok(res) if res.rows_affected > 0 => {
            let _ = audit::log_action(&db, Some(claims.uid), "delete", "event", Some(id), None)
                .await;
            Ok(Json(json!({ "message": "Event deleted" })))
        }
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Event not found" })),
        )),
        Err(e) => Err(internal(e)),
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    notes: Option<String>,
}

pub async fn register(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let notes = payload.and_then(|Json(p)| p.notes);

    let registration = event_service::register(&db, id, claims.uid, notes)
        .await
        .map_err(service_error)?;

    let _ = audit::log_action(
        &db,
        Some(claims.uid),
        "reserve",
        "event",
        Some(id),
        Some(json!({ "registration_id": registration.id })),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "registration": registration })),
    ))
}

pub async fn list_registrations(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let registrations = EventRegistration::find()
        .filter(event_registration::Column::EventId.eq(id))
        .order_by_asc(event_registration::Column::RegistrationDate)
        .all(&db)
        .await
        .map_err(internal)?;

    Ok(Json(json!({ "registrations": registrations })))
}

#[derive(Deserialize)]
pub struct UpdateRegistrationRequest {
    status: String,
}

/// Cancel your own registration, or (staff) mark attendance outcomes.
pub async fn update_registration(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRegistrationRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let registration = EventRegistration::find_by_id(id)
        .one(&db)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Registration not found" })),
        ))?;

    // Members can only cancel their own registration
    if !claims.is_staff() {
        if registration.user_id != claims.uid || payload.status != "cancelled" {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Permission denied" })),
            ));
        }
    }

    let updated = event_service::set_status(&db, id, &payload.status)
        .await
        .map_err(service_error)?;

    Ok(Json(json!({ "registration": updated })))
}
