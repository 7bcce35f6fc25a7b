use chrono::Utc;
use sea_orm::*;

use crate::models::event_registration::{self, Entity as EventRegistration};
use crate::models::library_event::{self, Entity as LibraryEvent};
use crate::services::ServiceError;

/// Register a user for an event, enforcing deadline, capacity and the
/// one-registration-per-user rule.
pub async fn register(
    db: &DatabaseConnection,
    event_id: i32,
    user_id: i32,
    notes: Option<String>,
) -> Result<event_registration::Model, ServiceError> {
    let event = LibraryEvent::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if !event.is_registration_open() {
        return Err(ServiceError::InvalidState(
            "Registration deadline has passed".to_string(),
        ));
    }

    let existing = EventRegistration::find()
        .filter(event_registration::Column::EventId.eq(event_id))
        .filter(event_registration::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    if let Some(reg) = existing {
        if reg.status == "cancelled" {
            // Re-activate instead of violating the unique constraint
            let now = Utc::now().to_rfc3339();
            let mut active: event_registration::ActiveModel = reg.into();
            active.status = Set("registered".to_owned());
            active.registration_date = Set(now.clone());
            active.notes = Set(notes);
            active.updated_at = Set(now);
            return Ok(active.update(db).await?);
        }
        return Err(ServiceError::InvalidState(
            "Already registered for this event".to_string(),
        ));
    }

    if let Some(capacity) = event.capacity {
        let registered = registered_count(db, event_id).await?;
        if registered >= capacity as u64 {
            return Err(ServiceError::InvalidState("Event is full".to_string()));
        }
    }

    let now = Utc::now().to_rfc3339();
    let registration = event_registration::ActiveModel {
        event_id: Set(event_id),
        user_id: Set(user_id),
        registration_date: Set(now.clone()),
        status: Set("registered".to_owned()),
        notes: Set(notes),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(registration.insert(db).await?)
}

/// Move a registration to a new status ('cancelled', 'attended', 'no_show').
pub async fn set_status(
    db: &DatabaseConnection,
    registration_id: i32,
    status: &str,
) -> Result<event_registration::Model, ServiceError> {
    if !["registered", "attended", "cancelled", "no_show"].contains(&status) {
        return Err(ServiceError::Validation(format!(
            "Invalid registration status '{}'",
            status
        )));
    }

    let registration = EventRegistration::find_by_id(registration_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut active: event_registration::ActiveModel = registration.into();
    active.status = Set(status.to_owned());
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

/// Count live registrations for an event.
pub async fn registered_count(
    db: &DatabaseConnection,
    event_id: i32,
) -> Result<u64, ServiceError> {
    let count = EventRegistration::find()
        .filter(event_registration::Column::EventId.eq(event_id))
        .filter(event_registration::Column::Status.is_in(["registered", "attended"]))
        .count(db)
        .await?;
    Ok(count)
}

/// Event plus derived occupancy fields for list endpoints.
pub async fn event_details(
    db: &DatabaseConnection,
    event: &library_event::Model,
) -> Result<serde_json::Value, ServiceError> {
    let registrations_count = registered_count(db, event.id).await?;
    let (is_full, available_spots) = match event.capacity {
        Some(capacity) => {
            let left = (capacity as i64 - registrations_count as i64).max(0);
            (left == 0, Some(left))
        }
        None => (false, None),
    };

    Ok(serde_json::json!({
        "id": event.id,
        "title": event.title,
        "description": event.description,
        "event_type": event.event_type,
        "start_time": event.start_time,
        "end_time": event.end_time,
        "location": event.location,
        "capacity": event.capacity,
        "registration_deadline": event.registration_deadline,
        "created_by": event.created_by,
        "created_at": event.created_at,
        "updated_at": event.updated_at,
        "is_registration_open": event.is_registration_open(),
        "is_full": is_full,
        "available_spots": available_spots,
        "registrations_count": registrations_count,
    }))
}
