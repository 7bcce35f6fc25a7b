use chrono::{DateTime, Duration, Utc};
use sea_orm::*;

use crate::models::membership_type::{self, Entity as MembershipType};
use crate::models::user_membership::{self, Entity as UserMembership};
use crate::services::ServiceError;

/// Get a user's active membership together with its tier, newest first.
pub async fn active_membership(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<(user_membership::Model, membership_type::Model)>, ServiceError> {
    let found = UserMembership::find()
        .filter(user_membership::Column::UserId.eq(user_id))
        .filter(user_membership::Column::IsActive.eq(true))
        .order_by_desc(user_membership::Column::EndDate)
        .find_also_related(MembershipType)
        .one(db)
        .await?;

    match found {
        Some((membership, Some(tier))) => Ok(Some((membership, tier))),
        Some((_, None)) => Err(ServiceError::Database(
            "membership references missing tier".to_string(),
        )),
        None => Ok(None),
    }
}

/// True when the membership's end date has passed.
pub fn is_expired(membership: &user_membership::Model) -> bool {
    match DateTime::parse_from_rfc3339(&membership.end_date) {
        Ok(end) => end < Utc::now(),
        Err(_) => false,
    }
}

/// Assign a membership tier to a user, deactivating any previous active one.
pub async fn assign_membership(
    db: &DatabaseConnection,
    user_id: i32,
    membership_type_id: i32,
    duration_days: Option<i64>,
) -> Result<user_membership::Model, ServiceError> {
    let tier = MembershipType::find_by_id(membership_type_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if !tier.is_active {
        return Err(ServiceError::InvalidState(format!(
            "Membership type '{}' is not active",
            tier.name
        )));
    }

    let now = Utc::now();
    let days = duration_days.unwrap_or(365);
    if days < 1 {
        return Err(ServiceError::Validation(
            "duration_days must be positive".to_string(),
        ));
    }
    let end = now + Duration::days(days);

    let txn = db.begin().await?;

    // A user holds at most one active membership at a time
    let previous = UserMembership::find()
        .filter(user_membership::Column::UserId.eq(user_id))
        .filter(user_membership::Column::IsActive.eq(true))
        .all(&txn)
        .await?;

    for old in previous {
        let mut active: user_membership::ActiveModel = old.into();
        active.is_active = Set(false);
        active.updated_at = Set(now.to_rfc3339());
        active.update(&txn).await?;
    }

    let membership = user_membership::ActiveModel {
        user_id: Set(user_id),
        membership_type_id: Set(membership_type_id),
        start_date: Set(now.to_rfc3339()),
        end_date: Set(end.to_rfc3339()),
        is_active: Set(true),
        created_at: Set(now.to_rfc3339()),
        updated_at: Set(now.to_rfc3339()),
        ..Default::default()
    };

    let saved = membership.insert(&txn).await?;
    txn.commit().await?;

    Ok(saved)
}
