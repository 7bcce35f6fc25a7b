use chrono::Utc;
use sea_orm::*;

use crate::models::audit_log;

/// Append an audit log entry. Callers treat this as fire-and-forget
/// (`let _ = audit::log_action(...).await;`): a failed write must never
/// fail the operation it records.
pub async fn log_action(
    db: &DatabaseConnection,
    user_id: Option<i32>,
    action: &str,
    resource_type: &str,
    resource_id: Option<i32>,
    details: Option<serde_json::Value>,
) -> Result<(), DbErr> {
    let entry = audit_log::ActiveModel {
        user_id: Set(user_id),
        action: Set(action.to_owned()),
        resource_type: Set(resource_type.to_owned()),
        resource_id: Set(resource_id),
        details: Set(details.map(|d| d.to_string())),
        ip_address: Set(None),
        created_at: Set(Utc::now().to_rfc3339()),
        ..Default::default()
    };

    if let Err(e) = entry.insert(db).await {
        tracing::warn!("failed to write audit log entry: {}", e);
        return Err(e);
    }

    Ok(())
}
