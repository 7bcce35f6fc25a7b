use chrono::Utc;
use sea_orm::*;

use crate::models::fine::{self, Entity as Fine};
use crate::models::fine_payment::{self, Entity as FinePayment, PAYMENT_METHODS};
use crate::services::ServiceError;

pub struct PaymentRequest {
    pub amount: f64,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

/// Record a payment against a fine. Partial payments accumulate; the fine is
/// marked paid once the payments cover its amount. Overpayment is rejected.
pub async fn pay_fine(
    db: &DatabaseConnection,
    fine_id: i32,
    paid_by: i32,
    req: PaymentRequest,
) -> Result<fine::Model, ServiceError> {
    if req.amount <= 0.0 {
        return Err(ServiceError::Validation(
            "Payment amount must be positive".to_string(),
        ));
    }

    if !PAYMENT_METHODS.contains(&req.payment_method.as_str()) {
        return Err(ServiceError::Validation(format!(
            "Invalid payment method '{}'",
            req.payment_method
        )));
    }

    let fine = Fine::find_by_id(fine_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if fine.is_paid {
        return Err(ServiceError::InvalidState(
            "Fine is already paid".to_string(),
        ));
    }

    let already_paid = paid_total(db, fine_id).await?;
    if already_paid + req.amount > fine.amount + f64::EPSILON {
        return Err(ServiceError::Validation(format!(
            "Payment exceeds outstanding balance ({:.2})",
            fine.amount - already_paid
        )));
    }

    let now = Utc::now().to_rfc3339();
    let txn = db.begin().await?;

    let payment = fine_payment::ActiveModel {
        fine_id: Set(fine_id),
        amount_paid: Set(req.amount),
        payment_method: Set(req.payment_method),
        payment_reference: Set(req.payment_reference),
        paid_by: Set(Some(paid_by)),
        paid_at: Set(now.clone()),
        notes: Set(req.notes),
        created_at: Set(now.clone()),
        ..Default::default()
    };
    payment.insert(&txn).await?;

    let covered = already_paid + req.amount >= fine.amount - f64::EPSILON;
    let mut fine_active: fine::ActiveModel = fine.into();
    if covered {
        fine_active.is_paid = Set(true);
        fine_active.paid_at = Set(Some(now.clone()));
    }
    fine_active.updated_at = Set(now);
    let updated = fine_active.update(&txn).await?;

    txn.commit().await?;

    Ok(updated)
}

/// Sum of recorded payments for a fine.
pub async fn paid_total(db: &DatabaseConnection, fine_id: i32) -> Result<f64, ServiceError> {
    let payments = FinePayment::find()
        .filter(fine_payment::Column::FineId.eq(fine_id))
        .all(db)
        .await?;
    Ok(payments.iter().map(|p| p.amount_paid).sum())
}

/// Outstanding (unpaid) fine balance across the library.
pub async fn unpaid_total(db: &DatabaseConnection) -> Result<f64, ServiceError> {
    let fines = Fine::find()
        .filter(fine::Column::IsPaid.eq(false))
        .all(db)
        .await?;
    Ok(fines.iter().map(|f| f.amount).sum())
}
