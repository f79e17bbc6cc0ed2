//! Payment bookkeeping - Money members hand over toward their dues.
//!
//! Only completed payments reduce what a member owes. Approval is a separate step so a
//! manager can acknowledge a transfer before the money has actually cleared.

use crate::{
    core::{
        auth::{self, Action, ActorContext},
        clock::Clock,
        member::get_member,
        tenant::get_active_tenant,
    },
    entities::{MemberStatus, PaymentMethod, PaymentRecord, PaymentStatus, payment_record},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// A payment to record.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Paying member
    pub member_id: i64,
    /// Day the money was handed over
    pub date: NaiveDate,
    /// Amount, strictly positive
    pub amount: Decimal,
    /// How it was paid
    pub method: PaymentMethod,
    /// Transaction reference for non-cash payments
    pub reference: Option<String>,
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid(format!("payment amount {amount} must be positive")));
    }
    Ok(())
}

async fn find_payment<C>(db: &C, payment_id: i64) -> Result<payment_record::Model>
where
    C: ConnectionTrait,
{
    PaymentRecord::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(Error::RecordNotFound {
            kind: "payment",
            id: payment_id,
        })
}

/// Records a payment. Former members may still settle what they owe.
#[instrument(skip(db, clock, actor, input), fields(member_id = input.member_id, amount = %input.amount))]
pub async fn record_payment(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    tenant_id: i64,
    input: NewPayment,
) -> Result<payment_record::Model> {
    validate_amount(input.amount)?;

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let member = get_member(&txn, tenant_id, input.member_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordPayment, &tenant, member.id)?;
    if !matches!(member.status, MemberStatus::Approved | MemberStatus::Left) {
        return Err(Error::unauthorized(format!(
            "member {} has no billable membership",
            member.id
        )));
    }

    let payment = payment_record::ActiveModel {
        tenant_id: Set(tenant_id),
        member_id: Set(member.id),
        date: Set(input.date),
        amount: Set(input.amount.into()),
        method: Set(input.method),
        status: Set(PaymentStatus::Pending),
        reference: Set(input.reference),
        approved_at: Set(None),
        approved_by: Set(None),
        created_at: Set(clock.now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(payment)
}

async fn transition(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    payment_id: i64,
    next: impl FnOnce(PaymentStatus) -> Result<PaymentStatus>,
) -> Result<payment_record::Model> {
    let txn = db.begin().await?;
    let payment = find_payment(&txn, payment_id).await?;
    let tenant = get_active_tenant(&txn, payment.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::Approve, &tenant)?;

    let status = next(payment.status)?;
    let first_review = payment.approved_at.is_none();
    let mut active: payment_record::ActiveModel = payment.into();
    active.status = Set(status);
    if first_review {
        active.approved_at = Set(Some(clock.now()));
        active.approved_by = Set(actor.person_id());
    }
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(payment_id, status = status.as_str(), "Payment status changed");
    Ok(updated)
}

/// Acknowledges a pending payment.
#[instrument(skip(db, clock, actor))]
pub async fn approve_payment(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    payment_id: i64,
) -> Result<payment_record::Model> {
    transition(db, clock, actor, payment_id, |s| s.approve(payment_id)).await
}

/// Marks a payment as settled; from then on it counts toward statements.
#[instrument(skip(db, clock, actor))]
pub async fn complete_payment(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    payment_id: i64,
) -> Result<payment_record::Model> {
    transition(db, clock, actor, payment_id, PaymentStatus::complete).await
}

/// Declines a pending payment.
#[instrument(skip(db, clock, actor))]
pub async fn reject_payment(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    payment_id: i64,
) -> Result<payment_record::Model> {
    transition(db, clock, actor, payment_id, |s| s.reject(payment_id)).await
}

/// Corrects amount, method or reference. Approved and completed payments need a
/// manager.
#[instrument(skip(db, actor))]
pub async fn update_payment(
    db: &DatabaseConnection,
    actor: &ActorContext,
    payment_id: i64,
    amount: Decimal,
    method: PaymentMethod,
    reference: Option<String>,
) -> Result<payment_record::Model> {
    validate_amount(amount)?;

    let txn = db.begin().await?;
    let payment = find_payment(&txn, payment_id).await?;
    let tenant = get_active_tenant(&txn, payment.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordPayment, &tenant, payment.member_id)?;
    auth::require_mutable(
        actor,
        &tenant,
        matches!(payment.status, PaymentStatus::Approved | PaymentStatus::Completed),
        "payment",
        payment_id,
    )?;

    let mut active: payment_record::ActiveModel = payment.into();
    active.amount = Set(amount.into());
    active.method = Set(method);
    active.reference = Set(reference);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Completed payments of a mess between `from` and `until` inclusive.
pub async fn completed_payments_in_range<C>(
    db: &C,
    tenant_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<payment_record::Model>>
where
    C: ConnectionTrait,
{
    PaymentRecord::find()
        .filter(payment_record::Column::TenantId.eq(tenant_id))
        .filter(payment_record::Column::Status.eq(PaymentStatus::Completed))
        .filter(payment_record::Column::Date.between(from, until))
        .order_by_asc(payment_record::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}
