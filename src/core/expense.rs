//! Expense bookkeeping - Shared costs (gas, internet, maid) charged to members.

use crate::{
    core::{
        auth::{self, Action, ActorContext},
        clock::Clock,
        member::get_member,
        tenant::get_active_tenant,
    },
    entities::{ApprovalStatus, ExpenseCategory, ExpenseRecord, expense_record},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// An expense to record.
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// Member charged
    pub member_id: i64,
    /// Category the expense belongs to
    pub category_id: i64,
    /// Day the expense was incurred
    pub date: NaiveDate,
    /// Amount, strictly positive
    pub amount: Decimal,
    /// Free-form note
    pub description: Option<String>,
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid(format!("expense amount {amount} must be positive")));
    }
    Ok(())
}

async fn find_expense<C>(db: &C, expense_id: i64) -> Result<expense_record::Model>
where
    C: ConnectionTrait,
{
    ExpenseRecord::find_by_id(expense_id)
        .one(db)
        .await?
        .ok_or(Error::RecordNotFound {
            kind: "expense",
            id: expense_id,
        })
}

/// Records an expense against a member. It starts out pending approval.
#[instrument(skip(db, clock, actor, input), fields(member_id = input.member_id, amount = %input.amount))]
pub async fn record_expense(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    tenant_id: i64,
    input: NewExpense,
) -> Result<expense_record::Model> {
    validate_amount(input.amount)?;

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let member = get_member(&txn, tenant_id, input.member_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordExpense, &tenant, member.id)?;
    if !member.is_active() {
        return Err(Error::unauthorized(format!(
            "member {} is not an approved member",
            member.id
        )));
    }
    ExpenseCategory::find_by_id(input.category_id)
        .one(&txn)
        .await?
        .filter(|c| c.tenant_id == tenant_id)
        .ok_or(Error::RecordNotFound {
            kind: "expense category",
            id: input.category_id,
        })?;

    let expense = expense_record::ActiveModel {
        tenant_id: Set(tenant_id),
        member_id: Set(member.id),
        category_id: Set(input.category_id),
        date: Set(input.date),
        amount: Set(input.amount.into()),
        description: Set(input.description),
        status: Set(ApprovalStatus::Pending),
        approved_at: Set(None),
        approved_by: Set(None),
        created_at: Set(clock.now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(expense)
}

/// Approves a pending expense.
#[instrument(skip(db, clock, actor))]
pub async fn approve_expense(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    expense_id: i64,
) -> Result<expense_record::Model> {
    let txn = db.begin().await?;
    let expense = find_expense(&txn, expense_id).await?;
    let tenant = get_active_tenant(&txn, expense.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::Approve, &tenant)?;

    let status = expense.status.approve("expense", expense_id)?;
    let mut active: expense_record::ActiveModel = expense.into();
    active.status = Set(status);
    active.approved_at = Set(Some(clock.now()));
    active.approved_by = Set(actor.person_id());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(expense_id, "Expense approved");
    Ok(updated)
}

/// Declines a pending expense.
#[instrument(skip(db, clock, actor))]
pub async fn reject_expense(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    expense_id: i64,
) -> Result<expense_record::Model> {
    let txn = db.begin().await?;
    let expense = find_expense(&txn, expense_id).await?;
    let tenant = get_active_tenant(&txn, expense.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::Approve, &tenant)?;

    let status = expense.status.reject("expense", expense_id)?;
    let mut active: expense_record::ActiveModel = expense.into();
    active.status = Set(status);
    active.approved_at = Set(Some(clock.now()));
    active.approved_by = Set(actor.person_id());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Changes amount and note. Approved expenses need a manager.
#[instrument(skip(db, actor))]
pub async fn update_expense(
    db: &DatabaseConnection,
    actor: &ActorContext,
    expense_id: i64,
    amount: Decimal,
    description: Option<String>,
) -> Result<expense_record::Model> {
    validate_amount(amount)?;

    let txn = db.begin().await?;
    let expense = find_expense(&txn, expense_id).await?;
    let tenant = get_active_tenant(&txn, expense.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordExpense, &tenant, expense.member_id)?;
    auth::require_mutable(
        actor,
        &tenant,
        expense.status == ApprovalStatus::Approved,
        "expense",
        expense_id,
    )?;

    let mut active: expense_record::ActiveModel = expense.into();
    active.amount = Set(amount.into());
    active.description = Set(description);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Deletes an expense. Approved expenses need a manager.
#[instrument(skip(db, actor))]
pub async fn delete_expense(
    db: &DatabaseConnection,
    actor: &ActorContext,
    expense_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let expense = find_expense(&txn, expense_id).await?;
    let tenant = get_active_tenant(&txn, expense.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordExpense, &tenant, expense.member_id)?;
    auth::require_mutable(
        actor,
        &tenant,
        expense.status == ApprovalStatus::Approved,
        "expense",
        expense_id,
    )?;

    ExpenseRecord::delete_by_id(expense_id).exec(&txn).await?;
    txn.commit().await?;
    Ok(())
}

/// Approved expenses of a mess between `from` and `until` inclusive.
pub async fn approved_expenses_in_range<C>(
    db: &C,
    tenant_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<expense_record::Model>>
where
    C: ConnectionTrait,
{
    ExpenseRecord::find()
        .filter(expense_record::Column::TenantId.eq(tenant_id))
        .filter(expense_record::Column::Status.eq(ApprovalStatus::Approved))
        .filter(expense_record::Column::Date.between(from, until))
        .order_by_asc(expense_record::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}
