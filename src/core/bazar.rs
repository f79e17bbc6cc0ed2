//! Bazar rotation - Grocery duty assignment and purchase records.
//!
//! Duty moves through the approved members in join order, starting after whoever made
//! the most recent purchase. A purchase is accepted only when its declared total
//! matches the item list to within one paisa.

use crate::{
    core::{
        auth::{self, Action, ActorContext},
        clock::Clock,
        member::{get_member, members_in_join_order},
        tenant::get_active_tenant,
    },
    entities::{
        ApprovalStatus, BazarRecord,
        bazar_record::{self, BazarItem, BazarItems},
        member,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Largest accepted difference between the declared total and the item sum.
pub const COST_EPSILON: Decimal = dec!(0.01);

/// A grocery run to record.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    /// Member who did the shopping
    pub member_id: i64,
    /// Day of the purchase
    pub date: NaiveDate,
    /// Lines bought, in receipt order
    pub items: Vec<BazarItem>,
    /// Total the shopper declares
    pub total_cost: Decimal,
    /// Free-form note
    pub description: Option<String>,
}

/// Checks the item lines and that `total_cost` matches their sum within
/// [`COST_EPSILON`]. Returns the computed sum.
pub fn reconcile_cost(items: &[BazarItem], total_cost: Decimal) -> Result<Decimal> {
    if items.is_empty() {
        return Err(Error::invalid("a purchase needs at least one item"));
    }
    for item in items {
        if item.name.trim().is_empty() {
            return Err(Error::invalid("item name cannot be empty"));
        }
        if item.quantity <= Decimal::ZERO {
            return Err(Error::invalid(format!(
                "item '{}' must have a positive quantity",
                item.name
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(Error::invalid(format!(
                "item '{}' has a negative price",
                item.name
            )));
        }
    }

    let computed: Decimal = items.iter().map(|i| i.quantity * i.unit_price).sum();
    if (computed - total_cost).abs() > COST_EPSILON {
        return Err(Error::CostMismatch {
            computed,
            provided: total_cost,
        });
    }
    Ok(computed)
}

/// Picks who shops after `last_member_id`.
///
/// `ordered` holds every membership of the mess in join order. The walk starts right
/// after the last assignee and wraps around, skipping anyone not currently approved.
/// With no previous assignee (or one that is no longer listed) the first approved
/// member is chosen.
#[must_use]
pub fn next_in_rotation(
    ordered: &[member::Model],
    last_member_id: Option<i64>,
) -> Option<&member::Model> {
    let first_active = || ordered.iter().find(|m| m.is_active());
    let Some(position) = last_member_id.and_then(|id| ordered.iter().position(|m| m.id == id))
    else {
        return first_active();
    };

    let len = ordered.len();
    (1..=len)
        .map(|step| &ordered[(position + step) % len])
        .find(|m| m.is_active())
}

async fn last_assignee<C>(db: &C, tenant_id: i64) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let latest = BazarRecord::find()
        .filter(bazar_record::Column::TenantId.eq(tenant_id))
        .filter(bazar_record::Column::Status.ne(ApprovalStatus::Rejected))
        .order_by_desc(bazar_record::Column::Date)
        .order_by_desc(bazar_record::Column::Id)
        .one(db)
        .await?;
    Ok(latest.map(|record| record.member_id))
}

/// The member on bazar duty next, or `None` when rotation is off or nobody is
/// approved.
pub async fn next_assignee<C>(db: &C, tenant_id: i64) -> Result<Option<member::Model>>
where
    C: ConnectionTrait,
{
    let tenant = get_active_tenant(db, tenant_id).await?;
    if !tenant.auto_bazar_rotation {
        return Ok(None);
    }
    let ordered = members_in_join_order(db, tenant_id).await?;
    let last = last_assignee(db, tenant_id).await?;
    Ok(next_in_rotation(&ordered, last).cloned())
}

/// The next `count` duty holders, in order.
pub async fn rotation_schedule<C>(db: &C, tenant_id: i64, count: usize) -> Result<Vec<member::Model>>
where
    C: ConnectionTrait,
{
    let tenant = get_active_tenant(db, tenant_id).await?;
    if !tenant.auto_bazar_rotation {
        return Ok(Vec::new());
    }
    let ordered = members_in_join_order(db, tenant_id).await?;
    let mut last = last_assignee(db, tenant_id).await?;

    let mut schedule = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(next) = next_in_rotation(&ordered, last) else {
            break;
        };
        last = Some(next.id);
        schedule.push(next.clone());
    }
    Ok(schedule)
}

async fn find_purchase<C>(db: &C, record_id: i64) -> Result<bazar_record::Model>
where
    C: ConnectionTrait,
{
    BazarRecord::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or(Error::RecordNotFound {
            kind: "bazar record",
            id: record_id,
        })
}

/// Records a grocery run. The record starts out pending approval.
#[instrument(skip(db, clock, actor, input), fields(member_id = input.member_id, total = %input.total_cost))]
pub async fn record_purchase(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    tenant_id: i64,
    input: NewPurchase,
) -> Result<bazar_record::Model> {
    reconcile_cost(&input.items, input.total_cost)?;

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let assignee = get_member(&txn, tenant_id, input.member_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordPurchase, &tenant, assignee.id)?;
    if !assignee.is_active() {
        return Err(Error::unauthorized(format!(
            "member {} is not an approved member",
            assignee.id
        )));
    }

    let record = bazar_record::ActiveModel {
        tenant_id: Set(tenant_id),
        member_id: Set(assignee.id),
        date: Set(input.date),
        items: Set(BazarItems(input.items)),
        total_cost: Set(input.total_cost.into()),
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
    debug!(record_id = record.id, "Bazar purchase recorded");
    Ok(record)
}

/// Approves a pending purchase so it counts toward the shopper's statement.
#[instrument(skip(db, clock, actor))]
pub async fn approve_purchase(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    record_id: i64,
) -> Result<bazar_record::Model> {
    let txn = db.begin().await?;
    let record = find_purchase(&txn, record_id).await?;
    let tenant = get_active_tenant(&txn, record.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::Approve, &tenant)?;

    let status = record.status.approve("bazar record", record_id)?;
    let mut active: bazar_record::ActiveModel = record.into();
    active.status = Set(status);
    active.approved_at = Set(Some(clock.now()));
    active.approved_by = Set(actor.person_id());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(record_id, "Bazar purchase approved");
    Ok(updated)
}

/// Declines a pending purchase.
#[instrument(skip(db, clock, actor))]
pub async fn reject_purchase(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    record_id: i64,
) -> Result<bazar_record::Model> {
    let txn = db.begin().await?;
    let record = find_purchase(&txn, record_id).await?;
    let tenant = get_active_tenant(&txn, record.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::Approve, &tenant)?;

    let status = record.status.reject("bazar record", record_id)?;
    let mut active: bazar_record::ActiveModel = record.into();
    active.status = Set(status);
    active.approved_at = Set(Some(clock.now()));
    active.approved_by = Set(actor.person_id());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Replaces the items and total of a purchase. Approved purchases need a manager.
#[instrument(skip(db, actor, items))]
pub async fn update_purchase(
    db: &DatabaseConnection,
    actor: &ActorContext,
    record_id: i64,
    items: Vec<BazarItem>,
    total_cost: Decimal,
    description: Option<String>,
) -> Result<bazar_record::Model> {
    reconcile_cost(&items, total_cost)?;

    let txn = db.begin().await?;
    let record = find_purchase(&txn, record_id).await?;
    let tenant = get_active_tenant(&txn, record.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordPurchase, &tenant, record.member_id)?;
    auth::require_mutable(
        actor,
        &tenant,
        record.status == ApprovalStatus::Approved,
        "bazar record",
        record_id,
    )?;

    let mut active: bazar_record::ActiveModel = record.into();
    active.items = Set(BazarItems(items));
    active.total_cost = Set(total_cost.into());
    active.description = Set(description);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a purchase. Approved purchases need a manager.
#[instrument(skip(db, actor))]
pub async fn delete_purchase(
    db: &DatabaseConnection,
    actor: &ActorContext,
    record_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let record = find_purchase(&txn, record_id).await?;
    let tenant = get_active_tenant(&txn, record.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::RecordPurchase, &tenant, record.member_id)?;
    auth::require_mutable(
        actor,
        &tenant,
        record.status == ApprovalStatus::Approved,
        "bazar record",
        record_id,
    )?;

    BazarRecord::delete_by_id(record_id).exec(&txn).await?;
    txn.commit().await?;
    info!(record_id, "Bazar purchase deleted");
    Ok(())
}

/// Approved purchases of a mess between `from` and `until` inclusive.
pub async fn approved_purchases_in_range<C>(
    db: &C,
    tenant_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<bazar_record::Model>>
where
    C: ConnectionTrait,
{
    BazarRecord::find()
        .filter(bazar_record::Column::TenantId.eq(tenant_id))
        .filter(bazar_record::Column::Status.eq(ApprovalStatus::Approved))
        .filter(bazar_record::Column::Date.between(from, until))
        .order_by_asc(bazar_record::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}
