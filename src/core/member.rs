//! Membership lifecycle - join requests, approval, roles and leaving.
//!
//! A person holds at most one approved membership per mess. The manager's membership
//! can never be removed or demoted.

use crate::{
    core::{
        auth::{self, Action, ActorContext},
        clock::Clock,
        tenant::get_active_tenant,
    },
    entities::{Member, MemberRole, MemberStatus, Money, member, tenant},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Finds a member of the given mess.
pub async fn get_member<C>(db: &C, tenant_id: i64, member_id: i64) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    Member::find_by_id(member_id)
        .one(db)
        .await?
        .filter(|m| m.tenant_id == tenant_id)
        .ok_or(Error::MemberNotFound { id: member_id })
}

/// Finds a member by id regardless of mess; the caller checks the mess afterwards.
pub(crate) async fn find_member<C>(db: &C, member_id: i64) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    Member::find_by_id(member_id)
        .one(db)
        .await?
        .ok_or(Error::MemberNotFound { id: member_id })
}

/// Every membership of a mess in stable rotation order: join date, then id.
pub async fn members_in_join_order<C>(db: &C, tenant_id: i64) -> Result<Vec<member::Model>>
where
    C: ConnectionTrait,
{
    Member::find()
        .filter(member::Column::TenantId.eq(tenant_id))
        .order_by_asc(member::Column::JoinedAt)
        .order_by_asc(member::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Approved memberships of a mess in join order.
pub async fn approved_members<C>(db: &C, tenant_id: i64) -> Result<Vec<member::Model>>
where
    C: ConnectionTrait,
{
    Member::find()
        .filter(member::Column::TenantId.eq(tenant_id))
        .filter(member::Column::Status.eq(MemberStatus::Approved))
        .order_by_asc(member::Column::JoinedAt)
        .order_by_asc(member::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn ensure_no_open_membership<C>(db: &C, tenant_id: i64, person_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = Member::find()
        .filter(member::Column::TenantId.eq(tenant_id))
        .filter(member::Column::PersonId.eq(person_id))
        .filter(member::Column::Status.is_in([MemberStatus::Pending, MemberStatus::Approved]))
        .one(db)
        .await?;
    match existing {
        Some(m) => Err(Error::DuplicateEntry {
            kind: "membership",
            detail: format!("person {person_id} already {} in mess {tenant_id}", m.status.as_str()),
        }),
        None => Ok(()),
    }
}

async fn ensure_capacity<C>(db: &C, tenant: &tenant::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(max) = tenant.max_members else {
        return Ok(());
    };
    let approved = Member::find()
        .filter(member::Column::TenantId.eq(tenant.id))
        .filter(member::Column::Status.eq(MemberStatus::Approved))
        .count(db)
        .await?;
    if approved >= u64::try_from(max).unwrap_or(0) {
        return Err(Error::invalid(format!(
            "mess {} is full ({max} members)",
            tenant.id
        )));
    }
    Ok(())
}

/// A person asks to join a mess. The membership starts out pending.
#[instrument(skip(db, clock))]
pub async fn request_membership(
    db: &DatabaseConnection,
    clock: &impl Clock,
    tenant_id: i64,
    person_id: i64,
    room_number: Option<String>,
) -> Result<member::Model> {
    let txn = db.begin().await?;
    get_active_tenant(&txn, tenant_id).await?;
    ensure_no_open_membership(&txn, tenant_id, person_id).await?;

    let membership = member::ActiveModel {
        tenant_id: Set(tenant_id),
        person_id: Set(person_id),
        role: Set(MemberRole::Member),
        status: Set(MemberStatus::Pending),
        room_number: Set(room_number),
        monthly_fixed_cost: Set(None),
        deposit_amount: Set(Money::ZERO),
        joined_at: Set(clock.now()),
        left_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(member_id = membership.id, "Membership requested");
    Ok(membership)
}

/// A manager adds a person directly as an approved member.
#[instrument(skip(db, clock, actor))]
pub async fn add_member(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    tenant_id: i64,
    person_id: i64,
    role: MemberRole,
) -> Result<member::Model> {
    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageMembers, &tenant)?;
    ensure_no_open_membership(&txn, tenant_id, person_id).await?;
    ensure_capacity(&txn, &tenant).await?;

    let membership = member::ActiveModel {
        tenant_id: Set(tenant_id),
        person_id: Set(person_id),
        role: Set(role),
        status: Set(MemberStatus::Approved),
        room_number: Set(None),
        monthly_fixed_cost: Set(None),
        deposit_amount: Set(Money::ZERO),
        joined_at: Set(clock.now()),
        left_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(member_id = membership.id, "Member added");
    Ok(membership)
}

/// Approves a pending join request. The join date becomes the approval instant.
#[instrument(skip(db, clock, actor))]
pub async fn approve_member(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    member_id: i64,
) -> Result<member::Model> {
    let txn = db.begin().await?;
    let membership = find_member(&txn, member_id).await?;
    let tenant = get_active_tenant(&txn, membership.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageMembers, &tenant)?;

    let status = membership.status.approve(member_id)?;
    ensure_capacity(&txn, &tenant).await?;

    let mut active: member::ActiveModel = membership.into();
    active.status = Set(status);
    active.joined_at = Set(clock.now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(member_id, "Member approved");
    Ok(updated)
}

/// Declines a pending join request.
#[instrument(skip(db, actor))]
pub async fn reject_member(
    db: &DatabaseConnection,
    actor: &ActorContext,
    member_id: i64,
) -> Result<member::Model> {
    let txn = db.begin().await?;
    let membership = find_member(&txn, member_id).await?;
    let tenant = get_active_tenant(&txn, membership.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageMembers, &tenant)?;

    let status = membership.status.reject()?;
    let mut active: member::ActiveModel = membership.into();
    active.status = Set(status);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Ends a membership. Members may leave on their own; managers may remove anyone
/// except themselves.
#[instrument(skip(db, clock, actor))]
pub async fn leave_member(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    member_id: i64,
) -> Result<member::Model> {
    let txn = db.begin().await?;
    let membership = find_member(&txn, member_id).await?;
    let tenant = get_active_tenant(&txn, membership.tenant_id).await?;

    if membership.person_id == tenant.manager_person_id {
        return Err(Error::Immutable {
            kind: "manager membership",
            id: member_id,
        });
    }
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    if actor.member_id() != Some(member_id) {
        auth::require(actor, Action::ManageMembers, &tenant)?;
    }

    let status = membership.status.leave()?;
    let mut active: member::ActiveModel = membership.into();
    active.status = Set(status);
    active.left_at = Set(Some(clock.now()));
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(member_id, "Member left");
    Ok(updated)
}

/// Changes the role of an approved member. The manager always stays admin.
#[instrument(skip(db, actor))]
pub async fn set_role(
    db: &DatabaseConnection,
    actor: &ActorContext,
    member_id: i64,
    role: MemberRole,
) -> Result<member::Model> {
    let txn = db.begin().await?;
    let membership = find_member(&txn, member_id).await?;
    let tenant = get_active_tenant(&txn, membership.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageMembers, &tenant)?;

    if membership.person_id == tenant.manager_person_id && role != MemberRole::Admin {
        return Err(Error::Immutable {
            kind: "manager membership",
            id: member_id,
        });
    }
    if !membership.is_active() {
        return Err(Error::InvalidTransition {
            kind: "member",
            from: membership.status.as_str().to_string(),
            to: "role change".to_string(),
        });
    }

    let mut active: member::ActiveModel = membership.into();
    active.role = Set(role);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Sets the deposit and optional fixed monthly cost of a member.
#[instrument(skip(db, actor))]
pub async fn update_billing_terms(
    db: &DatabaseConnection,
    actor: &ActorContext,
    member_id: i64,
    deposit_amount: Decimal,
    monthly_fixed_cost: Option<Decimal>,
) -> Result<member::Model> {
    if deposit_amount < Decimal::ZERO || monthly_fixed_cost.is_some_and(|c| c < Decimal::ZERO) {
        return Err(Error::invalid("deposit and fixed cost must not be negative"));
    }

    let txn = db.begin().await?;
    let membership = find_member(&txn, member_id).await?;
    let tenant = get_active_tenant(&txn, membership.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageMembers, &tenant)?;

    let mut active: member::ActiveModel = membership.into();
    active.deposit_amount = Set(deposit_amount.into());
    active.monthly_fixed_cost = Set(monthly_fixed_cost.map(Money));
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}
