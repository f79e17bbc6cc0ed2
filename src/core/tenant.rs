//! Mess lifecycle - creation, settings and soft deletion.
//!
//! Creating a mess also creates the manager's admin membership in the same transaction.

use crate::{
    core::{
        auth::{self, Action, ActorContext},
        clock::Clock,
        rates::RateTable,
    },
    entities::{
        Member, MemberRole, MemberStatus, Money, PaymentCycle, Tenant, member, tenant,
    },
    errors::{Error, Result},
};
use chrono::NaiveTime;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Fields required to create a mess.
#[derive(Debug, Clone)]
pub struct NewTenant {
    /// Display name
    pub name: String,
    /// Meal prices
    pub rates: RateTable,
    /// Local cutoff for same-day meal entry
    pub meal_cutoff_time: NaiveTime,
    /// Local clock offset from UTC in minutes
    pub utc_offset_minutes: i32,
    /// Rotate bazar duty automatically
    pub auto_bazar_rotation: bool,
    /// Optional member cap
    pub max_members: Option<i32>,
    /// Billing cadence
    pub payment_cycle: PaymentCycle,
}

/// Editable mess settings.
#[derive(Debug, Clone)]
pub struct TenantSettings {
    /// Local cutoff for same-day meal entry
    pub meal_cutoff_time: NaiveTime,
    /// Rotate bazar duty automatically
    pub auto_bazar_rotation: bool,
    /// Optional member cap
    pub max_members: Option<i32>,
    /// Billing cadence
    pub payment_cycle: PaymentCycle,
}

fn validate_max_members(max_members: Option<i32>) -> Result<()> {
    match max_members {
        Some(max) if max < 1 => Err(Error::invalid("max_members must be at least 1")),
        _ => Ok(()),
    }
}

/// Finds a mess that exists and is not soft-deleted.
pub async fn get_active_tenant<C>(db: &C, tenant_id: i64) -> Result<tenant::Model>
where
    C: ConnectionTrait,
{
    Tenant::find_by_id(tenant_id)
        .one(db)
        .await?
        .filter(|t| !t.is_deleted)
        .ok_or(Error::TenantNotFound { id: tenant_id })
}

/// All messes that are not soft-deleted, by id.
pub async fn list_active_tenants(db: &DatabaseConnection) -> Result<Vec<tenant::Model>> {
    Tenant::find()
        .filter(tenant::Column::IsDeleted.eq(false))
        .order_by_asc(tenant::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a mess managed by `manager_person_id`, together with the manager's
/// approved admin membership.
#[instrument(skip(db, clock, input), fields(name = %input.name))]
pub async fn create_tenant(
    db: &DatabaseConnection,
    clock: &impl Clock,
    manager_person_id: i64,
    input: NewTenant,
) -> Result<(tenant::Model, member::Model)> {
    if input.name.trim().is_empty() {
        return Err(Error::invalid("mess name cannot be empty"));
    }
    input.rates.validate()?;
    validate_max_members(input.max_members)?;

    let now = clock.now();
    let txn = db.begin().await?;

    let tenant = tenant::ActiveModel {
        name: Set(input.name.trim().to_string()),
        breakfast_rate: Set(input.rates.breakfast.into()),
        lunch_rate: Set(input.rates.lunch.into()),
        dinner_rate: Set(input.rates.dinner.into()),
        meal_cutoff_time: Set(input.meal_cutoff_time),
        utc_offset_minutes: Set(input.utc_offset_minutes),
        auto_bazar_rotation: Set(input.auto_bazar_rotation),
        max_members: Set(input.max_members),
        payment_cycle: Set(input.payment_cycle),
        manager_person_id: Set(manager_person_id),
        is_deleted: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let manager = member::ActiveModel {
        tenant_id: Set(tenant.id),
        person_id: Set(manager_person_id),
        role: Set(MemberRole::Admin),
        status: Set(MemberStatus::Approved),
        room_number: Set(None),
        monthly_fixed_cost: Set(None),
        deposit_amount: Set(Money::ZERO),
        joined_at: Set(now),
        left_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(tenant_id = tenant.id, "Mess created");
    Ok((tenant, manager))
}

/// Updates cutoff, rotation, capacity and billing cadence.
#[instrument(skip(db, actor, settings))]
pub async fn update_settings(
    db: &DatabaseConnection,
    actor: &ActorContext,
    tenant_id: i64,
    settings: TenantSettings,
) -> Result<tenant::Model> {
    validate_max_members(settings.max_members)?;

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageTenant, &tenant)?;

    let mut active: tenant::ActiveModel = tenant.into();
    active.meal_cutoff_time = Set(settings.meal_cutoff_time);
    active.auto_bazar_rotation = Set(settings.auto_bazar_rotation);
    active.max_members = Set(settings.max_members);
    active.payment_cycle = Set(settings.payment_cycle);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Soft-deletes a mess. Only its manager may do this, and only once every other
/// member has left; the manager's own membership never counts as blocking.
#[instrument(skip(db, actor))]
pub async fn soft_delete_tenant(
    db: &DatabaseConnection,
    actor: &ActorContext,
    tenant_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    if !actor.is_manager_of(&tenant) {
        return Err(Error::unauthorized("only the mess manager can delete the mess"));
    }

    let active_others = Member::find()
        .filter(member::Column::TenantId.eq(tenant_id))
        .filter(member::Column::Status.eq(MemberStatus::Approved))
        .filter(member::Column::PersonId.ne(tenant.manager_person_id))
        .count(&txn)
        .await?;
    if active_others > 0 {
        return Err(Error::invalid(format!(
            "mess still has {active_others} active members"
        )));
    }

    let mut active: tenant::ActiveModel = tenant.into();
    active.is_deleted = Set(true);
    active.update(&txn).await?;

    txn.commit().await?;
    info!(tenant_id, "Mess soft-deleted");
    Ok(())
}
