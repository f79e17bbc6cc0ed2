//! Rate table - Per-meal prices and expense-category rates of a mess.
//!
//! Lookups are side-effect free. Rate changes go through [`update_rates`], which only a
//! manager may call and which refuses negative prices.

use crate::{
    core::auth::{self, Action, ActorContext},
    core::tenant::get_active_tenant,
    entities::{ExpenseCategory, MealType, expense_category, tenant},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Prices of the three meals for one mess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateTable {
    /// Price of one breakfast
    pub breakfast: Decimal,
    /// Price of one lunch
    pub lunch: Decimal,
    /// Price of one dinner
    pub dinner: Decimal,
}

impl RateTable {
    /// Reads the rates stored on a mess.
    #[must_use]
    pub const fn from_tenant(tenant: &tenant::Model) -> Self {
        Self {
            breakfast: tenant.breakfast_rate.0,
            lunch: tenant.lunch_rate.0,
            dinner: tenant.dinner_rate.0,
        }
    }

    /// Price of one meal of the given type.
    #[must_use]
    pub const fn rate_for(&self, meal_type: MealType) -> Decimal {
        match meal_type {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
        }
    }

    /// Cost of the given meal counts, unrounded.
    #[must_use]
    pub fn meal_cost(&self, breakfast: i32, lunch: i32, dinner: i32) -> Decimal {
        Decimal::from(breakfast) * self.breakfast
            + Decimal::from(lunch) * self.lunch
            + Decimal::from(dinner) * self.dinner
    }

    /// Fails with [`Error::InvalidInput`] if any rate is negative.
    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("breakfast", self.breakfast),
            ("lunch", self.lunch),
            ("dinner", self.dinner),
        ] {
            if rate < Decimal::ZERO {
                return Err(Error::invalid(format!("{name} rate must not be negative")));
            }
        }
        Ok(())
    }
}

/// Loads the rate table of an active mess.
pub async fn load_rate_table<C>(db: &C, tenant_id: i64) -> Result<RateTable>
where
    C: ConnectionTrait,
{
    let tenant = get_active_tenant(db, tenant_id).await?;
    Ok(RateTable::from_tenant(&tenant))
}

/// Price of one meal of `meal_type` in the mess.
pub async fn rate_for<C>(db: &C, tenant_id: i64, meal_type: MealType) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    Ok(load_rate_table(db, tenant_id).await?.rate_for(meal_type))
}

/// Rates of every expense category of the mess, keyed by category id.
pub async fn category_rates<C>(db: &C, tenant_id: i64) -> Result<BTreeMap<i64, Decimal>>
where
    C: ConnectionTrait,
{
    get_active_tenant(db, tenant_id).await?;
    let categories = ExpenseCategory::find()
        .filter(expense_category::Column::TenantId.eq(tenant_id))
        .order_by_asc(expense_category::Column::Id)
        .all(db)
        .await?;
    Ok(categories.into_iter().map(|c| (c.id, c.rate.0)).collect())
}

/// Replaces the meal prices of a mess.
#[instrument(skip(db, actor))]
pub async fn update_rates(
    db: &DatabaseConnection,
    actor: &ActorContext,
    tenant_id: i64,
    rates: RateTable,
) -> Result<tenant::Model> {
    rates.validate()?;

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageTenant, &tenant)?;

    let mut active: tenant::ActiveModel = tenant.into();
    active.breakfast_rate = Set(rates.breakfast.into());
    active.lunch_rate = Set(rates.lunch.into());
    active.dinner_rate = Set(rates.dinner.into());
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(tenant_id, "Meal rates updated");
    Ok(updated)
}

/// Adds an expense category to a mess.
#[instrument(skip(db, actor))]
pub async fn create_category(
    db: &DatabaseConnection,
    actor: &ActorContext,
    tenant_id: i64,
    name: String,
    rate: Decimal,
) -> Result<expense_category::Model> {
    if name.trim().is_empty() {
        return Err(Error::invalid("category name cannot be empty"));
    }
    if rate < Decimal::ZERO {
        return Err(Error::invalid("category rate must not be negative"));
    }

    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::ManageTenant, &tenant)?;

    let duplicate = ExpenseCategory::find()
        .filter(expense_category::Column::TenantId.eq(tenant_id))
        .filter(expense_category::Column::Name.eq(name.trim()))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(Error::DuplicateEntry {
            kind: "expense category",
            detail: name.trim().to_string(),
        });
    }

    let category = expense_category::ActiveModel {
        tenant_id: Set(tenant_id),
        name: Set(name.trim().to_string()),
        rate: Set(rate.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(category)
}
