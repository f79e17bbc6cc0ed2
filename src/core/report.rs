//! Report aggregation.
//!
//! Every report here is the same shape: load records, group them by a key, reduce each
//! group. [`group_reduce`] is that one primitive; the functions below only choose the
//! records, the key and the reducer.

use crate::{
    config::database::retry_read,
    core::{
        bazar::approved_purchases_in_range,
        bill::{compute_tenant_statements, month_bounds},
        expense::approved_expenses_in_range,
        meal::meals_in_range,
        member::approved_members,
        payment::completed_payments_in_range,
        tenant::get_active_tenant,
    },
    entities::{
        ApprovalStatus, BazarRecord, ExpenseRecord, PaymentRecord, PaymentStatus, bazar_record,
        expense_record, payment_record,
    },
    errors::Result,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Groups `items` by `key` and folds each group into an accumulator with `reduce`.
///
/// Groups come back ordered by key.
pub fn group_reduce<'a, T, K, A>(
    items: impl IntoIterator<Item = &'a T>,
    key: impl Fn(&T) -> K,
    reduce: impl Fn(&mut A, &T),
) -> BTreeMap<K, A>
where
    T: 'a,
    K: Ord,
    A: Default,
{
    let mut groups = BTreeMap::new();
    for item in items {
        reduce(groups.entry(key(item)).or_default(), item);
    }
    groups
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    /// Calendar year
    pub year: i32,
    /// Calendar month, 1..=12
    pub month: u32,
}

impl MonthKey {
    /// Month a date falls in.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month before this one.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Approved expense totals for the `months` months ending with `year`/`month`, oldest
/// first. Months without expenses are reported as zero.
pub async fn expense_trend<C>(
    db: &C,
    tenant_id: i64,
    year: i32,
    month: u32,
    months: u32,
) -> Result<Vec<(MonthKey, Decimal)>>
where
    C: ConnectionTrait,
{
    let (_, until) = month_bounds(year, month)?;
    let mut keys = Vec::new();
    let mut key = MonthKey { year, month };
    for _ in 0..months.max(1) {
        keys.push(key);
        key = key.previous();
    }
    keys.reverse();
    let start = keys[0];
    let (from, _) = month_bounds(start.year, start.month)?;

    get_active_tenant(db, tenant_id).await?;
    let expenses = approved_expenses_in_range(db, tenant_id, from, until).await?;
    let totals = group_reduce(
        &expenses,
        |e| MonthKey::of(e.date),
        |sum: &mut Decimal, e| *sum += e.amount.0,
    );

    Ok(keys
        .into_iter()
        .map(|key| (key, totals.get(&key).copied().unwrap_or_default()))
        .collect())
}

/// Approved bazar spending per shopper for a month.
pub async fn bazar_cost_by_member<C>(
    db: &C,
    tenant_id: i64,
    year: i32,
    month: u32,
) -> Result<BTreeMap<i64, Decimal>>
where
    C: ConnectionTrait,
{
    let (from, until) = month_bounds(year, month)?;
    get_active_tenant(db, tenant_id).await?;
    let purchases = approved_purchases_in_range(db, tenant_id, from, until).await?;
    Ok(group_reduce(
        &purchases,
        |p| p.member_id,
        |sum: &mut Decimal, p| *sum += p.total_cost.0,
    ))
}

/// Approved expenses per category for a month.
pub async fn expense_by_category<C>(
    db: &C,
    tenant_id: i64,
    year: i32,
    month: u32,
) -> Result<BTreeMap<i64, Decimal>>
where
    C: ConnectionTrait,
{
    let (from, until) = month_bounds(year, month)?;
    get_active_tenant(db, tenant_id).await?;
    let expenses = approved_expenses_in_range(db, tenant_id, from, until).await?;
    Ok(group_reduce(
        &expenses,
        |e| e.category_id,
        |sum: &mut Decimal, e| *sum += e.amount.0,
    ))
}

/// Meals served per day of a month. Days without entries are absent.
pub async fn meals_by_date<C>(
    db: &C,
    tenant_id: i64,
    year: i32,
    month: u32,
) -> Result<BTreeMap<NaiveDate, i64>>
where
    C: ConnectionTrait,
{
    let (from, until) = month_bounds(year, month)?;
    get_active_tenant(db, tenant_id).await?;
    let entries = meals_in_range(db, tenant_id, from, until).await?;
    Ok(group_reduce(
        &entries,
        |e| e.date,
        |count: &mut i64, e| *count += i64::from(e.total_meals()),
    ))
}

/// Due amount of every billable member for a month.
pub async fn due_by_member<C>(
    db: &C,
    tenant_id: i64,
    year: i32,
    month: u32,
) -> Result<BTreeMap<i64, Decimal>>
where
    C: ConnectionTrait,
{
    let statements = compute_tenant_statements(db, tenant_id, year, month).await?;
    Ok(group_reduce(
        &statements,
        |s| s.member_id,
        |due: &mut Decimal, s| *due += s.due_amount,
    ))
}

/// Headline numbers of a mess for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantDashboard {
    /// Mess
    pub tenant_id: i64,
    /// Reported month
    pub period: MonthKey,
    /// Approved members right now
    pub active_members: usize,
    /// Meals eaten in the month
    pub total_meals: i64,
    /// Approved bazar spending
    pub bazar_total: Decimal,
    /// Approved expenses
    pub expense_total: Decimal,
    /// Completed payments
    pub payments_total: Decimal,
    /// Sum of positive dues
    pub outstanding_due: Decimal,
    /// Bazar records, expenses and payments waiting for a manager
    pub pending_approvals: u64,
}

async fn pending_approvals<C>(db: &C, tenant_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let bazar = BazarRecord::find()
        .filter(bazar_record::Column::TenantId.eq(tenant_id))
        .filter(bazar_record::Column::Status.eq(ApprovalStatus::Pending))
        .count(db)
        .await?;
    let expenses = ExpenseRecord::find()
        .filter(expense_record::Column::TenantId.eq(tenant_id))
        .filter(expense_record::Column::Status.eq(ApprovalStatus::Pending))
        .count(db)
        .await?;
    let payments = PaymentRecord::find()
        .filter(payment_record::Column::TenantId.eq(tenant_id))
        .filter(payment_record::Column::Status.eq(PaymentStatus::Pending))
        .count(db)
        .await?;
    Ok(bazar + expenses + payments)
}

async fn build_dashboard<C>(db: &C, tenant_id: i64, year: i32, month: u32) -> Result<TenantDashboard>
where
    C: ConnectionTrait,
{
    let (from, until) = month_bounds(year, month)?;
    get_active_tenant(db, tenant_id).await?;

    let active_members = approved_members(db, tenant_id).await?.len();
    let meals = meals_by_date(db, tenant_id, year, month).await?;
    let bazar = approved_purchases_in_range(db, tenant_id, from, until).await?;
    let expenses = approved_expenses_in_range(db, tenant_id, from, until).await?;
    let payments = completed_payments_in_range(db, tenant_id, from, until).await?;
    let dues = due_by_member(db, tenant_id, year, month).await?;

    Ok(TenantDashboard {
        tenant_id,
        period: MonthKey { year, month },
        active_members,
        total_meals: meals.values().sum(),
        bazar_total: bazar.iter().map(|b| b.total_cost.0).sum(),
        expense_total: expenses.iter().map(|e| e.amount.0).sum(),
        payments_total: payments.iter().map(|p| p.amount.0).sum(),
        outstanding_due: dues.values().filter(|d| d.is_sign_positive()).sum(),
        pending_approvals: pending_approvals(db, tenant_id).await?,
    })
}

/// Dashboard summary for a month. Retries up to `read_attempts` times when the pool
/// has no connection to hand out.
pub async fn tenant_dashboard(
    db: &DatabaseConnection,
    tenant_id: i64,
    year: i32,
    month: u32,
    read_attempts: u32,
) -> Result<TenantDashboard> {
    retry_read(read_attempts, || build_dashboard(db, tenant_id, year, month)).await
}
