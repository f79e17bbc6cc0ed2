//! Monthly bill calculation.
//!
//! A member's statement for a month is
//!
//! ```text
//! due = meal cost + approved bazar purchases + approved expenses - completed payments
//! ```
//!
//! Everything is summed unrounded and rounded to two places only when the statement is
//! built. A negative due means the member has paid ahead.

use crate::{
    core::{
        bazar::approved_purchases_in_range,
        expense::approved_expenses_in_range,
        meal::meals_in_range,
        member::{get_member, members_in_join_order},
        notify::{Notification, Notifier},
        payment::completed_payments_in_range,
        rates::RateTable,
        tenant::get_active_tenant,
    },
    entities::{
        MemberStatus, bazar_record, expense_record, meal_entry, member, payment_record,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::{debug, instrument};

/// One member's bill for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyStatement {
    /// Mess
    pub tenant_id: i64,
    /// Billed member
    pub member_id: i64,
    /// Calendar year
    pub year: i32,
    /// Calendar month, 1..=12
    pub month: u32,
    /// Breakfasts, lunches and dinners eaten
    pub total_meals: i64,
    /// Meals at the mess rates plus extras
    pub meal_cost: Decimal,
    /// Approved bazar purchases the member made
    pub bazar_cost_assigned: Decimal,
    /// Approved expenses charged to the member
    pub expense_share: Decimal,
    /// Completed payments
    pub payments_total: Decimal,
    /// What the member still owes; negative when paid ahead
    pub due_amount: Decimal,
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || Error::invalid(format!("invalid month {year}-{month:02}"));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;
    Ok((first, last))
}

/// Cost of a set of meal entries, extras included, unrounded.
#[must_use]
pub fn meal_cost(entries: &[meal_entry::Model], rates: &RateTable) -> Decimal {
    entries
        .iter()
        .map(|e| rates.meal_cost(e.breakfast, e.lunch, e.dinner) + e.extra_items.total())
        .sum()
}

/// Rounds to whole cents and always carries two decimal places, so `0.4` becomes `0.40`.
fn to_cents(amount: Decimal) -> Decimal {
    let mut cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    cents
}

/// Every billable record of a mess for one month.
struct MonthRecords {
    entries: Vec<meal_entry::Model>,
    purchases: Vec<bazar_record::Model>,
    expenses: Vec<expense_record::Model>,
    payments: Vec<payment_record::Model>,
}

impl MonthRecords {
    async fn load<C>(db: &C, tenant_id: i64, from: NaiveDate, until: NaiveDate) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        Ok(Self {
            entries: meals_in_range(db, tenant_id, from, until).await?,
            purchases: approved_purchases_in_range(db, tenant_id, from, until).await?,
            expenses: approved_expenses_in_range(db, tenant_id, from, until).await?,
            payments: completed_payments_in_range(db, tenant_id, from, until).await?,
        })
    }

    fn statement_for(
        &self,
        rates: &RateTable,
        tenant_id: i64,
        member_id: i64,
        year: i32,
        month: u32,
    ) -> MonthlyStatement {
        let entries: Vec<meal_entry::Model> = self
            .entries
            .iter()
            .filter(|e| e.member_id == member_id)
            .cloned()
            .collect();
        let total_meals = entries.iter().map(|e| i64::from(e.total_meals())).sum();
        let meals = meal_cost(&entries, rates);
        let bazar: Decimal = self
            .purchases
            .iter()
            .filter(|p| p.member_id == member_id)
            .map(|p| p.total_cost.0)
            .sum();
        let expenses: Decimal = self
            .expenses
            .iter()
            .filter(|e| e.member_id == member_id)
            .map(|e| e.amount.0)
            .sum();
        let payments: Decimal = self
            .payments
            .iter()
            .filter(|p| p.member_id == member_id)
            .map(|p| p.amount.0)
            .sum();

        MonthlyStatement {
            tenant_id,
            member_id,
            year,
            month,
            total_meals,
            meal_cost: to_cents(meals),
            bazar_cost_assigned: to_cents(bazar),
            expense_share: to_cents(expenses),
            payments_total: to_cents(payments),
            due_amount: to_cents(meals + bazar + expenses - payments),
        }
    }
}

/// Computes one member's statement. Read-only.
pub async fn compute_monthly_statement<C>(
    db: &C,
    tenant_id: i64,
    member_id: i64,
    year: i32,
    month: u32,
) -> Result<MonthlyStatement>
where
    C: ConnectionTrait,
{
    let (from, until) = month_bounds(year, month)?;
    let tenant = get_active_tenant(db, tenant_id).await?;
    let member = get_member(db, tenant_id, member_id).await?;
    let records = MonthRecords::load(db, tenant_id, from, until).await?;
    Ok(records.statement_for(&RateTable::from_tenant(&tenant), tenant_id, member.id, year, month))
}

fn billable_in(member: &member::Model, from: NaiveDate) -> bool {
    match member.status {
        MemberStatus::Approved => true,
        MemberStatus::Left => member.left_at.is_some_and(|left| left.date_naive() >= from),
        MemberStatus::Pending | MemberStatus::Rejected => false,
    }
}

/// Statements of every member billable in the month: approved members plus those who
/// left during or after it.
pub async fn compute_tenant_statements<C>(
    db: &C,
    tenant_id: i64,
    year: i32,
    month: u32,
) -> Result<Vec<MonthlyStatement>>
where
    C: ConnectionTrait,
{
    let (from, until) = month_bounds(year, month)?;
    let tenant = get_active_tenant(db, tenant_id).await?;
    let rates = RateTable::from_tenant(&tenant);
    let members = members_in_join_order(db, tenant_id).await?;
    let records = MonthRecords::load(db, tenant_id, from, until).await?;

    Ok(members
        .iter()
        .filter(|m| billable_in(m, from))
        .map(|m| records.statement_for(&rates, tenant_id, m.id, year, month))
        .collect())
}

/// Computes every statement of the month and announces each one.
#[instrument(skip(db, notifier))]
pub async fn issue_monthly_statements<C>(
    db: &C,
    notifier: &impl Notifier,
    tenant_id: i64,
    year: i32,
    month: u32,
) -> Result<Vec<MonthlyStatement>>
where
    C: ConnectionTrait,
{
    let statements = compute_tenant_statements(db, tenant_id, year, month).await?;
    for statement in &statements {
        notifier.notify(Notification::BillReady {
            tenant_id,
            statement: statement.clone(),
        });
    }
    debug!(count = statements.len(), "Monthly statements issued");
    Ok(statements)
}

/// One-line summary, e.g. for a push notification.
#[must_use]
pub fn format_statement_summary(statement: &MonthlyStatement) -> String {
    format!(
        "{}-{:02}: {} meals, meals {:.2} + bazar {:.2} + expenses {:.2} - paid {:.2} = due {:.2}",
        statement.year,
        statement.month,
        statement.total_meals,
        statement.meal_cost,
        statement.bazar_cost_assigned,
        statement.expense_share,
        statement.payments_total,
        statement.due_amount,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        bazar::{self, NewPurchase},
        expense::{self, NewExpense},
        meal::{MealCounts, NewMealEntry, record_meal},
        payment::{self, NewPayment},
        rates::create_category,
    };
    use crate::entities::{PaymentMethod, bazar_record::BazarItem};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds(2024, 2).unwrap(),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert_eq!(
            month_bounds(2024, 12).unwrap(),
            (date(2024, 12, 1), date(2024, 12, 31))
        );
        assert!(matches!(month_bounds(2024, 13), Err(Error::InvalidInput { .. })));
        assert!(matches!(month_bounds(2024, 0), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_rounding_happens_once() {
        // summing before rounding keeps the whole amount
        let third = dec!(10) / dec!(3);
        assert_eq!(to_cents(third * dec!(3)), dec!(10.00));
        assert_eq!(to_cents(dec!(0.125)), dec!(0.13));
        assert_eq!(to_cents(dec!(-0.125)), dec!(-0.13));
    }

    #[test]
    fn test_cents_always_carry_two_places() {
        assert_eq!(to_cents(dec!(0.4)).to_string(), "0.40");
        assert_eq!(to_cents(Decimal::ZERO).to_string(), "0.00");
        assert_eq!(to_cents(dec!(230)).to_string(), "230.00");
        assert_eq!(to_cents(dec!(1.005)).to_string(), "1.01");
    }

    #[tokio::test]
    async fn test_all_zero_statement() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;

        let statement = compute_monthly_statement(&db, tenant.id, alice.id, 2024, 6).await?;
        assert_eq!(statement.total_meals, 0);
        assert_eq!(statement.meal_cost, Decimal::ZERO);
        assert_eq!(statement.bazar_cost_assigned, Decimal::ZERO);
        assert_eq!(statement.expense_share, Decimal::ZERO);
        assert_eq!(statement.payments_total, Decimal::ZERO);
        assert_eq!(statement.due_amount, Decimal::ZERO);
        assert_eq!(statement.due_amount.to_string(), "0.00");
        assert_eq!(statement.expense_share.to_string(), "0.00");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_member_and_tenant() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        assert!(matches!(
            compute_monthly_statement(&db, tenant.id, 999, 2024, 6).await,
            Err(Error::MemberNotFound { id: 999 })
        ));
        assert!(matches!(
            compute_monthly_statement(&db, 999, 1, 2024, 6).await,
            Err(Error::TenantNotFound { id: 999 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_statement_scenario() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let clock = test_clock();
        let alice = add_approved_member(&db, &tenant, 501).await?;

        // 1 breakfast + 1 lunch + 1 dinner at 30/50/50
        record_meal(
            &db,
            &clock,
            &manager,
            tenant.id,
            NewMealEntry {
                member_id: alice.id,
                date: date(2024, 6, 1),
                counts: MealCounts::new(1, 1, 1),
                extra_items: Vec::new(),
            },
        )
        .await?;

        let purchase = bazar::record_purchase(
            &db,
            &clock,
            &manager,
            tenant.id,
            NewPurchase {
                member_id: alice.id,
                date: date(2024, 6, 2),
                items: vec![BazarItem {
                    name: "rice".into(),
                    quantity: dec!(10),
                    unit: "kg".into(),
                    unit_price: dec!(50),
                }],
                total_cost: dec!(500),
                description: None,
            },
        )
        .await?;
        bazar::approve_purchase(&db, &clock, &manager, purchase.id).await?;
        // pending purchases are not billed
        bazar::record_purchase(
            &db,
            &clock,
            &manager,
            tenant.id,
            NewPurchase {
                member_id: alice.id,
                date: date(2024, 6, 9),
                items: vec![BazarItem {
                    name: "oil".into(),
                    quantity: dec!(1),
                    unit: "l".into(),
                    unit_price: dec!(180),
                }],
                total_cost: dec!(180),
                description: None,
            },
        )
        .await?;

        let gas = create_category(&db, &manager, tenant.id, "gas".into(), dec!(200)).await?;
        let expense = expense::record_expense(
            &db,
            &clock,
            &manager,
            tenant.id,
            NewExpense {
                member_id: alice.id,
                category_id: gas.id,
                date: date(2024, 6, 3),
                amount: dec!(200),
                description: None,
            },
        )
        .await?;
        expense::approve_expense(&db, &clock, &manager, expense.id).await?;

        for (paid_on, amount) in [(date(2024, 6, 10), dec!(600)), (date(2023, 6, 10), dec!(75))] {
            let payment = payment::record_payment(
                &db,
                &clock,
                &manager,
                tenant.id,
                NewPayment {
                    member_id: alice.id,
                    date: paid_on,
                    amount,
                    method: PaymentMethod::Cash,
                    reference: None,
                },
            )
            .await?;
            payment::complete_payment(&db, &clock, &manager, payment.id).await?;
        }

        let statement = compute_monthly_statement(&db, tenant.id, alice.id, 2024, 6).await?;
        assert_eq!(statement.total_meals, 3);
        assert_eq!(statement.meal_cost, dec!(130.00));
        assert_eq!(statement.bazar_cost_assigned, dec!(500.00));
        assert_eq!(statement.expense_share, dec!(200.00));
        assert_eq!(statement.payments_total, dec!(600.00));
        assert_eq!(statement.due_amount, dec!(230.00));
        assert_eq!(
            format_statement_summary(&statement),
            "2024-06: 3 meals, meals 130.00 + bazar 500.00 + expenses 200.00 - paid 600.00 = due 230.00"
        );

        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(json["member_id"], alice.id);
        assert_eq!(json["month"], 6);
        assert_eq!(json["due_amount"], "230.00");
        assert_eq!(json["meal_cost"], "130.00");

        let may = compute_monthly_statement(&db, tenant.id, alice.id, 2024, 5).await?;
        assert_eq!(may.due_amount, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_issue_statements_notifies_each_member() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let pending =
            crate::core::member::request_membership(&db, &test_clock(), tenant.id, 777, None).await?;

        let notifier = RecordingNotifier::default();
        let statements = issue_monthly_statements(&db, &notifier, tenant.id, 2024, 6).await?;
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().any(|s| s.member_id == alice.id));
        assert!(statements.iter().all(|s| s.member_id != pending.id));

        let sent = notifier.notifications();
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .all(|n| matches!(n, Notification::BillReady { tenant_id, .. } if *tenant_id == tenant.id)));
        Ok(())
    }
}
