//! Meal ledger - Daily meal counts per member, the entry window and locking.
//!
//! An entry can be created or changed while the entry window for its date is open:
//! any future date, today until the mess's cutoff time, never a past date. Locked
//! entries are frozen until a manager explicitly unlocks them.

use crate::{
    core::{
        auth::{self, Action, ActorContext},
        clock::{Clock, local_datetime},
        member::get_member,
        tenant::get_active_tenant,
    },
    entities::{
        MealEntry,
        meal_entry::{self, ExtraItem, ExtraItems},
        tenant,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument, warn};

/// Upper bound on each of the breakfast, lunch and dinner counts.
pub const MAX_MEALS_PER_SLOT: i32 = 10;

/// Breakfast, lunch and dinner counts for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MealCounts {
    /// Breakfasts eaten
    pub breakfast: i32,
    /// Lunches eaten
    pub lunch: i32,
    /// Dinners eaten
    pub dinner: i32,
}

impl MealCounts {
    /// Counts for one day.
    #[must_use]
    pub const fn new(breakfast: i32, lunch: i32, dinner: i32) -> Self {
        Self {
            breakfast,
            lunch,
            dinner,
        }
    }

    /// Each count must lie in `0..=MAX_MEALS_PER_SLOT`.
    pub fn validate(&self) -> Result<()> {
        for (name, count) in [
            ("breakfast", self.breakfast),
            ("lunch", self.lunch),
            ("dinner", self.dinner),
        ] {
            if !(0..=MAX_MEALS_PER_SLOT).contains(&count) {
                return Err(Error::invalid(format!(
                    "{name} count {count} outside 0..={MAX_MEALS_PER_SLOT}"
                )));
            }
        }
        Ok(())
    }
}

/// A meal entry to create.
#[derive(Debug, Clone)]
pub struct NewMealEntry {
    /// Member who ate
    pub member_id: i64,
    /// Mess-local day
    pub date: NaiveDate,
    /// Meal counts
    pub counts: MealCounts,
    /// Extras, in the order given
    pub extra_items: Vec<ExtraItem>,
}

/// Summed meal counts of a mess for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DailyMealTotals {
    /// Entries counted
    pub entries: u64,
    /// Total breakfasts
    pub breakfast: i64,
    /// Total lunches
    pub lunch: i64,
    /// Total dinners
    pub dinner: i64,
}

impl DailyMealTotals {
    /// All meals of the day.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.breakfast + self.lunch + self.dinner
    }
}

fn validate_extras(extras: &[ExtraItem]) -> Result<()> {
    for item in extras {
        if item.name.trim().is_empty() {
            return Err(Error::invalid("extra item name cannot be empty"));
        }
        if item.quantity == 0 {
            return Err(Error::invalid(format!(
                "extra item '{}' must have a positive quantity",
                item.name
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(Error::invalid(format!(
                "extra item '{}' has a negative price",
                item.name
            )));
        }
    }
    Ok(())
}

/// Whether meals for `date` may still be created or changed at instant `now`.
///
/// Future dates are always open, today is open up to and including the cutoff, past
/// dates are closed. Dates and times are the mess's local ones.
#[must_use]
pub fn is_entry_window_open(tenant: &tenant::Model, date: NaiveDate, now: DateTime<Utc>) -> bool {
    let local_now = local_datetime(now, tenant.utc_offset_minutes);
    let today = local_now.date();
    if date > today {
        true
    } else if date == today {
        local_now.time() <= tenant.meal_cutoff_time
    } else {
        false
    }
}

fn ensure_window_open(tenant: &tenant::Model, date: NaiveDate, now: DateTime<Utc>) -> Result<()> {
    if is_entry_window_open(tenant, date, now) {
        Ok(())
    } else {
        Err(Error::WindowClosed { date })
    }
}

async fn find_entry<C>(db: &C, entry_id: i64) -> Result<meal_entry::Model>
where
    C: ConnectionTrait,
{
    MealEntry::find_by_id(entry_id)
        .one(db)
        .await?
        .ok_or(Error::RecordNotFound {
            kind: "meal entry",
            id: entry_id,
        })
}

fn duplicate_entry(member_id: i64, date: NaiveDate) -> Error {
    Error::DuplicateEntry {
        kind: "meal entry",
        detail: format!("member {member_id} already has meals on {date}"),
    }
}

/// Maps a failed insert: a hit on the one-entry-per-day index is a duplicate, anything
/// else is a store failure.
fn insert_error(err: DbErr, member_id: i64, date: NaiveDate) -> Error {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => duplicate_entry(member_id, date),
        _ => Error::Database(err),
    }
}

/// Writes new counts and extras only if the entry is still unlocked.
async fn write_if_unlocked<C>(
    db: &C,
    entry_id: i64,
    counts: MealCounts,
    extra_items: Vec<ExtraItem>,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = MealEntry::update_many()
        .col_expr(meal_entry::Column::Breakfast, Expr::value(counts.breakfast))
        .col_expr(meal_entry::Column::Lunch, Expr::value(counts.lunch))
        .col_expr(meal_entry::Column::Dinner, Expr::value(counts.dinner))
        .col_expr(
            meal_entry::Column::ExtraItems,
            Expr::value(ExtraItems(extra_items)),
        )
        .col_expr(meal_entry::Column::UpdatedAt, Expr::value(now))
        .filter(meal_entry::Column::Id.eq(entry_id))
        .filter(meal_entry::Column::LockedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Locked { id: entry_id });
    }
    Ok(())
}

/// Deletes the entry only if it is still unlocked.
async fn delete_if_unlocked<C>(db: &C, entry_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = MealEntry::delete_many()
        .filter(meal_entry::Column::Id.eq(entry_id))
        .filter(meal_entry::Column::LockedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Locked { id: entry_id });
    }
    Ok(())
}

/// Records a member's meals for a day.
#[instrument(skip(db, clock, actor, input), fields(member_id = input.member_id, date = %input.date))]
pub async fn record_meal(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    tenant_id: i64,
    input: NewMealEntry,
) -> Result<meal_entry::Model> {
    input.counts.validate()?;
    validate_extras(&input.extra_items)?;

    let now = clock.now();
    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let member = get_member(&txn, tenant_id, input.member_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::EnterMeal, &tenant, member.id)?;
    if !member.is_active() {
        return Err(Error::unauthorized(format!(
            "member {} is not an approved member",
            member.id
        )));
    }
    ensure_window_open(&tenant, input.date, now)?;

    let existing = MealEntry::find()
        .filter(meal_entry::Column::TenantId.eq(tenant_id))
        .filter(meal_entry::Column::MemberId.eq(member.id))
        .filter(meal_entry::Column::Date.eq(input.date))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(duplicate_entry(member.id, input.date));
    }

    let entry = meal_entry::ActiveModel {
        tenant_id: Set(tenant_id),
        member_id: Set(member.id),
        date: Set(input.date),
        breakfast: Set(input.counts.breakfast),
        lunch: Set(input.counts.lunch),
        dinner: Set(input.counts.dinner),
        extra_items: Set(ExtraItems(input.extra_items)),
        created_by: Set(actor.person_id().unwrap_or(0)),
        locked_at: Set(None),
        locked_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| insert_error(err, member.id, input.date))?;

    txn.commit().await?;
    debug!(entry_id = entry.id, "Meal entry recorded");
    Ok(entry)
}

/// Replaces the counts and extras of an unlocked entry while its window is open.
#[instrument(skip(db, clock, actor, extra_items))]
pub async fn update_meal(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    entry_id: i64,
    counts: MealCounts,
    extra_items: Vec<ExtraItem>,
) -> Result<meal_entry::Model> {
    counts.validate()?;
    validate_extras(&extra_items)?;

    let now = clock.now();
    let txn = db.begin().await?;
    let entry = find_entry(&txn, entry_id).await?;
    let tenant = get_active_tenant(&txn, entry.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::EnterMeal, &tenant, entry.member_id)?;
    if entry.is_locked() {
        return Err(Error::Locked { id: entry_id });
    }
    ensure_window_open(&tenant, entry.date, now)?;

    // A lock that lands between the read above and this write wins.
    write_if_unlocked(&txn, entry_id, counts, extra_items, now).await?;

    let updated = find_entry(&txn, entry_id).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Removes an unlocked entry while its window is open.
#[instrument(skip(db, clock, actor))]
pub async fn delete_meal(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    entry_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    let entry = find_entry(&txn, entry_id).await?;
    let tenant = get_active_tenant(&txn, entry.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require_for_member(actor, Action::EnterMeal, &tenant, entry.member_id)?;
    if entry.is_locked() {
        return Err(Error::Locked { id: entry_id });
    }
    ensure_window_open(&tenant, entry.date, clock.now())?;

    delete_if_unlocked(&txn, entry_id).await?;

    txn.commit().await?;
    Ok(())
}

/// Freezes every unlocked entry of `date` and returns how many were locked.
///
/// Refuses with [`Error::WindowStillOpen`] while entries for `date` can still be made,
/// unless `force` is set. Entries that are already locked are left alone, so calling
/// this twice locks nothing the second time.
#[instrument(skip(db, clock, actor))]
pub async fn lock_meals(
    db: &DatabaseConnection,
    clock: &impl Clock,
    actor: &ActorContext,
    tenant_id: i64,
    date: NaiveDate,
    force: bool,
) -> Result<u64> {
    let now = clock.now();
    let txn = db.begin().await?;
    let tenant = get_active_tenant(&txn, tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::LockMeals, &tenant)?;
    if !force && is_entry_window_open(&tenant, date, now) {
        return Err(Error::WindowStillOpen { date });
    }
    if force {
        warn!(tenant_id, %date, "Locking meals before the cutoff");
    }

    let result = MealEntry::update_many()
        .col_expr(meal_entry::Column::LockedAt, Expr::value(Some(now)))
        .col_expr(meal_entry::Column::LockedBy, Expr::value(actor.person_id()))
        .filter(meal_entry::Column::TenantId.eq(tenant_id))
        .filter(meal_entry::Column::Date.eq(date))
        .filter(meal_entry::Column::LockedAt.is_null())
        .exec(&txn)
        .await?;

    txn.commit().await?;
    info!(tenant_id, %date, locked = result.rows_affected, "Meals locked");
    Ok(result.rows_affected)
}

/// Manager override that reopens a locked entry. Later edits still need an open
/// entry window.
#[instrument(skip(db, actor))]
pub async fn unlock_meal(
    db: &DatabaseConnection,
    actor: &ActorContext,
    entry_id: i64,
) -> Result<meal_entry::Model> {
    let txn = db.begin().await?;
    let entry = find_entry(&txn, entry_id).await?;
    let tenant = get_active_tenant(&txn, entry.tenant_id).await?;
    let actor = &auth::refresh_actor(&txn, actor, tenant.id).await?;
    auth::require(actor, Action::UnlockMeal, &tenant)?;
    if !entry.is_locked() {
        return Err(Error::InvalidTransition {
            kind: "meal entry",
            from: "open".to_string(),
            to: "open".to_string(),
        });
    }

    let mut active: meal_entry::ActiveModel = entry.into();
    active.locked_at = Set(None);
    active.locked_by = Set(None);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(entry_id, "Meal entry unlocked");
    Ok(updated)
}

/// A member's entries between `from` and `until` inclusive, by date.
pub async fn meals_for_member<C>(
    db: &C,
    tenant_id: i64,
    member_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<meal_entry::Model>>
where
    C: ConnectionTrait,
{
    MealEntry::find()
        .filter(meal_entry::Column::TenantId.eq(tenant_id))
        .filter(meal_entry::Column::MemberId.eq(member_id))
        .filter(meal_entry::Column::Date.between(from, until))
        .order_by_asc(meal_entry::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every entry of a mess between `from` and `until` inclusive.
pub async fn meals_in_range<C>(
    db: &C,
    tenant_id: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<meal_entry::Model>>
where
    C: ConnectionTrait,
{
    MealEntry::find()
        .filter(meal_entry::Column::TenantId.eq(tenant_id))
        .filter(meal_entry::Column::Date.between(from, until))
        .order_by_asc(meal_entry::Column::Date)
        .order_by_asc(meal_entry::Column::MemberId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Kitchen head-count for one day.
pub async fn daily_meal_totals<C>(db: &C, tenant_id: i64, date: NaiveDate) -> Result<DailyMealTotals>
where
    C: ConnectionTrait,
{
    get_active_tenant(db, tenant_id).await?;
    let entries = meals_in_range(db, tenant_id, date, date).await?;
    Ok(entries
        .iter()
        .fold(DailyMealTotals::default(), |mut totals, entry| {
            totals.entries += 1;
            totals.breakfast += i64::from(entry.breakfast);
            totals.lunch += i64::from(entry.lunch);
            totals.dinner += i64::from(entry.dinner);
            totals
        }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn entry_for(member_id: i64, date: NaiveDate, counts: MealCounts) -> NewMealEntry {
        NewMealEntry {
            member_id,
            date,
            counts,
            extra_items: Vec::new(),
        }
    }

    #[test]
    fn test_window_rules() {
        let tenant = sample_tenant(1, MANAGER_PERSON_ID);
        let today = date(2024, 6, 1);

        let morning = clock_at(2024, 6, 1, 9, 0).now();
        let at_cutoff = clock_at(2024, 6, 1, 10, 0).now();
        let late = clock_at(2024, 6, 1, 11, 0).now();

        assert!(is_entry_window_open(&tenant, today, morning));
        assert!(is_entry_window_open(&tenant, today, at_cutoff));
        assert!(!is_entry_window_open(&tenant, today, late));
        assert!(is_entry_window_open(&tenant, date(2024, 6, 2), late));
        assert!(!is_entry_window_open(&tenant, date(2024, 5, 31), morning));
    }

    #[test]
    fn test_window_never_reopens_as_time_passes() {
        let tenant = sample_tenant(1, MANAGER_PERSON_ID);
        let day = date(2024, 6, 1);
        let mut closed = false;
        for hour in 0..24 {
            let open = is_entry_window_open(&tenant, day, clock_at(2024, 6, 1, hour, 30).now());
            assert!(!(closed && open), "window reopened at {hour}:30");
            closed |= !open;
        }
        assert!(closed);
    }

    #[test]
    fn test_window_uses_local_offset() {
        let mut tenant = sample_tenant(1, MANAGER_PERSON_ID);
        tenant.utc_offset_minutes = 360;
        // 03:30 UTC is 09:30 at UTC+6
        let now = clock_at(2024, 6, 1, 3, 30).now();
        assert!(is_entry_window_open(&tenant, date(2024, 6, 1), now));
        // 04:30 UTC is 10:30 at UTC+6
        let now = clock_at(2024, 6, 1, 4, 30).now();
        assert!(!is_entry_window_open(&tenant, date(2024, 6, 1), now));
    }

    #[test]
    fn test_counts_validation() {
        assert!(MealCounts::new(0, 10, 3).validate().is_ok());
        assert!(MealCounts::new(11, 0, 0).validate().is_err());
        assert!(MealCounts::new(0, -1, 0).validate().is_err());
    }

    #[tokio::test]
    async fn test_invalid_counts_rejected_before_store() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let actor = ActorContext::system();
        let result = record_meal(
            &db,
            &test_clock(),
            &actor,
            1,
            entry_for(1, date(2024, 6, 1), MealCounts::new(1, 12, 0)),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_record_meal_and_duplicate() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let actor = member_actor(&alice);
        let today = date(2024, 6, 1);

        let entry = record_meal(
            &db,
            &test_clock(),
            &actor,
            tenant.id,
            NewMealEntry {
                member_id: alice.id,
                date: today,
                counts: MealCounts::new(1, 1, 1),
                extra_items: vec![ExtraItem {
                    name: "egg".to_string(),
                    quantity: 2,
                    unit_price: dec!(15),
                }],
            },
        )
        .await?;
        assert_eq!(entry.total_meals(), 3);
        assert_eq!(entry.extra_items.total(), dec!(30));
        assert!(!entry.is_locked());

        let duplicate = record_meal(
            &db,
            &test_clock(),
            &actor,
            tenant.id,
            entry_for(alice.id, today, MealCounts::new(0, 1, 0)),
        )
        .await;
        assert!(matches!(duplicate, Err(Error::DuplicateEntry { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_hit_is_a_duplicate() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let today = date(2024, 6, 1);
        let now = test_clock().now();

        record_meal(
            &db,
            &test_clock(),
            &member_actor(&alice),
            tenant.id,
            entry_for(alice.id, today, MealCounts::new(1, 0, 0)),
        )
        .await?;

        // a concurrent writer that slipped past the existence check
        let raced = meal_entry::ActiveModel {
            tenant_id: Set(tenant.id),
            member_id: Set(alice.id),
            date: Set(today),
            breakfast: Set(0),
            lunch: Set(1),
            dinner: Set(0),
            extra_items: Set(ExtraItems(Vec::new())),
            created_by: Set(alice.person_id),
            locked_at: Set(None),
            locked_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();

        assert!(matches!(
            insert_error(raced, alice.id, today),
            Error::DuplicateEntry { kind: "meal entry", .. }
        ));
        assert!(matches!(
            insert_error(DbErr::Custom("disk full".into()), alice.id, today),
            Error::Database(_)
        ));

        let entries = meals_for_member(&db, tenant.id, alice.id, today, today).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].breakfast, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_landing_after_read_wins() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let tomorrow = date(2024, 6, 2);

        let entry = record_meal(
            &db,
            &test_clock(),
            &member_actor(&alice),
            tenant.id,
            entry_for(alice.id, tomorrow, MealCounts::new(1, 1, 1)),
        )
        .await?;

        // the editor has read the entry as unlocked, then the manager locks it
        let seen = find_entry(&db, entry.id).await?;
        assert!(!seen.is_locked());
        lock_meals(&db, &test_clock(), &manager_actor(&tenant), tenant.id, tomorrow, true).await?;

        let write =
            write_if_unlocked(&db, seen.id, MealCounts::new(3, 3, 3), Vec::new(), test_clock().now())
                .await;
        assert!(matches!(write, Err(Error::Locked { id }) if id == entry.id));
        let delete = delete_if_unlocked(&db, seen.id).await;
        assert!(matches!(delete, Err(Error::Locked { id }) if id == entry.id));

        let stored = find_entry(&db, entry.id).await?;
        assert_eq!(stored.total_meals(), 3);
        assert!(stored.is_locked());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_after_cutoff_closed_and_lock_succeeds() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let today = date(2024, 6, 1);

        record_meal(
            &db,
            &test_clock(),
            &member_actor(&alice),
            tenant.id,
            entry_for(alice.id, today, MealCounts::new(1, 1, 0)),
        )
        .await?;

        let late = clock_at(2024, 6, 1, 11, 0);
        let closed = record_meal(
            &db,
            &late,
            &manager_actor(&tenant),
            tenant.id,
            entry_for(alice.id, today, MealCounts::new(1, 0, 0)),
        )
        .await;
        assert!(matches!(closed, Err(Error::WindowClosed { .. })));

        let locked = lock_meals(&db, &late, &manager_actor(&tenant), tenant.id, today, false).await?;
        assert_eq!(locked, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_is_idempotent_and_respects_window() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let bob = add_approved_member(&db, &tenant, 502).await?;
        let today = date(2024, 6, 1);

        for member in [&alice, &bob] {
            record_meal(
                &db,
                &test_clock(),
                &manager,
                tenant.id,
                entry_for(member.id, today, MealCounts::new(1, 1, 1)),
            )
            .await?;
        }

        let early = lock_meals(&db, &test_clock(), &manager, tenant.id, today, false).await;
        assert!(matches!(early, Err(Error::WindowStillOpen { .. })));

        assert_eq!(lock_meals(&db, &test_clock(), &manager, tenant.id, today, true).await?, 2);
        assert_eq!(lock_meals(&db, &test_clock(), &manager, tenant.id, today, true).await?, 0);

        let entries = meals_in_range(&db, tenant.id, today, today).await?;
        assert!(entries.iter().all(meal_entry::Model::is_locked));
        assert!(entries.iter().all(|e| e.locked_by == Some(MANAGER_PERSON_ID)));
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_refuses_future_dates_unless_forced() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let tomorrow = date(2024, 6, 2);

        record_meal(
            &db,
            &test_clock(),
            &manager,
            tenant.id,
            entry_for(alice.id, tomorrow, MealCounts::new(0, 1, 1)),
        )
        .await?;

        let early = lock_meals(&db, &test_clock(), &manager, tenant.id, tomorrow, false).await;
        assert!(matches!(early, Err(Error::WindowStillOpen { date: refused }) if refused == tomorrow));

        // once the day is over its entries lock without force
        let next_week = clock_at(2024, 6, 9, 8, 0);
        assert_eq!(lock_meals(&db, &next_week, &manager, tenant.id, tomorrow, false).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_member_cannot_lock() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let result = lock_meals(
            &db,
            &clock_at(2024, 6, 1, 11, 0),
            &member_actor(&alice),
            tenant.id,
            date(2024, 6, 1),
            false,
        )
        .await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_locked_entry_is_frozen_until_unlocked() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let actor = member_actor(&alice);
        let tomorrow = date(2024, 6, 2);

        let entry = record_meal(
            &db,
            &test_clock(),
            &actor,
            tenant.id,
            entry_for(alice.id, tomorrow, MealCounts::new(1, 0, 1)),
        )
        .await?;
        lock_meals(&db, &test_clock(), &manager, tenant.id, tomorrow, true).await?;

        let blocked =
            update_meal(&db, &test_clock(), &actor, entry.id, MealCounts::new(2, 0, 0), vec![]).await;
        assert!(matches!(blocked, Err(Error::Locked { .. })));
        let blocked_delete = delete_meal(&db, &test_clock(), &actor, entry.id).await;
        assert!(matches!(blocked_delete, Err(Error::Locked { .. })));

        let member_unlock = unlock_meal(&db, &actor, entry.id).await;
        assert!(matches!(member_unlock, Err(Error::Unauthorized { .. })));

        unlock_meal(&db, &manager, entry.id).await?;
        let updated =
            update_meal(&db, &test_clock(), &actor, entry.id, MealCounts::new(2, 0, 0), vec![]).await?;
        assert_eq!(updated.breakfast, 2);
        assert_eq!(updated.dinner, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unlocked_past_entry_still_needs_open_window() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let today = date(2024, 6, 1);

        let entry = record_meal(
            &db,
            &test_clock(),
            &manager,
            tenant.id,
            entry_for(alice.id, today, MealCounts::new(1, 1, 1)),
        )
        .await?;
        let next_day = clock_at(2024, 6, 2, 8, 0);
        lock_meals(&db, &next_day, &manager, tenant.id, today, false).await?;
        unlock_meal(&db, &manager, entry.id).await?;

        let result =
            update_meal(&db, &next_day, &manager, entry.id, MealCounts::new(0, 0, 0), vec![]).await;
        assert!(matches!(result, Err(Error::WindowClosed { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_member_cannot_record() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let pending =
            crate::core::member::request_membership(&db, &test_clock(), tenant.id, 777, None).await?;
        let result = record_meal(
            &db,
            &test_clock(),
            &manager_actor(&tenant),
            tenant.id,
            entry_for(pending.id, date(2024, 6, 1), MealCounts::new(1, 0, 0)),
        )
        .await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_and_daily_totals() -> Result<()> {
        let (db, tenant) = setup_with_tenant().await?;
        let manager = manager_actor(&tenant);
        let alice = add_approved_member(&db, &tenant, 501).await?;
        let bob = add_approved_member(&db, &tenant, 502).await?;
        let today = date(2024, 6, 1);

        record_meal(
            &db,
            &test_clock(),
            &manager,
            tenant.id,
            entry_for(alice.id, today, MealCounts::new(1, 2, 1)),
        )
        .await?;
        let bobs = record_meal(
            &db,
            &test_clock(),
            &manager,
            tenant.id,
            entry_for(bob.id, today, MealCounts::new(0, 1, 1)),
        )
        .await?;

        let totals = daily_meal_totals(&db, tenant.id, today).await?;
        assert_eq!(totals.entries, 2);
        assert_eq!((totals.breakfast, totals.lunch, totals.dinner), (1, 3, 2));
        assert_eq!(totals.total(), 6);

        delete_meal(&db, &test_clock(), &member_actor(&bob), bobs.id).await?;
        let totals = daily_meal_totals(&db, tenant.id, today).await?;
        assert_eq!(totals.entries, 1);

        let history =
            meals_for_member(&db, tenant.id, alice.id, date(2024, 5, 1), date(2024, 6, 30)).await?;
        assert_eq!(history.len(), 1);
        Ok(())
    }
}
