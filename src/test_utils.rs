//! Shared test utilities for the mess ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating messes, members and actors with sensible defaults.

use crate::{
    core::{
        auth::ActorContext,
        clock::FixedClock,
        member,
        notify::{Notification, Notifier},
        rates::RateTable,
        tenant::{self, NewTenant},
    },
    entities::{MemberModel, MemberRole, MemberStatus, Money, PaymentCycle, TenantModel},
    errors::Result,
};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use std::sync::Mutex;

/// Person id of the manager of every mess created by [`setup_with_tenant`].
pub const MANAGER_PERSON_ID: i64 = 100;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Shorthand for a calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A clock frozen at the given UTC wall time.
pub fn clock_at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> FixedClock {
    FixedClock::at(date(year, month, day).and_hms_opt(hour, minute, 0).unwrap())
}

/// The default test instant: 2024-06-01 08:00 UTC, two hours before the cutoff.
pub fn test_clock() -> FixedClock {
    clock_at(2024, 6, 1, 8, 0)
}

/// Mess settings used by most tests.
///
/// # Defaults
/// * rates: breakfast 30, lunch 50, dinner 50
/// * cutoff: 10:00, UTC
/// * automatic bazar rotation, no member cap, monthly billing
pub fn sample_new_tenant() -> NewTenant {
    NewTenant {
        name: "Green House Mess".to_string(),
        rates: RateTable {
            breakfast: dec!(30),
            lunch: dec!(50),
            dinner: dec!(50),
        },
        meal_cutoff_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        utc_offset_minutes: 0,
        auto_bazar_rotation: true,
        max_members: None,
        payment_cycle: PaymentCycle::Monthly,
    }
}

/// Creates a fresh database holding one mess managed by [`MANAGER_PERSON_ID`].
pub async fn setup_with_tenant() -> Result<(DatabaseConnection, TenantModel)> {
    let db = setup_test_db().await?;
    let (tenant, _) =
        tenant::create_tenant(&db, &test_clock(), MANAGER_PERSON_ID, sample_new_tenant()).await?;
    Ok((db, tenant))
}

/// Adds `person_id` to the mess as an approved regular member.
pub async fn add_approved_member(
    db: &DatabaseConnection,
    tenant: &TenantModel,
    person_id: i64,
) -> Result<MemberModel> {
    member::add_member(
        db,
        &test_clock(),
        &manager_actor(tenant),
        tenant.id,
        person_id,
        MemberRole::Member,
    )
    .await
}

/// The mess manager as an actor.
pub fn manager_actor(tenant: &TenantModel) -> ActorContext {
    ActorContext::person(tenant.manager_person_id, None)
}

/// A member acting with their own membership.
pub fn member_actor(member: &MemberModel) -> ActorContext {
    ActorContext::person(member.person_id, Some(member.clone()))
}

/// An in-memory mess model for tests that never touch the store.
pub fn sample_tenant(id: i64, manager_person_id: i64) -> TenantModel {
    TenantModel {
        id,
        name: "Sample Mess".to_string(),
        breakfast_rate: Money(dec!(30)),
        lunch_rate: Money(dec!(50)),
        dinner_rate: Money(dec!(50)),
        meal_cutoff_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        utc_offset_minutes: 0,
        auto_bazar_rotation: true,
        max_members: None,
        payment_cycle: PaymentCycle::Monthly,
        manager_person_id,
        is_deleted: false,
        created_at: test_clock().0,
    }
}

/// An in-memory approved membership.
pub fn sample_member(id: i64, tenant_id: i64, person_id: i64, role: MemberRole) -> MemberModel {
    MemberModel {
        id,
        tenant_id,
        person_id,
        role,
        status: MemberStatus::Approved,
        room_number: None,
        monthly_fixed_cost: None,
        deposit_amount: Money::ZERO,
        joined_at: test_clock().0,
        left_at: None,
    }
}

/// Keeps every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Notifications received so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
