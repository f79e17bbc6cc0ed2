//! Fire-and-forget notifications triggered by ledger state changes.
//!
//! Delivery (push, mail, chat) lives outside the core. Implementations must not fail
//! the operation that triggered them, so [`Notifier::notify`] returns nothing.

use super::bill::{MonthlyStatement, format_statement_summary};
use chrono::NaiveDate;
use tracing::info;

/// Something worth telling members about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A member's monthly statement is ready
    BillReady {
        /// Mess the bill belongs to
        tenant_id: i64,
        /// The computed statement
        statement: MonthlyStatement,
    },
    /// A day's meal entries were frozen
    MealsLocked {
        /// Mess whose meals were locked
        tenant_id: i64,
        /// Locked day
        date: NaiveDate,
        /// Entries newly locked
        count: u64,
    },
}

/// Dispatches notifications.
pub trait Notifier: Send + Sync {
    /// Hands a notification over for delivery.
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::BillReady {
                tenant_id,
                statement,
            } => info!(
                tenant_id,
                member_id = statement.member_id,
                "Bill ready: {}",
                format_statement_summary(&statement)
            ),
            Notification::MealsLocked {
                tenant_id,
                date,
                count,
            } => info!(tenant_id, %date, count, "Meals locked"),
        }
    }
}
