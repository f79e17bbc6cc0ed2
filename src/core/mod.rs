/// Attendance tokens: issue, validate, consume, meal attendance
pub mod attendance;

/// Capability checks and the calling actor
pub mod auth;

/// Bazar duty rotation and purchase records
pub mod bazar;

/// Monthly statements per member
pub mod bill;

/// Injected time source
pub mod clock;

/// Shared expenses
pub mod expense;

/// Daily meal entries, entry window and locking
pub mod meal;

/// Membership lifecycle
pub mod member;

/// Fire-and-forget notifications
pub mod notify;

/// Member payments
pub mod payment;

/// Meal and category rates
pub mod rates;

/// Trend and comparison reports
pub mod report;

/// Mess creation, settings and soft deletion
pub mod tenant;
