//! Status and classification enums stored as text columns.
//!
//! Status fields only move through the transition methods defined here; callers never
//! assign a new status directly.

use crate::errors::{Error, Result};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a member inside a mess
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MemberRole {
    /// Full control over the mess
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Kitchen/desk staff: manual meal entry, locking, scanning
    #[sea_orm(string_value = "staff")]
    Staff,
    /// Regular resident
    #[sea_orm(string_value = "member")]
    Member,
}

/// Membership lifecycle
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MemberStatus {
    /// Join request awaiting a manager
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Active member
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Join request declined
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Former member, history retained
    #[sea_orm(string_value = "left")]
    Left,
}

impl MemberStatus {
    /// Lower-case name as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Left => "left",
        }
    }

    /// `pending -> approved`
    pub fn approve(self, id: i64) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Approved),
            Self::Approved => Err(Error::AlreadyApproved { kind: "member", id }),
            other => Err(transition_error("member", other.as_str(), "approved")),
        }
    }

    /// `pending -> rejected`
    pub fn reject(self) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Rejected),
            other => Err(transition_error("member", other.as_str(), "rejected")),
        }
    }

    /// `approved -> left`
    pub fn leave(self) -> Result<Self> {
        match self {
            Self::Approved => Ok(Self::Left),
            other => Err(transition_error("member", other.as_str(), "left")),
        }
    }
}

/// Approval state shared by bazar records, expenses and meal attendance
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ApprovalStatus {
    /// Waiting for a manager
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Binding
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined, ignored by billing
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ApprovalStatus {
    /// Lower-case name as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// `pending -> approved`; a second approval is reported as [`Error::AlreadyApproved`].
    pub fn approve(self, kind: &'static str, id: i64) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Approved),
            Self::Approved => Err(Error::AlreadyApproved { kind, id }),
            Self::Rejected => Err(transition_error(kind, self.as_str(), "approved")),
        }
    }

    /// `pending -> rejected`
    pub fn reject(self, kind: &'static str, id: i64) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Rejected),
            Self::Approved => Err(Error::Immutable { kind, id }),
            Self::Rejected => Err(transition_error(kind, self.as_str(), "rejected")),
        }
    }
}

/// Payment lifecycle
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentStatus {
    /// Recorded, not yet checked
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Checked by a manager, money not yet settled
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Settled; counts toward statements
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Declined
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl PaymentStatus {
    /// Lower-case name as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// `pending -> approved`
    pub fn approve(self, id: i64) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Approved),
            Self::Approved | Self::Completed => Err(Error::AlreadyApproved { kind: "payment", id }),
            Self::Rejected => Err(transition_error("payment", self.as_str(), "approved")),
        }
    }

    /// `pending | approved -> completed`
    pub fn complete(self) -> Result<Self> {
        match self {
            Self::Pending | Self::Approved => Ok(Self::Completed),
            other => Err(transition_error("payment", other.as_str(), "completed")),
        }
    }

    /// `pending -> rejected`
    pub fn reject(self, id: i64) -> Result<Self> {
        match self {
            Self::Pending => Ok(Self::Rejected),
            Self::Approved | Self::Completed => Err(Error::Immutable { kind: "payment", id }),
            Self::Rejected => Err(transition_error("payment", self.as_str(), "rejected")),
        }
    }
}

/// How a payment was made
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentMethod {
    /// Cash handed to the manager
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Bank transfer
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    /// Mobile wallet
    #[sea_orm(string_value = "mobile_banking")]
    MobileBanking,
    /// Card
    #[sea_orm(string_value = "card")]
    Card,
}

/// Billing cadence of a mess
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentCycle {
    /// Weekly collection
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Monthly collection
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

/// The three priced meals of a day
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MealType {
    /// Morning meal
    #[sea_orm(string_value = "breakfast")]
    Breakfast,
    /// Midday meal
    #[sea_orm(string_value = "lunch")]
    Lunch,
    /// Evening meal
    #[sea_orm(string_value = "dinner")]
    Dinner,
}

/// What an attendance token grants
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TokenPurpose {
    /// Marks a member present for a meal
    #[sea_orm(string_value = "meal_attendance")]
    MealAttendance,
    /// Door access
    #[sea_orm(string_value = "mess_access")]
    MessAccess,
    /// Guest pass issued by a member
    #[sea_orm(string_value = "guest_access")]
    GuestAccess,
}

impl TokenPurpose {
    /// Lower-case name as embedded in token payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MealAttendance => "meal_attendance",
            Self::MessAccess => "mess_access",
            Self::GuestAccess => "guest_access",
        }
    }

    /// Parses the payload form back into a purpose.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "meal_attendance" => Some(Self::MealAttendance),
            "mess_access" => Some(Self::MessAccess),
            "guest_access" => Some(Self::GuestAccess),
            _ => None,
        }
    }
}

fn transition_error(kind: &'static str, from: &str, to: &str) -> Error {
    Error::InvalidTransition {
        kind,
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_approval_transitions() {
        assert_eq!(
            ApprovalStatus::Pending.approve("bazar record", 1).ok(),
            Some(ApprovalStatus::Approved)
        );
        assert!(matches!(
            ApprovalStatus::Approved.approve("bazar record", 1),
            Err(Error::AlreadyApproved { id: 1, .. })
        ));
        assert!(matches!(
            ApprovalStatus::Approved.reject("expense", 7),
            Err(Error::Immutable { id: 7, .. })
        ));
        assert!(matches!(
            ApprovalStatus::Rejected.approve("expense", 7),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_member_transitions() {
        assert_eq!(MemberStatus::Pending.approve(1).ok(), Some(MemberStatus::Approved));
        assert_eq!(MemberStatus::Approved.leave().ok(), Some(MemberStatus::Left));
        assert!(MemberStatus::Left.leave().is_err());
        assert!(MemberStatus::Approved.reject().is_err());
    }

    #[test]
    fn test_payment_transitions() {
        assert_eq!(PaymentStatus::Pending.complete().ok(), Some(PaymentStatus::Completed));
        assert_eq!(PaymentStatus::Approved.complete().ok(), Some(PaymentStatus::Completed));
        assert!(PaymentStatus::Completed.complete().is_err());
        assert!(matches!(
            PaymentStatus::Completed.approve(3),
            Err(Error::AlreadyApproved { id: 3, .. })
        ));
    }

    #[test]
    fn test_token_purpose_round_trip_names() {
        for purpose in TokenPurpose::iter() {
            assert_eq!(TokenPurpose::parse(purpose.as_str()), Some(purpose));
        }
        assert_eq!(TokenPurpose::parse("door"), None);
    }
}
