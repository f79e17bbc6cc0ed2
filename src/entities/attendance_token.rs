//! Attendance token entity - Signed QR token with a usage cap and an expiry.
//!
//! `usage_count` only grows, through the conditional update in
//! [`crate::core::attendance::consume`]; `is_active` only goes from true to false.

use super::enums::TokenPurpose;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attendance token database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_tokens")]
pub struct Model {
    /// Unique identifier for the token row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Token value encoded in the QR code
    #[sea_orm(unique)]
    pub token: String,
    /// Owning mess
    pub tenant_id: i64,
    /// Member the token was issued to
    pub member_id: i64,
    /// What the token grants
    pub purpose: TokenPurpose,
    /// Issue instant
    pub issued_at: DateTimeUtc,
    /// Expiry instant
    pub expires_at: DateTimeUtc,
    /// Times consumed so far
    pub usage_count: i32,
    /// Maximum number of consumptions
    pub max_usage: i32,
    /// Hex HMAC-SHA256 over the token payload
    pub signature: String,
    /// False once expired or exhausted, never flips back
    pub is_active: bool,
}

/// Defines relationships between `AttendanceToken` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each token belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each token belongs to one mess
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
