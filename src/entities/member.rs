//! Member entity - Links a person to a mess with a role and a status.
//!
//! `person_id` is a weak reference; the person record lives outside this crate and
//! financial history keeps pointing at it after the person is gone.

use super::enums::{MemberRole, MemberStatus};
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning mess
    pub tenant_id: i64,
    /// External person id
    pub person_id: i64,
    /// Role inside the mess
    pub role: MemberRole,
    /// Lifecycle state
    pub status: MemberStatus,
    /// Room number, if assigned
    pub room_number: Option<String>,
    /// Optional fixed monthly charge, informational only
    #[sea_orm(column_type = "Text", nullable)]
    pub monthly_fixed_cost: Option<Money>,
    /// Security deposit held for the member
    #[sea_orm(column_type = "Text")]
    pub deposit_amount: Money,
    /// When the membership was requested or approved
    pub joined_at: DateTimeUtc,
    /// When the member left
    pub left_at: Option<DateTimeUtc>,
}

/// Defines relationships between Member and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one mess
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the membership is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Approved
    }
}
