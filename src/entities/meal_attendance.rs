//! Meal attendance entity - A scanned presence at one meal.

use super::enums::{ApprovalStatus, MealType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Meal attendance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meal_attendances")]
pub struct Model {
    /// Unique identifier for the attendance
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning mess
    pub tenant_id: i64,
    /// Member present
    pub member_id: i64,
    /// Day of the meal
    pub date: Date,
    /// Which meal
    pub meal_type: MealType,
    /// Review state; rejected rows do not block a rescan
    pub status: ApprovalStatus,
    /// Token consumed for this attendance
    pub token_id: Option<i64>,
    /// Person who scanned the code
    pub scanned_by: Option<i64>,
    /// Scan instant
    pub scanned_at: DateTimeUtc,
}

/// Defines relationships between `MealAttendance` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each attendance belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each attendance belongs to one mess
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
