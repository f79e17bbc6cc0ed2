//! Tenant entity - A mess: the shared household that owns every other record.
//!
//! Holds the per-meal prices, the daily meal cutoff and the rotation switch.

use super::enums::PaymentCycle;
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mess database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the mess
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Price of one breakfast
    #[sea_orm(column_type = "Text")]
    pub breakfast_rate: Money,
    /// Price of one lunch
    #[sea_orm(column_type = "Text")]
    pub lunch_rate: Money,
    /// Price of one dinner
    #[sea_orm(column_type = "Text")]
    pub dinner_rate: Money,
    /// Local time of day after which today's meals are frozen
    pub meal_cutoff_time: Time,
    /// Offset of the mess's local clock from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Whether bazar duty rotates automatically
    pub auto_bazar_rotation: bool,
    /// Optional cap on approved members
    pub max_members: Option<i32>,
    /// Billing cadence
    pub payment_cycle: PaymentCycle,
    /// Person who created and manages the mess
    pub manager_person_id: i64,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the mess was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Tenant and the records it owns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One mess has many members
    #[sea_orm(has_many = "super::member::Entity")]
    Members,
    /// One mess has many expense categories
    #[sea_orm(has_many = "super::expense_category::Entity")]
    ExpenseCategories,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::expense_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseCategories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
