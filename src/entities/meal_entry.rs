//! Meal entry entity - One row per member per day with breakfast/lunch/dinner counts.
//!
//! Rows are unique on (`tenant_id`, `member_id`, `date`); the index is created in
//! [`crate::config::database::create_tables`]. A non-null `locked_at` freezes the row.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Something eaten beyond the three priced meals (guest meal, egg, dessert)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraItem {
    /// Item name
    pub name: String,
    /// Units taken, always positive
    pub quantity: u32,
    /// Price per unit
    pub unit_price: Decimal,
}

/// Ordered list of extras stored as a JSON column
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ExtraItems(pub Vec<ExtraItem>);

impl ExtraItems {
    /// Sum of `quantity × unit_price` over all extras.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.0
            .iter()
            .map(|item| Decimal::from(item.quantity) * item.unit_price)
            .sum()
    }
}

/// Meal entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meal_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning mess
    pub tenant_id: i64,
    /// Member who ate
    pub member_id: i64,
    /// Day the meals belong to (mess-local)
    pub date: Date,
    /// Breakfast count, 0..=10
    pub breakfast: i32,
    /// Lunch count, 0..=10
    pub lunch: i32,
    /// Dinner count, 0..=10
    pub dinner: i32,
    /// Extras eaten that day
    #[sea_orm(column_type = "Json")]
    pub extra_items: ExtraItems,
    /// Person who created the entry (self or staff)
    pub created_by: i64,
    /// When the entry was frozen for billing
    pub locked_at: Option<DateTimeUtc>,
    /// Person (or `None` for the system sweep) that locked the entry
    pub locked_by: Option<i64>,
    /// When the entry was created
    pub created_at: DateTimeUtc,
    /// When the entry was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `MealEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each entry belongs to one mess
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

impl Model {
    /// Whether the entry has been frozen.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Breakfast + lunch + dinner.
    #[must_use]
    pub const fn total_meals(&self) -> i32 {
        self.breakfast + self.lunch + self.dinner
    }
}
