//! Bazar record entity - A grocery run made by the member on duty.
//!
//! `total_cost` is cross-checked against the item list on every write; only approved
//! records count toward the assignee's statement.

use super::enums::ApprovalStatus;
use super::money::Money;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One purchased line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BazarItem {
    /// Item name
    pub name: String,
    /// Amount bought, always positive (may be fractional, e.g. 1.5 kg)
    pub quantity: Decimal,
    /// Unit of measure (kg, pcs, litre)
    pub unit: String,
    /// Price per unit
    pub unit_price: Decimal,
}

/// Ordered item list stored as a JSON column
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct BazarItems(pub Vec<BazarItem>);

impl BazarItems {
    /// Sum of `quantity × unit_price` over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.0
            .iter()
            .map(|item| item.quantity * item.unit_price)
            .sum()
    }
}

/// Bazar record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bazar_records")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning mess
    pub tenant_id: i64,
    /// Member who did the shopping
    pub member_id: i64,
    /// Day of the purchase
    pub date: Date,
    /// What was bought
    #[sea_orm(column_type = "Json")]
    pub items: BazarItems,
    /// Declared total, equal to the item sum within 0.01
    #[sea_orm(column_type = "Text")]
    pub total_cost: Money,
    /// Free-form note
    pub description: Option<String>,
    /// Approval state
    pub status: ApprovalStatus,
    /// When a manager approved the record
    pub approved_at: Option<DateTimeUtc>,
    /// Person who approved
    pub approved_by: Option<i64>,
    /// When the record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BazarRecord` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record belongs to one assignee
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each record belongs to one mess
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
