//! Payment record entity - Money a member handed over toward their bill.

use super::enums::{PaymentMethod, PaymentStatus};
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_records")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning mess
    pub tenant_id: i64,
    /// Paying member
    pub member_id: i64,
    /// Day the payment was made
    pub date: Date,
    /// Positive amount
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// How it was paid
    pub method: PaymentMethod,
    /// Lifecycle state; only `completed` counts toward statements
    pub status: PaymentStatus,
    /// Transfer or receipt reference
    pub reference: Option<String>,
    /// When a manager approved the payment
    pub approved_at: Option<DateTimeUtc>,
    /// Person who approved
    pub approved_by: Option<i64>,
    /// When the payment was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `PaymentRecord` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each payment belongs to one mess
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
