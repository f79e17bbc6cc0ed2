//! Expense record entity - A categorised cost incurred by one member.

use super::enums::ApprovalStatus;
use super::money::Money;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expense_records")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning mess
    pub tenant_id: i64,
    /// Member the expense is attributed to
    pub member_id: i64,
    /// Category of the expense
    pub category_id: i64,
    /// Day the expense was incurred
    pub date: Date,
    /// Positive amount
    #[sea_orm(column_type = "Text")]
    pub amount: Money,
    /// Free-form note
    pub description: Option<String>,
    /// Approval state
    pub status: ApprovalStatus,
    /// When a manager approved the expense
    pub approved_at: Option<DateTimeUtc>,
    /// Person who approved
    pub approved_by: Option<i64>,
    /// When the expense was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ExpenseRecord` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each expense belongs to one category
    #[sea_orm(
        belongs_to = "super::expense_category::Entity",
        from = "Column::CategoryId",
        to = "super::expense_category::Column::Id"
    )]
    Category,
    /// Each expense belongs to one mess
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
}

impl Related<super::expense_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
