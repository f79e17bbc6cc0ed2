//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod attendance_token;
pub mod bazar_record;
pub mod enums;
pub mod expense_category;
pub mod expense_record;
pub mod meal_attendance;
pub mod meal_entry;
pub mod member;
pub mod money;
pub mod payment_record;
pub mod tenant;

// Re-export specific types to avoid conflicts
pub use attendance_token::{
    Column as AttendanceTokenColumn, Entity as AttendanceToken, Model as AttendanceTokenModel,
};
pub use bazar_record::{Column as BazarRecordColumn, Entity as BazarRecord, Model as BazarRecordModel};
pub use enums::{
    ApprovalStatus, MealType, MemberRole, MemberStatus, PaymentCycle, PaymentMethod,
    PaymentStatus, TokenPurpose,
};
pub use expense_category::{
    Column as ExpenseCategoryColumn, Entity as ExpenseCategory, Model as ExpenseCategoryModel,
};
pub use expense_record::{
    Column as ExpenseRecordColumn, Entity as ExpenseRecord, Model as ExpenseRecordModel,
};
pub use meal_attendance::{
    Column as MealAttendanceColumn, Entity as MealAttendance, Model as MealAttendanceModel,
};
pub use meal_entry::{Column as MealEntryColumn, Entity as MealEntry, Model as MealEntryModel};
pub use member::{Column as MemberColumn, Entity as Member, Model as MemberModel};
pub use money::Money;
pub use payment_record::{
    Column as PaymentRecordColumn, Entity as PaymentRecord, Model as PaymentRecordModel,
};
pub use tenant::{Column as TenantColumn, Entity as Tenant, Model as TenantModel};
