//! `SeaORM` Entity for fee_transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fee_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub student_id: Uuid,
    pub session_id: Uuid,
    pub line_item_id: Uuid,
    pub fee_type: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub remarks: Option<String>,
    pub recorded_by: String,
    pub recorded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fee_line_items::Entity",
        from = "Column::LineItemId",
        to = "super::fee_line_items::Column::Id"
    )]
    FeeLineItems,
}

impl Related<super::fee_line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeeLineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
