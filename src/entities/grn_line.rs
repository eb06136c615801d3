use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One received stock item on a goods receipt note.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goods_receipt_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub grv_no: String,
    pub stock_code: String,

    pub qty_received: i32,
    pub bonus_qty: i32,
    pub qty_ordered: i32,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub exclusive_unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub inclusive_unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub markup: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub exclusive_selling: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub inclusive_selling: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub vat_percentage: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount1: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount2: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub line_total: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
