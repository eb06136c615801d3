use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Goods receipt note header. Append-only: created atomically with its lines
/// and the matching inventory adjustment, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goods_receipts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub grv_no: String,
    pub order_no: String,
    pub store_id: i32,
    pub invoice_no: String,
    pub supplier_code: String,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub shipping_charge: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub handling_charge: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub other_charge: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub sub_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub discount_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub vat_total: Decimal,

    pub received_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
