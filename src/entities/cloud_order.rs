use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Denormalized warehouse-wide order mirror. Header and line fields live in
/// one row here; the per-site databases keep them normalized.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub order_no: String,
    pub store_name: String,
    pub date_time: DateTime<Utc>,
    pub placed_by: String,

    pub stock_code: String,
    pub stock_description: String,
    pub major_no: i32,
    pub major_name: String,
    pub sub1_no: i32,
    pub sub1_name: String,

    pub order_qty: i32,
    pub rcvd_qty: i32,
    pub amended_qty: i32,
    pub final_qty: i32,
    pub amended_shop: Option<String>,

    pub order_complete: bool,
    pub order_approved_by: Option<String>,
    pub order_approved_date: Option<DateTime<Utc>>,
    pub order_packed_by: Option<String>,
    pub order_packed_date: Option<DateTime<Utc>>,
    pub order_dispatch_by: Option<String>,
    pub order_dispatched_date: Option<DateTime<Utc>>,
    pub order_rcvd_date: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
