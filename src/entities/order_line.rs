use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local order line. Joined to the header on `order_no`; a header with no
/// line (or the reverse) is tolerated on read but never created on purpose.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub order_no: String,
    pub date_time: DateTime<Utc>,

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

    pub order_status: Option<String>,
    pub order_rcvd_date: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
