use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local order header. Owned by the site database; the cloud mirror is
/// derived from this plus the order lines.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub order_no: String,
    pub store_name: String,
    pub date_time: DateTime<Utc>,
    pub placed_by: String,

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
