use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Box allocation for one (order, stock code). Box numbers are sequential
/// within the order, starting at 1.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_boxes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub order_no: String,
    pub stock_code: String,
    pub box_no: i32,
    pub box_code_qty: i32,
    pub box_total_qty: i32,
    pub done_and_printed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
