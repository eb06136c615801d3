use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::debug;

use crate::db::{DatabaseTarget, DbPool};
use crate::entities::{order_box, pack_size};
use crate::errors::ServiceError;

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Legacy fallback: extracts the first numeric token from a free-text stock
/// description and interprets it as a pack size (e.g. "Cola 330ml can" -> 330).
/// Catalog entries should carry an explicit pack size instead; this parse is
/// a coarse heuristic for data that predates that field.
pub fn pack_size_from_description(description: &str) -> Option<i64> {
    FIRST_NUMBER
        .find(description)
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolves the pack size for a stock item: the explicit catalog value wins,
/// falling back to parsing the description for legacy data.
pub fn resolve_pack_size(explicit: Option<i64>, description: &str) -> Option<i64> {
    explicit.or_else(|| pack_size_from_description(description))
}

/// Looks up quantity-per-box for a pack size. No reference entry means 0.
pub async fn qty_per_box(db: &DbPool, size: i64) -> Result<i32, ServiceError> {
    let entry = pack_size::Entity::find()
        .filter(pack_size::Column::PackSize.eq(size))
        .one(db)
        .await
        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;

    Ok(entry.map(|e| e.qty_per_box).unwrap_or(0))
}

/// One planned box row for an (order, stock code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxPlan {
    pub box_no: i32,
    pub box_code_qty: i32,
    pub box_total_qty: i32,
}

/// Splits an ordered quantity into boxes of `qty_per_box`, numbering them
/// after any boxes the order already has. A zero quantity-per-box still
/// yields one zero-total box so the stock code stays visible to packers.
pub fn plan_boxes(order_qty: i32, qty_per_box: i32, existing_boxes: i32) -> Vec<BoxPlan> {
    let next_no = existing_boxes + 1;

    if qty_per_box <= 0 {
        return vec![BoxPlan {
            box_no: next_no,
            box_code_qty: 0,
            box_total_qty: 0,
        }];
    }
    if order_qty <= 0 {
        return Vec::new();
    }

    let full = order_qty / qty_per_box;
    let remainder = order_qty % qty_per_box;
    let mut plans = Vec::with_capacity(full as usize + 1);

    for i in 0..full {
        plans.push(BoxPlan {
            box_no: next_no + i,
            box_code_qty: qty_per_box,
            box_total_qty: qty_per_box,
        });
    }
    if remainder > 0 {
        plans.push(BoxPlan {
            box_no: next_no + full,
            box_code_qty: qty_per_box,
            box_total_qty: remainder,
        });
    }

    plans
}

/// Computes the box allocation for one stock item of an order being created:
/// counts the order's existing boxes, resolves the pack size, and plans the
/// new rows. Returns an empty plan when there is no stock code to box.
pub async fn allocate(
    db: &DbPool,
    order_no: &str,
    stock_code: &str,
    stock_description: &str,
    explicit_pack_size: Option<i64>,
    order_qty: i32,
) -> Result<Vec<BoxPlan>, ServiceError> {
    if stock_code.is_empty() {
        return Ok(Vec::new());
    }

    let existing = order_box::Entity::find()
        .filter(order_box::Column::OrderNo.eq(order_no))
        .count(db)
        .await
        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))? as i32;

    let per_box = match resolve_pack_size(explicit_pack_size, stock_description) {
        Some(size) => qty_per_box(db, size).await?,
        None => 0,
    };

    debug!(%order_no, %stock_code, per_box, existing, "planned box allocation");

    Ok(plan_boxes(order_qty, per_box, existing))
}
