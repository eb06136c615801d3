use crate::{
    commands::{publish, Command},
    db::{DatabaseTarget, PoolRegistry},
    entities::{cloud_order, grn_header, grn_line, order, order_line, stock_on_hand},
    errors::ServiceError,
    events::{Event, EventSender},
    lifecycle,
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

lazy_static! {
    static ref RECEIPTS_POSTED: IntCounter = IntCounter::new(
        "goods_receipts_posted_total",
        "Total number of goods receipts posted"
    )
    .expect("metric can be created");
    static ref RECEIPT_FAILURES: IntCounter = IntCounter::new(
        "goods_receipt_failures_total",
        "Total number of failed goods receipts"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiptItem {
    #[validate(length(min = 1, message = "stockCode is required"))]
    pub stock_code: String,
    #[validate(range(min = 0))]
    pub qty_received: i32,
    #[serde(default)]
    pub bonus_qty: i32,
    #[validate(range(min = 0))]
    pub qty_ordered: i32,
    pub exclusive_unit_cost: Decimal,
    #[serde(default)]
    pub inclusive_unit_cost: Decimal,
    #[serde(default)]
    pub markup: Decimal,
    #[serde(default)]
    pub exclusive_selling: Decimal,
    #[serde(default)]
    pub inclusive_selling: Decimal,
    #[serde(default)]
    pub vat_percentage: Decimal,
    #[serde(default)]
    pub discount1: Decimal,
    #[serde(default)]
    pub discount2: Decimal,
}

/// Derived money amounts for one receipt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub vat_amount: Decimal,
    pub line_total: Decimal,
}

impl ReceiptItem {
    /// Computes the line's derived amounts: subtotal from the exclusive unit
    /// cost, discount1 off the subtotal, VAT on the discounted amount.
    pub fn totals(&self) -> LineTotals {
        let hundred = Decimal::from(100);
        let subtotal = Decimal::from(self.qty_received) * self.exclusive_unit_cost;
        let discount_amount = subtotal * self.discount1 / hundred;
        let vat_amount = (subtotal - discount_amount) * self.vat_percentage / hundred;
        let line_total = subtotal - discount_amount + vat_amount;

        LineTotals {
            subtotal,
            discount_amount,
            vat_amount,
            line_total,
        }
    }
}

/// Posts a goods receipt for an order: one GRN header, one line per received
/// item, additive stock-on-hand adjustments, and the order-completeness
/// decision, all inside a single local-database transaction. The GRN is an
/// append-only ledger; nothing here is ever updated after commit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConfirmReceiptCommand {
    pub store_id: i32,
    #[validate(length(min = 1, message = "orderNo is required"))]
    pub order_no: String,
    #[validate(length(min = 1, message = "receivedBy is required"))]
    pub received_by: String,
    #[serde(default)]
    pub invoice_no: String,
    #[serde(default)]
    pub supplier_code: String,
    #[serde(default)]
    pub shipping_charge: Decimal,
    #[serde(default)]
    pub handling_charge: Decimal,
    #[serde(default)]
    pub other_charge: Decimal,
    #[validate(length(min = 1, message = "at least one received item is required"))]
    pub items: Vec<ReceiptItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmReceiptResult {
    pub grv_no: String,
    pub order_no: String,
    pub complete: bool,
    pub total_received: i32,
    pub total_ordered: i32,
}

#[async_trait::async_trait]
impl Command for ConfirmReceiptCommand {
    type Result = ConfirmReceiptResult;

    #[instrument(skip(self, registry, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .and_then(|_| self.items.iter().try_for_each(|item| item.validate()))
            .map_err(|e| {
                RECEIPT_FAILURES.inc();
                let msg = format!("Invalid input: {}", e);
                error!("{}", msg);
                ServiceError::ValidationError(msg)
            })?;

        // The order must be visible warehouse-wide before stock is booked in.
        cloud_order::Entity::find()
            .filter(cloud_order::Column::OrderNo.eq(self.order_no.as_str()))
            .one(&registry.cloud())
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Cloud, e))?
            .ok_or_else(|| {
                RECEIPT_FAILURES.inc();
                ServiceError::NotFound(format!("Order {} not found", self.order_no))
            })?;

        let grv_no = lifecycle::grv_number();
        let local = registry.local();

        let txn = local
            .begin()
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;

        let result = match self.post_receipt(&txn, &grv_no).await {
            Ok(result) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                result
            }
            Err(err) => {
                RECEIPT_FAILURES.inc();
                if let Err(rb) = txn.rollback().await {
                    error!("rollback failed after receipt error: {rb}");
                }
                return Err(err);
            }
        };

        info!(
            %grv_no,
            order_no = %self.order_no,
            complete = result.complete,
            "goods receipt posted"
        );
        publish(
            &event_sender,
            Event::GoodsReceiptPosted {
                grv_no: grv_no.clone(),
                order_no: self.order_no.clone(),
            },
        )
        .await;
        RECEIPTS_POSTED.inc();

        Ok(result)
    }
}

impl ConfirmReceiptCommand {
    async fn post_receipt(
        &self,
        txn: &DatabaseTransaction,
        grv_no: &str,
    ) -> Result<ConfirmReceiptResult, ServiceError> {
        let persist = |e| ServiceError::persistence(&DatabaseTarget::Local, e);

        let mut sub_total = Decimal::ZERO;
        let mut discount_total = Decimal::ZERO;
        let mut vat_total = Decimal::ZERO;
        let mut total_received = 0;
        let mut total_ordered = 0;

        for item in &self.items {
            let totals = item.totals();
            sub_total += totals.subtotal;
            discount_total += totals.discount_amount;
            vat_total += totals.vat_amount;
            total_received += item.qty_received;
            total_ordered += item.qty_ordered;
        }

        grn_header::ActiveModel {
            grv_no: Set(grv_no.to_string()),
            order_no: Set(self.order_no.clone()),
            store_id: Set(self.store_id),
            invoice_no: Set(self.invoice_no.clone()),
            supplier_code: Set(self.supplier_code.clone()),
            shipping_charge: Set(self.shipping_charge),
            handling_charge: Set(self.handling_charge),
            other_charge: Set(self.other_charge),
            sub_total: Set(sub_total),
            discount_total: Set(discount_total),
            vat_total: Set(vat_total),
            received_by: Set(self.received_by.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(persist)?;

        for item in &self.items {
            let totals = item.totals();

            grn_line::ActiveModel {
                grv_no: Set(grv_no.to_string()),
                stock_code: Set(item.stock_code.clone()),
                qty_received: Set(item.qty_received),
                bonus_qty: Set(item.bonus_qty),
                qty_ordered: Set(item.qty_ordered),
                exclusive_unit_cost: Set(item.exclusive_unit_cost),
                inclusive_unit_cost: Set(item.inclusive_unit_cost),
                markup: Set(item.markup),
                exclusive_selling: Set(item.exclusive_selling),
                inclusive_selling: Set(item.inclusive_selling),
                vat_percentage: Set(item.vat_percentage),
                discount1: Set(item.discount1),
                discount2: Set(item.discount2),
                line_total: Set(totals.line_total),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(persist)?;

            adjust_stock(txn, &item.stock_code, item.qty_received).await?;

            // Keep the order line's received quantity in step so the
            // discrepancy report reads from one place.
            let line = order_line::Entity::find()
                .filter(order_line::Column::OrderNo.eq(self.order_no.as_str()))
                .filter(order_line::Column::StockCode.eq(item.stock_code.as_str()))
                .one(txn)
                .await
                .map_err(persist)?;
            if let Some(line) = line {
                let received = line.rcvd_qty + item.qty_received;
                let mut line: order_line::ActiveModel = line.into();
                line.rcvd_qty = Set(received);
                line.order_rcvd_date = Set(Some(Utc::now()));
                line.update(txn).await.map_err(persist)?;
            }
        }

        let complete = total_received >= total_ordered;
        order::Entity::update_many()
            .set(order::ActiveModel {
                order_complete: Set(complete),
                ..Default::default()
            })
            .filter(order::Column::OrderNo.eq(self.order_no.as_str()))
            .exec(txn)
            .await
            .map_err(persist)?;

        Ok(ConfirmReceiptResult {
            grv_no: grv_no.to_string(),
            order_no: self.order_no.clone(),
            complete,
            total_received,
            total_ordered,
        })
    }
}

/// Adds `qty` to the stock code's on-hand quantity, creating the row on first
/// receipt. Always an increment; the on-hand figure is never overwritten.
async fn adjust_stock(
    txn: &DatabaseTransaction,
    stock_code: &str,
    qty: i32,
) -> Result<(), ServiceError> {
    let persist = |e| ServiceError::persistence(&DatabaseTarget::Local, e);

    let existing = stock_on_hand::Entity::find()
        .filter(stock_on_hand::Column::StockCode.eq(stock_code))
        .one(txn)
        .await
        .map_err(persist)?;

    match existing {
        Some(row) => {
            let on_hand = row.qty_on_hand + qty;
            let mut row: stock_on_hand::ActiveModel = row.into();
            row.qty_on_hand = Set(on_hand);
            row.last_movement = Set(Some(Utc::now()));
            row.update(txn).await.map_err(persist)?;
        }
        None => {
            stock_on_hand::ActiveModel {
                stock_code: Set(stock_code.to_string()),
                qty_on_hand: Set(qty),
                last_movement: Set(Some(Utc::now())),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(persist)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(qty: i32, cost: Decimal, discount1: Decimal, vat: Decimal) -> ReceiptItem {
        ReceiptItem {
            stock_code: "SKU1".into(),
            qty_received: qty,
            bonus_qty: 0,
            qty_ordered: qty,
            exclusive_unit_cost: cost,
            inclusive_unit_cost: Decimal::ZERO,
            markup: Decimal::ZERO,
            exclusive_selling: Decimal::ZERO,
            inclusive_selling: Decimal::ZERO,
            vat_percentage: vat,
            discount1,
            discount2: Decimal::ZERO,
        }
    }

    #[test]
    fn line_totals_follow_subtotal_discount_vat_order() {
        let totals = item(10, dec!(4.00), dec!(10), dec!(15)).totals();
        assert_eq!(totals.subtotal, dec!(40.00));
        assert_eq!(totals.discount_amount, dec!(4.000));
        assert_eq!(totals.vat_amount, dec!(5.40000));
        assert_eq!(totals.line_total, dec!(41.40000));
    }

    #[test]
    fn zero_discount_and_vat_leave_subtotal_untouched() {
        let totals = item(3, dec!(2.50), Decimal::ZERO, Decimal::ZERO).totals();
        assert_eq!(totals.subtotal, dec!(7.50));
        assert_eq!(totals.line_total, dec!(7.50));
    }

    #[test]
    fn vat_applies_after_discount() {
        // 100 subtotal, 50% discount, 10% VAT: VAT is on 50, not 100.
        let totals = item(1, dec!(100), dec!(50), dec!(10)).totals();
        assert_eq!(totals.discount_amount, dec!(50));
        assert_eq!(totals.vat_amount, dec!(5.0));
    }
}
