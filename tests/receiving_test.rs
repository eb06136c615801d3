//! Goods-receipt reconciliation tests: GRN posting, additive stock-on-hand
//! adjustments, order completeness, and the discrepancy report.

mod common;

use assert_matches::assert_matches;
use common::TestEnv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use dispatch_api::commands::orders::CreateOrderCommand;
use dispatch_api::commands::receiving::{ConfirmReceiptCommand, ReceiptItem};
use dispatch_api::commands::Command;
use dispatch_api::entities::{grn_header, grn_line, order, order_line, stock_on_hand};
use dispatch_api::errors::ServiceError;
use dispatch_api::queries::{DiscrepancyReportQuery, Query};

async fn create_order(env: &TestEnv, qty: i32) -> String {
    CreateOrderCommand {
        store_name: "Store A".to_string(),
        stock_code: "SKU1".to_string(),
        stock_description: "Cola 330ml can".to_string(),
        major_no: 1,
        major_name: "Beverages".to_string(),
        sub1_no: 11,
        sub1_name: "Soft drinks".to_string(),
        order_qty: qty,
        rcvd_qty: None,
        amended_qty: None,
        final_qty: None,
        amended_shop: None,
        pack_size: None,
        placed_by: None,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("order creation")
    .order_no
}

fn receipt(order_no: &str, qty_received: i32, qty_ordered: i32) -> ConfirmReceiptCommand {
    ConfirmReceiptCommand {
        store_id: 1,
        order_no: order_no.to_string(),
        received_by: "store.clerk".to_string(),
        invoice_no: "INV-100".to_string(),
        supplier_code: "SUP-7".to_string(),
        shipping_charge: Decimal::ZERO,
        handling_charge: Decimal::ZERO,
        other_charge: Decimal::ZERO,
        items: vec![ReceiptItem {
            stock_code: "SKU1".to_string(),
            qty_received,
            bonus_qty: 0,
            qty_ordered,
            exclusive_unit_cost: dec!(4.00),
            inclusive_unit_cost: dec!(4.60),
            markup: dec!(25),
            exclusive_selling: dec!(5.00),
            inclusive_selling: dec!(5.75),
            vat_percentage: dec!(15),
            discount1: dec!(10),
            discount2: Decimal::ZERO,
        }],
    }
}

async fn stock_level(env: &TestEnv, stock_code: &str) -> i32 {
    stock_on_hand::Entity::find()
        .filter(stock_on_hand::Column::StockCode.eq(stock_code))
        .one(&env.local)
        .await
        .unwrap()
        .map(|row| row.qty_on_hand)
        .unwrap_or(0)
}

#[tokio::test]
async fn receipt_posts_grn_and_updates_stock_and_line() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, 10).await;

    let result = receipt(&order_no, 6, 10)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .expect("receipt");

    assert!(result.grv_no.starts_with("GRV-"));
    assert!(!result.complete, "6 of 10 received is not complete");

    let header = grn_header::Entity::find()
        .filter(grn_header::Column::GrvNo.eq(result.grv_no.as_str()))
        .one(&env.local)
        .await
        .unwrap()
        .expect("grn header");
    assert_eq!(header.order_no, order_no);
    assert_eq!(header.invoice_no, "INV-100");
    assert_eq!(header.sub_total, dec!(24.00));

    let lines = grn_line::Entity::find()
        .filter(grn_line::Column::GrvNo.eq(result.grv_no.as_str()))
        .all(&env.local)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].qty_received, 6);

    assert_eq!(stock_level(&env, "SKU1").await, 6);

    let line = order_line::Entity::find()
        .filter(order_line::Column::OrderNo.eq(order_no.as_str()))
        .one(&env.local)
        .await
        .unwrap()
        .expect("order line");
    assert_eq!(line.rcvd_qty, 6);

    let header = order::Entity::find()
        .filter(order::Column::OrderNo.eq(order_no.as_str()))
        .one(&env.local)
        .await
        .unwrap()
        .expect("order header");
    assert!(!header.order_complete);
}

#[tokio::test]
async fn sequential_receipts_accumulate_stock_on_hand() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, 10).await;

    receipt(&order_no, 6, 10)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .expect("first receipt");
    assert_eq!(stock_level(&env, "SKU1").await, 6);

    receipt(&order_no, 4, 10)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .expect("second receipt");
    assert_eq!(
        stock_level(&env, "SKU1").await,
        10,
        "adjustments are additive, never absolute"
    );
}

#[tokio::test]
async fn full_receipt_marks_order_complete() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, 10).await;

    let result = receipt(&order_no, 10, 10)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .expect("receipt");

    assert!(result.complete);
    let header = order::Entity::find()
        .filter(order::Column::OrderNo.eq(order_no.as_str()))
        .one(&env.local)
        .await
        .unwrap()
        .unwrap();
    assert!(header.order_complete);
}

#[tokio::test]
async fn receipt_for_unknown_order_writes_nothing() {
    let env = TestEnv::new().await;

    let result = receipt("ORD-0", 6, 10)
        .execute(env.registry.clone(), env.events.clone())
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert_eq!(grn_header::Entity::find().count(&env.local).await.unwrap(), 0);
    assert_eq!(grn_line::Entity::find().count(&env.local).await.unwrap(), 0);
    assert_eq!(
        stock_on_hand::Entity::find().count(&env.local).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn discrepancy_report_lists_the_shortfall() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, 10).await;

    receipt(&order_no, 6, 10)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .expect("receipt");

    let report = DiscrepancyReportQuery.execute(&env.registry).await.unwrap();
    let row = report
        .iter()
        .find(|r| r.order_no == order_no)
        .expect("shortfall row");
    assert_eq!(row.order_qty, 10);
    assert_eq!(row.rcvd_qty, 6);
    assert_eq!(row.missing_qty, 4);
}
