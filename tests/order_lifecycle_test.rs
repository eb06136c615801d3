//! End-to-end tests for the order lifecycle against in-memory cloud and
//! local databases: creation, approval, packing, dispatch (with the
//! best-effort store mirror), receipt, and the dual-write failure policy.

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::TestEnv;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use dispatch_api::commands::orders::{
    ApproveOrderCommand, CreateOrderCommand, DispatchOrderCommand, PackOrderCommand,
    ReceiveOrderCommand, UpdateOrderStatusCommand,
};
use dispatch_api::commands::Command;
use dispatch_api::entities::{cloud_order, order, order_box, order_line, store, sync_journal};
use dispatch_api::errors::ServiceError;
use dispatch_api::sync;

fn create_command(store_name: &str, qty: i32) -> CreateOrderCommand {
    CreateOrderCommand {
        store_name: store_name.to_string(),
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
}

async fn create_order(env: &TestEnv, store_name: &str, qty: i32) -> String {
    create_command(store_name, qty)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .expect("order creation")
        .order_no
}

async fn local_header(env: &TestEnv, order_no: &str) -> order::Model {
    order::Entity::find()
        .filter(order::Column::OrderNo.eq(order_no))
        .one(&env.local)
        .await
        .unwrap()
        .expect("local header")
}

async fn local_line(env: &TestEnv, order_no: &str) -> order_line::Model {
    order_line::Entity::find()
        .filter(order_line::Column::OrderNo.eq(order_no))
        .one(&env.local)
        .await
        .unwrap()
        .expect("local line")
}

async fn cloud_row(env: &TestEnv, order_no: &str) -> cloud_order::Model {
    cloud_order::Entity::find()
        .filter(cloud_order::Column::OrderNo.eq(order_no))
        .one(&env.cloud)
        .await
        .unwrap()
        .expect("cloud mirror row")
}

#[tokio::test]
async fn create_mirrors_to_cloud_and_writes_local_rows() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;

    let order_no = create_order(&env, "Store A", 10).await;

    let digits = order_no.strip_prefix("ORD-").expect("ORD- prefix");
    assert!(digits.chars().all(|c| c.is_ascii_digit()));

    let header = local_header(&env, &order_no).await;
    assert_eq!(header.store_name, "Store A");
    assert!(!header.order_complete);

    let line = local_line(&env, &order_no).await;
    assert_eq!(line.order_qty, 10);
    assert_eq!(line.final_qty, 10, "final qty defaults to ordered qty");
    assert_eq!(line.rcvd_qty, 0);

    let mirror = cloud_row(&env, &order_no).await;
    assert_eq!(mirror.order_qty, 10);
    assert_eq!(mirror.store_name, "Store A");

    let journal = sync_journal::Entity::find()
        .filter(sync_journal::Column::OrderNo.eq(order_no.as_str()))
        .one(&env.local)
        .await
        .unwrap()
        .expect("journal row");
    assert_eq!(journal.transition, "create");
    assert!(journal.completed);
}

#[tokio::test]
async fn identical_payloads_create_two_distinct_orders() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;

    let first = create_order(&env, "Store A", 5).await;
    let second = create_order(&env, "Store A", 5).await;

    assert_ne!(first, second, "create is not idempotent by design");
    assert_eq!(
        order::Entity::find().count(&env.local).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn create_rejects_unknown_store_before_any_write() {
    let env = TestEnv::new().await;

    let err = create_command("Nowhere", 3)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(order::Entity::find().count(&env.local).await.unwrap(), 0);
    assert_eq!(
        cloud_order::Entity::find().count(&env.cloud).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn box_allocation_numbers_boxes_sequentially() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    env.seed_pack_size(330, 24).await;

    let order_no = create_order(&env, "Store A", 50).await;

    let boxes = order_box::Entity::find()
        .filter(order_box::Column::OrderNo.eq(order_no.as_str()))
        .order_by_asc(order_box::Column::BoxNo)
        .all(&env.local)
        .await
        .unwrap();

    let numbers: Vec<i32> = boxes.iter().map(|b| b.box_no).collect();
    let totals: Vec<i32> = boxes.iter().map(|b| b.box_total_qty).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(totals, vec![24, 24, 2]);
    assert!(boxes.iter().all(|b| b.box_code_qty == 24));
}

#[tokio::test]
async fn unknown_pack_size_still_creates_a_zero_box() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    // No pack_sizes reference row seeded.

    let order_no = create_order(&env, "Store A", 10).await;

    let boxes = order_box::Entity::find()
        .filter(order_box::Column::OrderNo.eq(order_no.as_str()))
        .all(&env.local)
        .await
        .unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].box_no, 1);
    assert_eq!(boxes[0].box_total_qty, 0);
}

#[tokio::test]
async fn approve_sets_final_qty_completes_header_and_updates_mirror() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    ApproveOrderCommand {
        order_no: order_no.clone(),
        approved_qty: 8,
        approved_by: "warehouse.sup".to_string(),
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("approve");

    let header = local_header(&env, &order_no).await;
    assert!(header.order_complete);
    assert_eq!(header.order_approved_by.as_deref(), Some("warehouse.sup"));
    assert!(header.order_approved_date.is_some());

    assert_eq!(local_line(&env, &order_no).await.final_qty, 8);
    assert_eq!(cloud_row(&env, &order_no).await.final_qty, 8);
}

#[tokio::test]
async fn lifecycle_ops_on_missing_order_mutate_nothing() {
    let env = TestEnv::new().await;

    let approve = ApproveOrderCommand {
        order_no: "ORD-0".to_string(),
        approved_qty: 1,
        approved_by: "nobody".to_string(),
    }
    .execute(env.registry.clone(), env.events.clone())
    .await;
    assert_matches!(approve, Err(ServiceError::NotFound(_)));

    let pack = PackOrderCommand {
        order_no: "ORD-0".to_string(),
        packed_by: "nobody".to_string(),
        amended_qty: 1,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await;
    assert_matches!(pack, Err(ServiceError::NotFound(_)));

    let dispatch = DispatchOrderCommand {
        order_no: "ORD-0".to_string(),
        dispatched_by: "nobody".to_string(),
        final_qty: 1,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await;
    assert_matches!(dispatch, Err(ServiceError::NotFound(_)));

    assert_eq!(order::Entity::find().count(&env.local).await.unwrap(), 0);
    assert_eq!(
        cloud_order::Entity::find().count(&env.cloud).await.unwrap(),
        0
    );
    assert_eq!(
        sync_journal::Entity::find().count(&env.local).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn pack_stamps_packer_and_records_amended_qty() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    PackOrderCommand {
        order_no: order_no.clone(),
        packed_by: "packer.one".to_string(),
        amended_qty: 9,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("pack");

    let header = local_header(&env, &order_no).await;
    assert_eq!(header.order_packed_by.as_deref(), Some("packer.one"));
    assert!(header.order_packed_date.is_some());
    assert_eq!(local_line(&env, &order_no).await.amended_qty, 9);
}

#[tokio::test]
async fn dispatch_succeeds_with_warning_when_store_is_unregistered() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    // The store disappears from the registry before dispatch; the mirror
    // replay has nowhere to go.
    store::Entity::delete_many().exec(&env.local).await.unwrap();

    let result = DispatchOrderCommand {
        order_no: order_no.clone(),
        dispatched_by: "driver.two".to_string(),
        final_qty: 10,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("dispatch succeeds despite mirror failure");

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("not registered"));

    let header = local_header(&env, &order_no).await;
    assert_eq!(header.order_dispatch_by.as_deref(), Some("driver.two"));
    assert!(header.order_dispatched_date.is_some());
}

#[tokio::test]
async fn dispatch_replays_stamps_onto_store_mirror() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    let mirror = env.attach_store_mirror("Store A").await;
    let local_row = local_header(&env, &order_no).await;
    order::ActiveModel {
        order_no: Set(local_row.order_no.clone()),
        store_name: Set(local_row.store_name.clone()),
        date_time: Set(local_row.date_time),
        placed_by: Set(local_row.placed_by.clone()),
        order_complete: Set(false),
        ..Default::default()
    }
    .insert(&mirror)
    .await
    .unwrap();

    let result = DispatchOrderCommand {
        order_no: order_no.clone(),
        dispatched_by: "driver.two".to_string(),
        final_qty: 10,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("dispatch");

    assert!(result.warnings.is_empty());

    let mirrored = order::Entity::find()
        .filter(order::Column::OrderNo.eq(order_no.as_str()))
        .one(&mirror)
        .await
        .unwrap()
        .expect("mirrored header");
    assert_eq!(mirrored.order_dispatch_by.as_deref(), Some("driver.two"));
    assert!(mirrored.order_dispatched_date.is_some());
}

#[tokio::test]
async fn dispatch_mirror_zero_rows_is_reported_as_warning() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    // Mirror database exists but holds no row for this order.
    env.attach_store_mirror("Store A").await;

    let result = DispatchOrderCommand {
        order_no,
        dispatched_by: "driver.two".to_string(),
        final_qty: 10,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("dispatch");

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("no row"));
}

#[tokio::test]
async fn receive_stamps_dates_and_flips_complete() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    ReceiveOrderCommand {
        order_no: order_no.clone(),
        status: "received".to_string(),
        received_date: Utc::now(),
        received_qty: 10,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("receive");

    let header = local_header(&env, &order_no).await;
    assert!(header.order_complete);
    assert!(header.order_rcvd_date.is_some());

    let line = local_line(&env, &order_no).await;
    assert_eq!(line.rcvd_qty, 10);
    assert_eq!(line.order_status.as_deref(), Some("received"));

    let mirror = cloud_row(&env, &order_no).await;
    assert!(mirror.order_complete);
    assert_eq!(mirror.rcvd_qty, 10);
}

#[tokio::test]
async fn update_order_status_writes_both_databases() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;
    let order_no = create_order(&env, "Store A", 10).await;

    UpdateOrderStatusCommand {
        order_no: order_no.clone(),
        status: "delivered".to_string(),
        received_date: Utc::now(),
        amended_qty: 7,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await
    .expect("status update");

    let line = local_line(&env, &order_no).await;
    assert_eq!(line.order_status.as_deref(), Some("delivered"));
    assert_eq!(line.amended_qty, 7);
    assert!(line.order_rcvd_date.is_some());

    let mirror = cloud_row(&env, &order_no).await;
    assert_eq!(mirror.amended_qty, 7);
    assert!(mirror.order_rcvd_date.is_some());
}

#[tokio::test]
async fn update_order_status_on_missing_order_is_not_found() {
    let env = TestEnv::new().await;

    let result = UpdateOrderStatusCommand {
        order_no: "ORD-0".to_string(),
        status: "delivered".to_string(),
        received_date: Utc::now(),
        amended_qty: 7,
    }
    .execute(env.registry.clone(), env.events.clone())
    .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn cloud_failure_aborts_before_any_local_write() {
    let env = TestEnv::new().await;
    env.seed_store("Store A").await;

    // Take the cloud database away; the fixed write order puts it first.
    env.cloud.clone().close().await.unwrap();

    let err = create_command("Store A", 10)
        .execute(env.registry.clone(), env.events.clone())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PersistenceError { ref target, .. } if target == "cloud");
    assert_eq!(order::Entity::find().count(&env.local).await.unwrap(), 0);
    assert_eq!(
        order_line::Entity::find().count(&env.local).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn half_applied_transition_is_visible_in_pending_sync() {
    let env = TestEnv::new().await;

    // A mirror row with no local counterpart: the divergence the reads
    // tolerate but the writes surface.
    cloud_order::ActiveModel {
        order_no: Set("ORD-7700000000001".to_string()),
        store_name: Set("Store A".to_string()),
        date_time: Set(Utc::now()),
        placed_by: Set("System".to_string()),
        stock_code: Set("SKU1".to_string()),
        stock_description: Set("Cola 330ml can".to_string()),
        major_no: Set(1),
        major_name: Set("Beverages".to_string()),
        sub1_no: Set(11),
        sub1_name: Set("Soft drinks".to_string()),
        order_qty: Set(10),
        rcvd_qty: Set(0),
        amended_qty: Set(0),
        final_qty: Set(10),
        amended_shop: Set(None),
        order_complete: Set(false),
        ..Default::default()
    }
    .insert(&env.cloud)
    .await
    .unwrap();

    let result = ApproveOrderCommand {
        order_no: "ORD-7700000000001".to_string(),
        approved_qty: 8,
        approved_by: "warehouse.sup".to_string(),
    }
    .execute(env.registry.clone(), env.events.clone())
    .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let pending = sync::pending_transitions(&env.registry).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order_no, "ORD-7700000000001");
    assert_eq!(pending[0].transition, "approve");
    assert_eq!(pending[0].last_step.as_deref(), Some("cloud_mirror"));
    assert!(!pending[0].completed);
}
