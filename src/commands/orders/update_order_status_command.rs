use crate::{
    commands::{publish, Command},
    db::{DatabaseTarget, DbPool, PoolRegistry},
    entities::{cloud_order, order_line},
    errors::ServiceError,
    events::{Event, EventSender},
    sync::{Saga, SagaExecutor, SagaStep},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

lazy_static! {
    static ref STATUS_UPDATES: IntCounter = IntCounter::new(
        "order_status_updates_total",
        "Total number of order status updates"
    )
    .expect("metric can be created");
    static ref STATUS_UPDATE_FAILURES: IntCounter = IntCounter::new(
        "order_status_update_failures_total",
        "Total number of failed order status updates"
    )
    .expect("metric can be created");
}

/// Updates an order's received date, status, and amended quantity across both
/// databases. Each database gets one explicit transaction with commit or
/// rollback; the two transactions stay independent (no cross-database
/// atomicity). Parameters bind to the columns their names document — the
/// received date to the date column, the status to the status column.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderStatusCommand {
    #[validate(length(min = 1, message = "orderNo is required"))]
    pub order_no: String,
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
    pub received_date: DateTime<Utc>,
    #[validate(range(min = 0, message = "amended quantity must not be negative"))]
    pub amended_qty: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateOrderStatusResult {
    pub order_no: String,
    pub status: String,
}

#[async_trait::async_trait]
impl Command for UpdateOrderStatusCommand {
    type Result = UpdateOrderStatusResult;

    #[instrument(skip(self, registry, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            STATUS_UPDATE_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let saga = self.build_saga();
        SagaExecutor::new(registry).execute(saga).await.map_err(|e| {
            STATUS_UPDATE_FAILURES.inc();
            e
        })?;

        info!(order_no = %self.order_no, status = %self.status, "order status updated");
        publish(
            &event_sender,
            Event::OrderStatusUpdated {
                order_no: self.order_no.clone(),
                status: self.status.clone(),
            },
        )
        .await;
        STATUS_UPDATES.inc();

        Ok(UpdateOrderStatusResult {
            order_no: self.order_no.clone(),
            status: self.status.clone(),
        })
    }
}

impl UpdateOrderStatusCommand {
    fn build_saga(&self) -> Saga {
        let order_no = self.order_no.clone();

        let cloud_no = order_no.clone();
        let cloud_date = self.received_date;
        let cloud_qty = self.amended_qty;
        let cloud_step = SagaStep::new(
            "cloud_txn",
            DatabaseTarget::Cloud,
            Box::new(move |db| {
                Box::pin(async move {
                    in_transaction(&db, &DatabaseTarget::Cloud, |txn| {
                        let order_no = cloud_no.clone();
                        Box::pin(async move {
                            let result = cloud_order::Entity::update_many()
                                .set(cloud_order::ActiveModel {
                                    order_rcvd_date: Set(Some(cloud_date)),
                                    amended_qty: Set(cloud_qty),
                                    ..Default::default()
                                })
                                .filter(cloud_order::Column::OrderNo.eq(order_no))
                                .exec(txn)
                                .await
                                .map_err(|e| {
                                    ServiceError::persistence(&DatabaseTarget::Cloud, e)
                                })?;
                            Ok(result.rows_affected)
                        })
                    })
                    .await
                })
            }),
        );

        let line_no = order_no.clone();
        let line_date = self.received_date;
        let line_status = self.status.clone();
        let line_qty = self.amended_qty;
        let local_step = SagaStep::new(
            "local_txn",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    in_transaction(&db, &DatabaseTarget::Local, |txn| {
                        let order_no = line_no.clone();
                        let status = line_status.clone();
                        Box::pin(async move {
                            let result = order_line::Entity::update_many()
                                .set(order_line::ActiveModel {
                                    order_rcvd_date: Set(Some(line_date)),
                                    order_status: Set(Some(status)),
                                    amended_qty: Set(line_qty),
                                    ..Default::default()
                                })
                                .filter(order_line::Column::OrderNo.eq(order_no.as_str()))
                                .exec(txn)
                                .await
                                .map_err(|e| {
                                    ServiceError::persistence(&DatabaseTarget::Local, e)
                                })?;
                            if result.rows_affected == 0 {
                                return Err(ServiceError::NotFound(format!(
                                    "Order {order_no} not found"
                                )));
                            }
                            Ok(result.rows_affected)
                        })
                    })
                    .await
                })
            }),
        );

        Saga {
            order_no,
            transition: "update_status",
            steps: vec![cloud_step, local_step],
        }
    }
}

/// Runs `f` inside one transaction on `db`, committing on success and rolling
/// back on any failure before surfacing it.
async fn in_transaction<F>(
    db: &DbPool,
    target: &DatabaseTarget,
    f: F,
) -> Result<u64, ServiceError>
where
    F: for<'a> FnOnce(
        &'a DatabaseTransaction,
    )
        -> futures::future::BoxFuture<'a, Result<u64, ServiceError>>,
{
    let txn = db
        .begin()
        .await
        .map_err(|e| ServiceError::persistence(target, e))?;

    match f(&txn).await {
        Ok(rows) => {
            txn.commit()
                .await
                .map_err(|e| ServiceError::persistence(target, e))?;
            Ok(rows)
        }
        Err(err) => {
            if let Err(rb) = txn.rollback().await {
                error!(%target, "rollback failed after error: {rb}");
            }
            Err(err)
        }
    }
}
