use crate::{
    commands::{publish, Command},
    db::{DatabaseTarget, PoolRegistry},
    entities::{cloud_order, order, order_line},
    errors::ServiceError,
    events::{Event, EventSender},
    sync::{Saga, SagaExecutor, SagaStep},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

lazy_static! {
    static ref ORDER_RECEIVES: IntCounter =
        IntCounter::new("order_receives_total", "Total number of orders received")
            .expect("metric can be created");
    static ref ORDER_RECEIVE_FAILURES: IntCounter = IntCounter::new(
        "order_receive_failures_total",
        "Total number of failed order receives"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveOrderCommand {
    #[validate(length(min = 1, message = "orderNo is required"))]
    pub order_no: String,
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
    pub received_date: DateTime<Utc>,
    #[validate(range(min = 0, message = "received quantity must not be negative"))]
    pub received_qty: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveOrderResult {
    pub order_no: String,
    pub received_qty: i32,
}

#[async_trait::async_trait]
impl Command for ReceiveOrderCommand {
    type Result = ReceiveOrderResult;

    #[instrument(skip(self, registry, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_RECEIVE_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let saga = self.build_saga();
        SagaExecutor::new(registry).execute(saga).await.map_err(|e| {
            ORDER_RECEIVE_FAILURES.inc();
            e
        })?;

        info!(order_no = %self.order_no, received_qty = self.received_qty, "order received");
        publish(
            &event_sender,
            Event::OrderReceived {
                order_no: self.order_no.clone(),
            },
        )
        .await;
        ORDER_RECEIVES.inc();

        Ok(ReceiveOrderResult {
            order_no: self.order_no.clone(),
            received_qty: self.received_qty,
        })
    }
}

impl ReceiveOrderCommand {
    fn build_saga(&self) -> Saga {
        let order_no = self.order_no.clone();
        let received_date = self.received_date;
        let received_qty = self.received_qty;

        let cloud_no = order_no.clone();
        let cloud_step = SagaStep::new(
            "cloud_mirror",
            DatabaseTarget::Cloud,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = cloud_order::Entity::update_many()
                        .set(cloud_order::ActiveModel {
                            rcvd_qty: Set(received_qty),
                            order_rcvd_date: Set(Some(received_date)),
                            order_complete: Set(true),
                            ..Default::default()
                        })
                        .filter(cloud_order::Column::OrderNo.eq(cloud_no))
                        .exec(&db)
                        .await
                        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Cloud, e))?;
                    Ok(result.rows_affected)
                })
            }),
        );

        let header_no = order_no.clone();
        let header_step = SagaStep::new(
            "local_header",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = order::Entity::update_many()
                        .set(order::ActiveModel {
                            order_rcvd_date: Set(Some(received_date)),
                            order_complete: Set(true),
                            ..Default::default()
                        })
                        .filter(order::Column::OrderNo.eq(header_no.as_str()))
                        .exec(&db)
                        .await
                        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                    if result.rows_affected == 0 {
                        return Err(ServiceError::NotFound(format!(
                            "Order {header_no} not found"
                        )));
                    }
                    Ok(result.rows_affected)
                })
            }),
        );

        let line_no = order_no.clone();
        let status = self.status.clone();
        let line_step = SagaStep::new(
            "local_line",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = order_line::Entity::update_many()
                        .set(order_line::ActiveModel {
                            rcvd_qty: Set(received_qty),
                            order_rcvd_date: Set(Some(received_date)),
                            order_status: Set(Some(status)),
                            ..Default::default()
                        })
                        .filter(order_line::Column::OrderNo.eq(line_no))
                        .exec(&db)
                        .await
                        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                    Ok(result.rows_affected)
                })
            }),
        );

        Saga {
            order_no,
            transition: "receive",
            steps: vec![cloud_step, header_step, line_step],
        }
    }
}
