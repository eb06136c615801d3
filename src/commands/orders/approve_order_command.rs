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
    static ref ORDER_APPROVALS: IntCounter =
        IntCounter::new("order_approvals_total", "Total number of orders approved")
            .expect("metric can be created");
    static ref ORDER_APPROVAL_FAILURES: IntCounter = IntCounter::new(
        "order_approval_failures_total",
        "Total number of failed order approvals"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApproveOrderCommand {
    #[validate(length(min = 1, message = "orderNo is required"))]
    pub order_no: String,
    #[validate(range(min = 0, message = "approved quantity must not be negative"))]
    pub approved_qty: i32,
    #[validate(length(min = 1, message = "approvedBy is required"))]
    pub approved_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveOrderResult {
    pub order_no: String,
    pub final_qty: i32,
    pub approved_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for ApproveOrderCommand {
    type Result = ApproveOrderResult;

    #[instrument(skip(self, registry, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_APPROVAL_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let now = Utc::now();
        let saga = self.build_saga(now);
        SagaExecutor::new(registry).execute(saga).await.map_err(|e| {
            ORDER_APPROVAL_FAILURES.inc();
            e
        })?;

        info!(order_no = %self.order_no, final_qty = self.approved_qty, "order approved");
        publish(
            &event_sender,
            Event::OrderApproved {
                order_no: self.order_no.clone(),
                approved_by: self.approved_by.clone(),
            },
        )
        .await;
        ORDER_APPROVALS.inc();

        Ok(ApproveOrderResult {
            order_no: self.order_no.clone(),
            final_qty: self.approved_qty,
            approved_at: now,
        })
    }
}

impl ApproveOrderCommand {
    fn build_saga(&self, now: DateTime<Utc>) -> Saga {
        let order_no = self.order_no.clone();
        let approved_by = self.approved_by.clone();
        let approved_qty = self.approved_qty;

        // Cloud mirror first. Zero rows there is tolerated (the mirror may
        // never have been written); the local header and line are the rows
        // whose absence means the order does not exist.
        let cloud_no = order_no.clone();
        let cloud_by = approved_by.clone();
        let cloud_step = SagaStep::new(
            "cloud_mirror",
            DatabaseTarget::Cloud,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = cloud_order::Entity::update_many()
                        .set(cloud_order::ActiveModel {
                            final_qty: Set(approved_qty),
                            order_complete: Set(true),
                            order_approved_by: Set(Some(cloud_by)),
                            order_approved_date: Set(Some(now)),
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
        let header_by = approved_by;
        let header_step = SagaStep::new(
            "local_header",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = order::Entity::update_many()
                        .set(order::ActiveModel {
                            order_complete: Set(true),
                            order_approved_by: Set(Some(header_by)),
                            order_approved_date: Set(Some(now)),
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
        let line_step = SagaStep::new(
            "local_line",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = order_line::Entity::update_many()
                        .set(order_line::ActiveModel {
                            final_qty: Set(approved_qty),
                            ..Default::default()
                        })
                        .filter(order_line::Column::OrderNo.eq(line_no.as_str()))
                        .exec(&db)
                        .await
                        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                    if result.rows_affected == 0 {
                        return Err(ServiceError::NotFound(format!(
                            "No order line for {line_no}"
                        )));
                    }
                    Ok(result.rows_affected)
                })
            }),
        );

        Saga {
            order_no,
            transition: "approve",
            steps: vec![cloud_step, header_step, line_step],
        }
    }
}
