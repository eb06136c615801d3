use crate::{
    commands::{publish, Command},
    db::{DatabaseTarget, PoolRegistry},
    entities::{cloud_order, order, order_line},
    errors::ServiceError,
    events::{Event, EventSender},
    sync::{self, Saga, SagaExecutor, SagaStep},
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
    static ref ORDER_DISPATCHES: IntCounter = IntCounter::new(
        "order_dispatches_total",
        "Total number of orders dispatched"
    )
    .expect("metric can be created");
    static ref ORDER_DISPATCH_FAILURES: IntCounter = IntCounter::new(
        "order_dispatch_failures_total",
        "Total number of failed order dispatches"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchOrderCommand {
    #[validate(length(min = 1, message = "orderNo is required"))]
    pub order_no: String,
    #[validate(length(min = 1, message = "dispatchedBy is required"))]
    pub dispatched_by: String,
    #[validate(range(min = 0, message = "final quantity must not be negative"))]
    pub final_qty: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchOrderResult {
    pub order_no: String,
    pub final_qty: i32,
    pub dispatched_at: DateTime<Utc>,
    /// Non-fatal follow-up failures (store mirror sync). The dispatch itself
    /// succeeded; callers surface these without failing the response.
    pub warnings: Vec<String>,
}

#[async_trait::async_trait]
impl Command for DispatchOrderCommand {
    type Result = DispatchOrderResult;

    #[instrument(skip(self, registry, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_DISPATCH_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let now = Utc::now();
        let saga = self.build_saga(now);
        SagaExecutor::new(registry.clone())
            .execute(saga)
            .await
            .map_err(|e| {
                ORDER_DISPATCH_FAILURES.inc();
                e
            })?;

        // Best-effort replication to the store's own database. Runs after the
        // primary writes committed; failure is a warning, not an error.
        let mut warnings = Vec::new();
        if let Some(warning) = sync::sync_store_mirror(
            &registry,
            &event_sender,
            &self.order_no,
            &self.dispatched_by,
            now,
        )
        .await
        {
            warnings.push(warning);
        }

        info!(order_no = %self.order_no, final_qty = self.final_qty, "order dispatched");
        publish(
            &event_sender,
            Event::OrderDispatched {
                order_no: self.order_no.clone(),
                dispatched_by: self.dispatched_by.clone(),
            },
        )
        .await;
        ORDER_DISPATCHES.inc();

        Ok(DispatchOrderResult {
            order_no: self.order_no.clone(),
            final_qty: self.final_qty,
            dispatched_at: now,
            warnings,
        })
    }
}

impl DispatchOrderCommand {
    fn build_saga(&self, now: DateTime<Utc>) -> Saga {
        let order_no = self.order_no.clone();
        let final_qty = self.final_qty;

        let cloud_no = order_no.clone();
        let cloud_by = self.dispatched_by.clone();
        let cloud_step = SagaStep::new(
            "cloud_mirror",
            DatabaseTarget::Cloud,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = cloud_order::Entity::update_many()
                        .set(cloud_order::ActiveModel {
                            final_qty: Set(final_qty),
                            order_dispatch_by: Set(Some(cloud_by)),
                            order_dispatched_date: Set(Some(now)),
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
        let header_by = self.dispatched_by.clone();
        let header_step = SagaStep::new(
            "local_header",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = order::Entity::update_many()
                        .set(order::ActiveModel {
                            order_dispatch_by: Set(Some(header_by)),
                            order_dispatched_date: Set(Some(now)),
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
                            final_qty: Set(final_qty),
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
            transition: "dispatch",
            steps: vec![cloud_step, header_step, line_step],
        }
    }
}
