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
    static ref ORDER_PACKS: IntCounter =
        IntCounter::new("order_packs_total", "Total number of orders packed")
            .expect("metric can be created");
    static ref ORDER_PACK_FAILURES: IntCounter = IntCounter::new(
        "order_pack_failures_total",
        "Total number of failed order packs"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PackOrderCommand {
    #[validate(length(min = 1, message = "orderNo is required"))]
    pub order_no: String,
    #[validate(length(min = 1, message = "packedBy is required"))]
    pub packed_by: String,
    #[validate(range(min = 0, message = "amended quantity must not be negative"))]
    pub amended_qty: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackOrderResult {
    pub order_no: String,
    pub amended_qty: i32,
    pub packed_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for PackOrderCommand {
    type Result = PackOrderResult;

    #[instrument(skip(self, registry, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_PACK_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let now = Utc::now();
        let saga = self.build_saga(now);
        SagaExecutor::new(registry).execute(saga).await.map_err(|e| {
            ORDER_PACK_FAILURES.inc();
            e
        })?;

        info!(order_no = %self.order_no, amended_qty = self.amended_qty, "order packed");
        publish(
            &event_sender,
            Event::OrderPacked {
                order_no: self.order_no.clone(),
                packed_by: self.packed_by.clone(),
            },
        )
        .await;
        ORDER_PACKS.inc();

        Ok(PackOrderResult {
            order_no: self.order_no.clone(),
            amended_qty: self.amended_qty,
            packed_at: now,
        })
    }
}

impl PackOrderCommand {
    fn build_saga(&self, now: DateTime<Utc>) -> Saga {
        let order_no = self.order_no.clone();
        let amended_qty = self.amended_qty;

        let cloud_no = order_no.clone();
        let cloud_by = self.packed_by.clone();
        let cloud_step = SagaStep::new(
            "cloud_mirror",
            DatabaseTarget::Cloud,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = cloud_order::Entity::update_many()
                        .set(cloud_order::ActiveModel {
                            amended_qty: Set(amended_qty),
                            order_packed_by: Set(Some(cloud_by)),
                            order_packed_date: Set(Some(now)),
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

        // The header is the existence check; a header without a line is a
        // tolerated divergence, so the line update may touch zero rows.
        let header_no = order_no.clone();
        let header_by = self.packed_by.clone();
        let header_step = SagaStep::new(
            "local_header",
            DatabaseTarget::Local,
            Box::new(move |db| {
                Box::pin(async move {
                    let result = order::Entity::update_many()
                        .set(order::ActiveModel {
                            order_packed_by: Set(Some(header_by)),
                            order_packed_date: Set(Some(now)),
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
                            amended_qty: Set(amended_qty),
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
            transition: "pack",
            steps: vec![cloud_step, header_step, line_step],
        }
    }
}
