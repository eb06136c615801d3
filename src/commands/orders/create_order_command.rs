use crate::{
    commands::{publish, Command},
    db::{DatabaseTarget, PoolRegistry},
    entities::{cloud_order, order, order_box, order_line, store},
    errors::ServiceError,
    events::{Event, EventSender},
    lifecycle, packing,
    sync::{Saga, SagaExecutor, SagaStep},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

lazy_static! {
    static ref ORDER_CREATIONS: IntCounter =
        IntCounter::new("order_creations_total", "Total number of orders created")
            .expect("metric can be created");
    static ref ORDER_CREATION_FAILURES: IntCounter = IntCounter::new(
        "order_creation_failures_total",
        "Total number of failed order creations"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderCommand {
    #[validate(length(min = 1, message = "storeName is required"))]
    pub store_name: String,
    pub stock_code: String,
    pub stock_description: String,
    #[serde(default)]
    pub major_no: i32,
    #[serde(default)]
    pub major_name: String,
    #[serde(default)]
    pub sub1_no: i32,
    #[serde(default)]
    pub sub1_name: String,
    #[validate(range(min = 0, message = "order quantity must not be negative"))]
    pub order_qty: i32,
    #[validate(range(min = 0))]
    pub rcvd_qty: Option<i32>,
    #[validate(range(min = 0))]
    pub amended_qty: Option<i32>,
    #[validate(range(min = 0))]
    pub final_qty: Option<i32>,
    pub amended_shop: Option<String>,
    /// Explicit catalog pack size; when absent the stock description is
    /// parsed for a numeric token as a legacy fallback.
    pub pack_size: Option<i64>,
    pub placed_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResult {
    pub order_no: String,
    pub store_name: String,
    pub boxes: usize,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = CreateOrderResult;

    #[instrument(skip(self, registry, event_sender), fields(store_name = %self.store_name))]
    async fn execute(
        &self,
        registry: Arc<PoolRegistry>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_CREATION_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let local = registry.local();

        // Reject unknown stores before any write begins.
        store::Entity::find()
            .filter(store::Column::StoreName.eq(self.store_name.as_str()))
            .one(&local)
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?
            .ok_or_else(|| {
                ORDER_CREATION_FAILURES.inc();
                ServiceError::ValidationError(format!("Invalid storeName: {}", self.store_name))
            })?;

        let order_no = lifecycle::order_number();
        let now = Utc::now();

        let boxes = packing::allocate(
            &local,
            &order_no,
            &self.stock_code,
            &self.stock_description,
            self.pack_size,
            self.order_qty,
        )
        .await?;
        let box_count = boxes.len();

        let saga = self.build_saga(&order_no, now, boxes);
        SagaExecutor::new(registry).execute(saga).await.map_err(|e| {
            ORDER_CREATION_FAILURES.inc();
            e
        })?;

        info!(%order_no, store_name = %self.store_name, boxes = box_count, "order created");
        publish(
            &event_sender,
            Event::OrderCreated {
                order_no: order_no.clone(),
                store_name: self.store_name.clone(),
            },
        )
        .await;
        ORDER_CREATIONS.inc();

        Ok(CreateOrderResult {
            order_no,
            store_name: self.store_name.clone(),
            boxes: box_count,
            created_at: now,
        })
    }
}

impl CreateOrderCommand {
    /// Assembles the creation saga: cloud mirror, then local header, then
    /// local line, then box rows. The write order is fixed — if the warehouse
    /// cannot see the order, the local side must not proceed.
    fn build_saga(
        &self,
        order_no: &str,
        now: DateTime<Utc>,
        boxes: Vec<packing::BoxPlan>,
    ) -> Saga {
        let final_qty = self.final_qty.unwrap_or(self.order_qty);
        let placed_by = self
            .placed_by
            .clone()
            .unwrap_or_else(|| "System".to_string());

        let cloud_row = cloud_order::ActiveModel {
            order_no: Set(order_no.to_string()),
            store_name: Set(self.store_name.clone()),
            date_time: Set(now),
            placed_by: Set(placed_by.clone()),
            stock_code: Set(self.stock_code.clone()),
            stock_description: Set(self.stock_description.clone()),
            major_no: Set(self.major_no),
            major_name: Set(self.major_name.clone()),
            sub1_no: Set(self.sub1_no),
            sub1_name: Set(self.sub1_name.clone()),
            order_qty: Set(self.order_qty),
            rcvd_qty: Set(self.rcvd_qty.unwrap_or(0)),
            amended_qty: Set(self.amended_qty.unwrap_or(0)),
            final_qty: Set(final_qty),
            amended_shop: Set(self.amended_shop.clone()),
            order_complete: Set(false),
            ..Default::default()
        };

        let header_row = order::ActiveModel {
            order_no: Set(order_no.to_string()),
            store_name: Set(self.store_name.clone()),
            date_time: Set(now),
            placed_by: Set(placed_by),
            order_complete: Set(false),
            ..Default::default()
        };

        let line_row = order_line::ActiveModel {
            order_no: Set(order_no.to_string()),
            date_time: Set(now),
            stock_code: Set(self.stock_code.clone()),
            stock_description: Set(self.stock_description.clone()),
            major_no: Set(self.major_no),
            major_name: Set(self.major_name.clone()),
            sub1_no: Set(self.sub1_no),
            sub1_name: Set(self.sub1_name.clone()),
            order_qty: Set(self.order_qty),
            rcvd_qty: Set(self.rcvd_qty.unwrap_or(0)),
            amended_qty: Set(self.amended_qty.unwrap_or(0)),
            final_qty: Set(final_qty),
            amended_shop: Set(self.amended_shop.clone()),
            ..Default::default()
        };

        let box_rows: Vec<order_box::ActiveModel> = boxes
            .into_iter()
            .map(|plan| order_box::ActiveModel {
                order_no: Set(order_no.to_string()),
                stock_code: Set(self.stock_code.clone()),
                box_no: Set(plan.box_no),
                box_code_qty: Set(plan.box_code_qty),
                box_total_qty: Set(plan.box_total_qty),
                done_and_printed: Set(false),
                ..Default::default()
            })
            .collect();

        let mut steps = vec![
            SagaStep::new(
                "cloud_mirror",
                DatabaseTarget::Cloud,
                Box::new(move |db| {
                    Box::pin(async move {
                        cloud_row
                            .insert(&db)
                            .await
                            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Cloud, e))?;
                        Ok(1)
                    })
                }),
            ),
            SagaStep::new(
                "local_header",
                DatabaseTarget::Local,
                Box::new(move |db| {
                    Box::pin(async move {
                        header_row
                            .insert(&db)
                            .await
                            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                        Ok(1)
                    })
                }),
            ),
            SagaStep::new(
                "local_line",
                DatabaseTarget::Local,
                Box::new(move |db| {
                    Box::pin(async move {
                        line_row
                            .insert(&db)
                            .await
                            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                        Ok(1)
                    })
                }),
            ),
        ];

        if !box_rows.is_empty() {
            let count = box_rows.len() as u64;
            steps.push(SagaStep::new(
                "local_boxes",
                DatabaseTarget::Local,
                Box::new(move |db| {
                    Box::pin(async move {
                        order_box::Entity::insert_many(box_rows)
                            .exec(&db)
                            .await
                            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
                        Ok(count)
                    })
                }),
            ));
        }

        Saga {
            order_no: order_no.to_string(),
            transition: "create",
            steps,
        }
    }
}
