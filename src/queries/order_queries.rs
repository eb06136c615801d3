use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::{
    db::{DatabaseTarget, PoolRegistry},
    entities::{cloud_order, order, order_line},
    errors::ServiceError,
};

/// Stock descriptions are capped on read; some legacy rows carry free text
/// far longer than any UI can show.
const DESCRIPTION_CAP: usize = 256;

/// Trait representing a generic asynchronous read against the registry.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, registry: &PoolRegistry) -> Result<Self::Result, ServiceError>;
}

/// Local order headers, newest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListOrdersQuery;

#[async_trait]
impl Query for ListOrdersQuery {
    type Result = Vec<order::Model>;

    #[instrument(skip(self, registry))]
    async fn execute(&self, registry: &PoolRegistry) -> Result<Self::Result, ServiceError> {
        order::Entity::find()
            .order_by_desc(order::Column::DateTime)
            .all(&registry.local())
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))
    }
}

/// One merged order row as presented to callers. Cloud rows and local
/// header⟕line rows share this shape; fields a side does not carry are null
/// rather than dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_no: String,
    pub source: String,
    pub store_name: Option<String>,
    pub date_time: Option<DateTime<Utc>>,
    pub placed_by: Option<String>,
    pub order_complete: Option<bool>,
    pub order_approved_by: Option<String>,
    pub order_approved_date: Option<DateTime<Utc>>,
    pub order_packed_by: Option<String>,
    pub order_packed_date: Option<DateTime<Utc>>,
    pub order_dispatch_by: Option<String>,
    pub order_dispatched_date: Option<DateTime<Utc>>,
    pub order_rcvd_date: Option<DateTime<Utc>>,
    pub stock_code: Option<String>,
    pub stock_description: Option<String>,
    pub major_no: Option<i32>,
    pub major_name: Option<String>,
    pub sub1_no: Option<i32>,
    pub sub1_name: Option<String>,
    pub order_qty: Option<i32>,
    pub rcvd_qty: Option<i32>,
    pub amended_qty: Option<i32>,
    pub final_qty: Option<i32>,
    pub amended_shop: Option<String>,
}

fn cap_description(desc: &str) -> String {
    desc.chars().take(DESCRIPTION_CAP).collect()
}

impl OrderRow {
    fn from_cloud(model: cloud_order::Model) -> Self {
        Self {
            order_no: model.order_no,
            source: "cloud".to_string(),
            store_name: Some(model.store_name),
            date_time: Some(model.date_time),
            placed_by: Some(model.placed_by),
            order_complete: Some(model.order_complete),
            order_approved_by: model.order_approved_by,
            order_approved_date: model.order_approved_date,
            order_packed_by: model.order_packed_by,
            order_packed_date: model.order_packed_date,
            order_dispatch_by: model.order_dispatch_by,
            order_dispatched_date: model.order_dispatched_date,
            order_rcvd_date: model.order_rcvd_date,
            stock_code: Some(model.stock_code),
            stock_description: Some(cap_description(&model.stock_description)),
            major_no: Some(model.major_no),
            major_name: Some(model.major_name),
            sub1_no: Some(model.sub1_no),
            sub1_name: Some(model.sub1_name),
            order_qty: Some(model.order_qty),
            rcvd_qty: Some(model.rcvd_qty),
            amended_qty: Some(model.amended_qty),
            final_qty: Some(model.final_qty),
            amended_shop: model.amended_shop,
        }
    }

    fn from_local(header: &order::Model, line: Option<&order_line::Model>) -> Self {
        Self {
            order_no: header.order_no.clone(),
            source: "local".to_string(),
            store_name: Some(header.store_name.clone()),
            date_time: Some(header.date_time),
            placed_by: Some(header.placed_by.clone()),
            order_complete: Some(header.order_complete),
            order_approved_by: header.order_approved_by.clone(),
            order_approved_date: header.order_approved_date,
            order_packed_by: header.order_packed_by.clone(),
            order_packed_date: header.order_packed_date,
            order_dispatch_by: header.order_dispatch_by.clone(),
            order_dispatched_date: header.order_dispatched_date,
            order_rcvd_date: header.order_rcvd_date,
            stock_code: line.map(|l| l.stock_code.clone()),
            stock_description: line.map(|l| cap_description(&l.stock_description)),
            major_no: line.map(|l| l.major_no),
            major_name: line.map(|l| l.major_name.clone()),
            sub1_no: line.map(|l| l.sub1_no),
            sub1_name: line.map(|l| l.sub1_name.clone()),
            order_qty: line.map(|l| l.order_qty),
            rcvd_qty: line.map(|l| l.rcvd_qty),
            amended_qty: line.map(|l| l.amended_qty),
            final_qty: line.map(|l| l.final_qty),
            amended_shop: line.and_then(|l| l.amended_shop.clone()),
        }
    }
}

/// Every order for one store, as the union of the cloud mirror and the local
/// header⟕line join. Both sides are returned keyed on `order_no` — a header
/// that lost its line (or a mirror row with no local counterpart) still shows
/// up, with the missing fields null.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreOrdersQuery {
    pub store_name: String,
}

#[async_trait]
impl Query for StoreOrdersQuery {
    type Result = Vec<OrderRow>;

    #[instrument(skip(self, registry), fields(store_name = %self.store_name))]
    async fn execute(&self, registry: &PoolRegistry) -> Result<Self::Result, ServiceError> {
        let cloud_rows = cloud_order::Entity::find()
            .filter(cloud_order::Column::StoreName.eq(self.store_name.as_str()))
            .all(&registry.cloud())
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Cloud, e))?;

        let local = registry.local();
        let headers = order::Entity::find()
            .filter(order::Column::StoreName.eq(self.store_name.as_str()))
            .all(&local)
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;

        let order_nos: Vec<String> = headers.iter().map(|h| h.order_no.clone()).collect();
        let mut lines_by_order: HashMap<String, Vec<order_line::Model>> = HashMap::new();
        if !order_nos.is_empty() {
            let lines = order_line::Entity::find()
                .filter(order_line::Column::OrderNo.is_in(order_nos))
                .all(&local)
                .await
                .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;
            for line in lines {
                lines_by_order
                    .entry(line.order_no.clone())
                    .or_default()
                    .push(line);
            }
        }

        let mut rows: Vec<OrderRow> = cloud_rows.into_iter().map(OrderRow::from_cloud).collect();
        for header in &headers {
            match lines_by_order.get(&header.order_no) {
                Some(lines) => {
                    rows.extend(lines.iter().map(|line| OrderRow::from_local(header, Some(line))))
                }
                None => rows.push(OrderRow::from_local(header, None)),
            }
        }

        debug!(rows = rows.len(), "merged store orders");
        Ok(rows)
    }
}

/// One under-delivered order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancyRow {
    pub order_no: String,
    pub stock_code: String,
    pub order_qty: i32,
    pub rcvd_qty: i32,
    pub missing_qty: i32,
}

/// Lines where less stock arrived than was ordered. Diagnostic only; an
/// order completes with its shortfall on record.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscrepancyReportQuery;

#[async_trait]
impl Query for DiscrepancyReportQuery {
    type Result = Vec<DiscrepancyRow>;

    #[instrument(skip(self, registry))]
    async fn execute(&self, registry: &PoolRegistry) -> Result<Self::Result, ServiceError> {
        let lines = order_line::Entity::find()
            .filter(
                Expr::col(order_line::Column::RcvdQty).lt(Expr::col(order_line::Column::OrderQty)),
            )
            .order_by_asc(order_line::Column::OrderNo)
            .all(&registry.local())
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))?;

        Ok(lines
            .into_iter()
            .map(|line| DiscrepancyRow {
                missing_qty: line.order_qty - line.rcvd_qty,
                order_no: line.order_no,
                stock_code: line.stock_code,
                order_qty: line.order_qty,
                rcvd_qty: line.rcvd_qty,
            })
            .collect())
    }
}
