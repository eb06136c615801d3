use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::orders::{
    ApproveOrderCommand, CreateOrderCommand, DispatchOrderCommand, PackOrderCommand,
    ReceiveOrderCommand, UpdateOrderStatusCommand,
};
use crate::commands::Command;
use crate::entities::{order, sync_journal};
use crate::errors::ServiceError;
use crate::queries::{
    DiscrepancyReportQuery, DiscrepancyRow, ListOrdersQuery, OrderRow, Query, StoreOrdersQuery,
};
use crate::{sync, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub store_name: Option<String>,
    pub stock_code: Option<String>,
    pub stock_description: Option<String>,
    #[serde(default)]
    pub major_no: i32,
    #[serde(default)]
    pub major_name: String,
    #[serde(default)]
    pub sub1_no: i32,
    #[serde(default)]
    pub sub1_name: String,
    #[serde(default)]
    pub order_qty: i32,
    pub rcvd_qty: Option<i32>,
    pub amended_qty: Option<i32>,
    pub final_qty: Option<i32>,
    pub amended_shop: Option<String>,
    pub pack_size: Option<i64>,
    pub placed_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub order_no: String,
    pub boxes: usize,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateOrderBody>>), ServiceError> {
    let store_name = req
        .store_name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::ValidationError("Missing storeName field".to_string()))?;

    let command = CreateOrderCommand {
        store_name,
        stock_code: req.stock_code.unwrap_or_default(),
        stock_description: req.stock_description.unwrap_or_default(),
        major_no: req.major_no,
        major_name: req.major_name,
        sub1_no: req.sub1_no,
        sub1_name: req.sub1_name,
        order_qty: req.order_qty,
        rcvd_qty: req.rcvd_qty,
        amended_qty: req.amended_qty,
        final_qty: req.final_qty,
        amended_shop: req.amended_shop,
        pack_size: req.pack_size,
        placed_by: req.placed_by,
    };

    let result = command
        .execute(state.registry.clone(), state.event_sender.clone())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            "Order Created Successfully",
            CreateOrderBody {
                order_no: result.order_no,
                boxes: result.boxes,
            },
        )),
    ))
}

#[derive(Debug, Serialize)]
pub struct OrdersBody {
    pub orders: Vec<order::Model>,
}

pub async fn fetch_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrdersBody>>, ServiceError> {
    let orders = ListOrdersQuery.execute(&state.registry).await?;
    Ok(Json(ApiResponse::new(
        "Orders fetched successfully",
        OrdersBody { orders },
    )))
}

#[derive(Debug, Serialize)]
pub struct StoreOrdersBody {
    pub orders: Vec<OrderRow>,
}

/// Store identity arrives in the `store` header on this endpoint, not in the
/// body — the caller contract the frontend already follows.
pub async fn store_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<StoreOrdersBody>>, ServiceError> {
    let store_name = headers
        .get("store")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::ValidationError("Missing store header".to_string()))?
        .to_string();

    let orders = StoreOrdersQuery { store_name }.execute(&state.registry).await?;
    Ok(Json(ApiResponse::new(
        "Orders fetched successfully",
        StoreOrdersBody { orders },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveOrderRequest {
    pub order_no: Option<String>,
    pub approved_qty: Option<i32>,
    pub approved_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveOrderBody {
    pub order_no: String,
    pub final_qty: i32,
}

pub async fn approve_order(
    State(state): State<AppState>,
    Json(req): Json<ApproveOrderRequest>,
) -> Result<Json<ApiResponse<ApproveOrderBody>>, ServiceError> {
    let (order_no, approved_qty, approved_by) =
        match (req.order_no, req.approved_qty, req.approved_by) {
            (Some(order_no), Some(qty), Some(by)) => (order_no, qty, by),
            _ => {
                return Err(ServiceError::ValidationError(
                    "orderNo, approvedQty and approvedBy are required".to_string(),
                ))
            }
        };

    let result = ApproveOrderCommand {
        order_no,
        approved_qty,
        approved_by,
    }
    .execute(state.registry.clone(), state.event_sender.clone())
    .await?;

    Ok(Json(ApiResponse::new(
        "Order approved successfully",
        ApproveOrderBody {
            order_no: result.order_no,
            final_qty: result.final_qty,
        },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackOrderRequest {
    pub order_no: Option<String>,
    pub packed_by: Option<String>,
    pub amended_qty: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackOrderBody {
    pub order_no: String,
    pub amended_qty: i32,
}

pub async fn pack_order(
    State(state): State<AppState>,
    Json(req): Json<PackOrderRequest>,
) -> Result<Json<ApiResponse<PackOrderBody>>, ServiceError> {
    let (order_no, packed_by, amended_qty) = match (req.order_no, req.packed_by, req.amended_qty) {
        (Some(order_no), Some(by), Some(qty)) => (order_no, by, qty),
        _ => {
            return Err(ServiceError::ValidationError(
                "orderNo, packedBy and amendedQty are required".to_string(),
            ))
        }
    };

    let result = PackOrderCommand {
        order_no,
        packed_by,
        amended_qty,
    }
    .execute(state.registry.clone(), state.event_sender.clone())
    .await?;

    Ok(Json(ApiResponse::new(
        "Order packed successfully",
        PackOrderBody {
            order_no: result.order_no,
            amended_qty: result.amended_qty,
        },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOrderRequest {
    pub order_no: Option<String>,
    pub dispatched_by: Option<String>,
    pub final_qty: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOrderBody {
    pub order_no: String,
    pub final_qty: i32,
    /// Present when the best-effort store mirror sync failed; the dispatch
    /// itself still succeeded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub async fn dispatch_order(
    State(state): State<AppState>,
    Json(req): Json<DispatchOrderRequest>,
) -> Result<Json<ApiResponse<DispatchOrderBody>>, ServiceError> {
    let (order_no, dispatched_by, final_qty) =
        match (req.order_no, req.dispatched_by, req.final_qty) {
            (Some(order_no), Some(by), Some(qty)) => (order_no, by, qty),
            _ => {
                return Err(ServiceError::ValidationError(
                    "orderNo, dispatchedBy and finalQty are required".to_string(),
                ))
            }
        };

    let result = DispatchOrderCommand {
        order_no,
        dispatched_by,
        final_qty,
    }
    .execute(state.registry.clone(), state.event_sender.clone())
    .await?;

    Ok(Json(ApiResponse::new(
        "Order dispatched successfully",
        DispatchOrderBody {
            order_no: result.order_no,
            final_qty: result.final_qty,
            warnings: result.warnings,
        },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveOrderRequest {
    pub order_no: Option<String>,
    pub status: Option<String>,
    pub received_date: Option<DateTime<Utc>>,
    pub received_qty: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveOrderBody {
    pub order_no: String,
    pub received_qty: i32,
}

pub async fn receive_order(
    State(state): State<AppState>,
    Json(req): Json<ReceiveOrderRequest>,
) -> Result<Json<ApiResponse<ReceiveOrderBody>>, ServiceError> {
    let order_no = req
        .order_no
        .ok_or_else(|| ServiceError::ValidationError("orderNo is required".to_string()))?;

    let result = ReceiveOrderCommand {
        order_no,
        status: req.status.unwrap_or_else(|| "received".to_string()),
        received_date: req.received_date.unwrap_or_else(Utc::now),
        received_qty: req.received_qty.unwrap_or(0),
    }
    .execute(state.registry.clone(), state.event_sender.clone())
    .await?;

    Ok(Json(ApiResponse::new(
        "Order received successfully",
        ReceiveOrderBody {
            order_no: result.order_no,
            received_qty: result.received_qty,
        },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub order_no: Option<String>,
    pub status: Option<String>,
    pub received_date: Option<DateTime<Utc>>,
    pub amended_qty: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusBody {
    pub order_no: String,
    pub status: String,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<UpdateOrderStatusBody>>, ServiceError> {
    let (order_no, status) = match (req.order_no, req.status) {
        (Some(order_no), Some(status)) => (order_no, status),
        _ => {
            return Err(ServiceError::ValidationError(
                "orderNo and status are required".to_string(),
            ))
        }
    };

    let result = UpdateOrderStatusCommand {
        order_no,
        status,
        received_date: req.received_date.unwrap_or_else(Utc::now),
        amended_qty: req.amended_qty.unwrap_or(0),
    }
    .execute(state.registry.clone(), state.event_sender.clone())
    .await?;

    Ok(Json(ApiResponse::new(
        "Order status and received date updated successfully!",
        UpdateOrderStatusBody {
            order_no: result.order_no,
            status: result.status,
        },
    )))
}

#[derive(Debug, Serialize)]
pub struct DiscrepanciesBody {
    pub discrepancies: Vec<DiscrepancyRow>,
}

pub async fn order_discrepancies(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DiscrepanciesBody>>, ServiceError> {
    let discrepancies = DiscrepancyReportQuery.execute(&state.registry).await?;
    Ok(Json(ApiResponse::new(
        "Discrepancy report generated",
        DiscrepanciesBody { discrepancies },
    )))
}

#[derive(Debug, Serialize)]
pub struct PendingSyncBody {
    pub pending: Vec<sync_journal::Model>,
}

/// Transitions whose journal row never closed: half-applied dual writes that
/// need operator attention.
pub async fn pending_sync(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PendingSyncBody>>, ServiceError> {
    let pending = sync::pending_transitions(&state.registry).await?;
    Ok(Json(ApiResponse::new(
        "Pending transitions fetched",
        PendingSyncBody { pending },
    )))
}
