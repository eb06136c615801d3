use axum::{extract::State, http::StatusCode, response::Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commands::receiving::{ConfirmReceiptCommand, ReceiptItem};
use crate::commands::Command;
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItemRequest {
    pub stock_code: String,
    #[serde(default)]
    pub qty_received: i32,
    #[serde(default)]
    pub bonus_qty: i32,
    #[serde(default)]
    pub qty_ordered: i32,
    #[serde(default)]
    pub exclusive_unit_cost: Decimal,
    #[serde(default)]
    pub inclusive_unit_cost: Decimal,
    #[serde(default)]
    pub markup: Decimal,
    #[serde(default)]
    pub exclusive_selling: Decimal,
    #[serde(default)]
    pub inclusive_selling: Decimal,
    #[serde(default)]
    pub vat_percentage: Decimal,
    #[serde(default)]
    pub discount1: Decimal,
    #[serde(default)]
    pub discount2: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReceiptRequest {
    pub store_id: Option<i32>,
    pub order_no: Option<String>,
    pub received_by: Option<String>,
    pub invoice_number: Option<String>,
    pub supplier_code: Option<String>,
    #[serde(default)]
    pub shipping_charge: Decimal,
    #[serde(default)]
    pub handling_charge: Decimal,
    #[serde(default)]
    pub other_charge: Decimal,
    #[serde(default)]
    pub received_items: Vec<ReceiptItemRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReceiptBody {
    pub grv_number: String,
    pub order_no: String,
    pub complete: bool,
}

pub async fn confirm_receipt(
    State(state): State<AppState>,
    Json(req): Json<ConfirmReceiptRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConfirmReceiptBody>>), ServiceError> {
    let (store_id, order_no, received_by) = match (req.store_id, req.order_no, req.received_by) {
        (Some(store_id), Some(order_no), Some(received_by)) => (store_id, order_no, received_by),
        _ => {
            return Err(ServiceError::ValidationError(
                "storeId, orderNo and receivedBy are required".to_string(),
            ))
        }
    };

    let command = ConfirmReceiptCommand {
        store_id,
        order_no,
        received_by,
        invoice_no: req.invoice_number.unwrap_or_default(),
        supplier_code: req.supplier_code.unwrap_or_default(),
        shipping_charge: req.shipping_charge,
        handling_charge: req.handling_charge,
        other_charge: req.other_charge,
        items: req
            .received_items
            .into_iter()
            .map(|item| ReceiptItem {
                stock_code: item.stock_code,
                qty_received: item.qty_received,
                bonus_qty: item.bonus_qty,
                qty_ordered: item.qty_ordered,
                exclusive_unit_cost: item.exclusive_unit_cost,
                inclusive_unit_cost: item.inclusive_unit_cost,
                markup: item.markup,
                exclusive_selling: item.exclusive_selling,
                inclusive_selling: item.inclusive_selling,
                vat_percentage: item.vat_percentage,
                discount1: item.discount1,
                discount2: item.discount2,
            })
            .collect(),
    };

    let result = command
        .execute(state.registry.clone(), state.event_sender.clone())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            "Goods receipt posted successfully",
            ConfirmReceiptBody {
                grv_number: result.grv_no,
                order_no: result.order_no,
                complete: result.complete,
            },
        )),
    ))
}
