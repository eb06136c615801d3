use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use crate::entities::store;
use crate::errors::ServiceError;
use crate::services::stores::RegisterStoreRequest;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShopRequest {
    pub store_name: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub host_ip: Option<String>,
    pub port_no: Option<i32>,
    pub email: Option<String>,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub permission: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShopBody {
    pub shop_id: i32,
    pub user_id: i32,
}

pub async fn create_shop(
    State(state): State<AppState>,
    Json(req): Json<CreateShopRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateShopBody>>), ServiceError> {
    let (store_name, user_name, password, email) =
        match (req.store_name, req.user_name, req.password, req.email) {
            (Some(store_name), Some(user_name), Some(password), Some(email)) => {
                (store_name, user_name, password, email)
            }
            _ => {
                return Err(ServiceError::ValidationError(
                    "storeName, userName, password and email are required".to_string(),
                ))
            }
        };

    let result = state
        .services
        .stores
        .register_store(RegisterStoreRequest {
            store_name,
            user_name,
            password,
            host_ip: req.host_ip.unwrap_or_default(),
            port_no: req.port_no.unwrap_or(0),
            email,
            roles: req.roles,
            permission: req.permission,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            "Shop and user created successfully",
            CreateShopBody {
                shop_id: result.store_id,
                user_id: result.user_id,
            },
        )),
    ))
}

#[derive(Debug, Serialize)]
pub struct ShopsBody {
    pub shops: Vec<store::Model>,
}

pub async fn shops(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ShopsBody>>, ServiceError> {
    let shops = state.services.stores.list_stores().await?;
    if shops.is_empty() {
        return Err(ServiceError::NotFound("No shops found".to_string()));
    }
    Ok(Json(ApiResponse::new(
        "Shops fetched successfully",
        ShopsBody { shops },
    )))
}
