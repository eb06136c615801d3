use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

use crate::{
    db::{DatabaseTarget, PoolRegistry},
    entities::{store, store_user, user_store_link},
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterStoreRequest {
    #[validate(length(min = 1, message = "store name is required"))]
    pub store_name: String,
    #[validate(length(min = 1, message = "user name is required"))]
    pub user_name: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub host_ip: String,
    pub port_no: i32,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub permission: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterStoreResult {
    pub store_id: i32,
    pub user_id: i32,
}

/// Registry of sites allowed to place orders. Credentials are hashed before
/// they are persisted; verification itself is the auth collaborator's job.
#[derive(Clone)]
pub struct StoreService {
    registry: Arc<PoolRegistry>,
}

impl StoreService {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }

    /// Creates the store, its first user account, and the link row in one
    /// local transaction.
    #[instrument(skip(self, request), fields(store_name = %request.store_name))]
    pub async fn register_store(
        &self,
        request: RegisterStoreRequest,
    ) -> Result<RegisterStoreResult, ServiceError> {
        request.validate()?;

        let password_hash = hash_password(&request.password)?;
        let local = self.registry.local();
        let persist = |e| ServiceError::persistence(&DatabaseTarget::Local, e);

        let txn = local.begin().await.map_err(persist)?;

        let outcome = async {
            let store_row = store::ActiveModel {
                store_name: Set(request.store_name.clone()),
                user_name: Set(request.user_name.clone()),
                password_hash: Set(password_hash.clone()),
                host_ip: Set(request.host_ip.clone()),
                port_no: Set(request.port_no),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(persist)?;

            let user_row = store_user::ActiveModel {
                username: Set(request.user_name.clone()),
                email: Set(request.email.clone()),
                password_hash: Set(password_hash),
                roles: Set(request.roles.clone()),
                permission: Set(request.permission.clone()),
                created: Set(Utc::now()),
                store_name: Set(Some(request.store_name.clone())),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(persist)?;

            user_store_link::ActiveModel {
                user_id: Set(user_row.id),
                store_id: Set(store_row.id),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(persist)?;

            Ok::<_, ServiceError>(RegisterStoreResult {
                store_id: store_row.id,
                user_id: user_row.id,
            })
        }
        .await;

        match outcome {
            Ok(result) => {
                txn.commit().await.map_err(persist)?;
                info!(
                    store_id = result.store_id,
                    user_id = result.user_id,
                    "store registered"
                );
                Ok(result)
            }
            Err(err) => {
                if let Err(rb) = txn.rollback().await {
                    error!("rollback failed after store registration error: {rb}");
                }
                Err(err)
            }
        }
    }

    pub async fn list_stores(&self) -> Result<Vec<store::Model>, ServiceError> {
        store::Entity::find()
            .all(&self.registry.local())
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<store::Model>, ServiceError> {
        store::Entity::find()
            .filter(store::Column::StoreName.eq(name))
            .one(&self.registry.local())
            .await
            .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}
