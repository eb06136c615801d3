use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registered site. `host_ip`/`port_no` locate the store's dedicated
/// database used by the dispatch mirror sync.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub store_name: String,
    pub user_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub host_ip: String,
    pub port_no: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
