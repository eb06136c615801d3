use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Progress marker for a multi-database transition. One row per
/// (order, transition); `last_step` names the most recent step that
/// committed, so a half-applied transition can be detected and reported.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_journal")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub order_no: String,
    pub transition: String,
    pub last_step: Option<String>,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
