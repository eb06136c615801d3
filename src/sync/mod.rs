//! Dual-write synchronizer.
//!
//! Every lifecycle transition that touches more than one database runs as a
//! small saga: an ordered list of per-database steps, executed cloud mirror
//! first, then local header, then local line, then local auxiliary rows. The
//! first failing step aborts the rest and surfaces a persistence error naming
//! its target; steps already committed elsewhere are NOT rolled back. That
//! best-effort policy is the documented design, not an oversight — the
//! journal below exists so a half-applied transition is detectable instead of
//! silently inconsistent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::db::{DatabaseTarget, DbPool, PoolRegistry};
use crate::entities::{order, store, sync_journal};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// A step closure receives the pool its target resolved to and reports how
/// many rows it touched. Zero-row updates are legitimate (the cloud mirror of
/// an order that was never mirrored); a step that requires rows returns
/// `NotFound` itself.
pub type StepFn = Box<dyn FnOnce(DbPool) -> BoxFuture<'static, Result<u64, ServiceError>> + Send>;

pub struct SagaStep {
    pub name: &'static str,
    pub target: DatabaseTarget,
    pub run: StepFn,
}

impl SagaStep {
    pub fn new(name: &'static str, target: DatabaseTarget, run: StepFn) -> Self {
        Self { name, target, run }
    }
}

/// One transition's ordered mutations.
pub struct Saga {
    pub order_no: String,
    pub transition: &'static str,
    pub steps: Vec<SagaStep>,
}

/// Executes sagas against the pool registry, journaling progress locally.
#[derive(Clone)]
pub struct SagaExecutor {
    registry: Arc<PoolRegistry>,
}

impl SagaExecutor {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }

    /// Runs every step in order. The journal marker advances after each step
    /// that touched rows, and the journal row is closed when the saga ends,
    /// so an unfinished row pinpoints where a transition stopped.
    #[instrument(skip(self, saga), fields(order_no = %saga.order_no, transition = saga.transition))]
    pub async fn execute(&self, saga: Saga) -> Result<(), ServiceError> {
        self.execute_skipping(saga, 0).await
    }

    /// Re-runs a saga from step `completed_prefix`, used to finish a
    /// transition whose journal row shows it stopped partway.
    pub async fn execute_skipping(
        &self,
        saga: Saga,
        completed_prefix: usize,
    ) -> Result<(), ServiceError> {
        let run_id = Uuid::new_v4();
        let journal = Journal {
            local: self.registry.local(),
            order_no: saga.order_no.clone(),
            transition: saga.transition,
        };

        let mut rows_touched = false;
        for (idx, step) in saga.steps.into_iter().enumerate() {
            if idx < completed_prefix {
                debug!(%run_id, step = step.name, "skipping already-committed step");
                continue;
            }

            let pool = self.registry.resolve(&step.target)?;
            debug!(%run_id, step = step.name, target = %step.target, "executing sync step");

            let rows = (step.run)(pool).await.map_err(|e| {
                error!(
                    %run_id,
                    step = step.name,
                    target = %step.target,
                    error = %e,
                    "sync step failed, aborting remaining steps"
                );
                e
            })?;

            if rows > 0 {
                rows_touched = true;
                journal.mark(step.name).await;
            }
        }

        if rows_touched {
            journal.close().await;
        }

        Ok(())
    }
}

/// Best-effort progress marker for one (order, transition). Journal failures
/// degrade to warnings; they never fail the transition itself.
struct Journal {
    local: DbPool,
    order_no: String,
    transition: &'static str,
}

impl Journal {
    async fn mark(&self, step: &'static str) {
        if let Err(e) = self.upsert(Some(step), false).await {
            warn!(
                order_no = %self.order_no,
                transition = self.transition,
                step,
                "failed to journal sync step: {e}"
            );
        }
    }

    async fn close(&self) {
        if let Err(e) = self.upsert(None, true).await {
            warn!(
                order_no = %self.order_no,
                transition = self.transition,
                "failed to close sync journal row: {e}"
            );
        }
    }

    async fn upsert(&self, step: Option<&'static str>, completed: bool) -> Result<(), DbErr> {
        let existing = sync_journal::Entity::find()
            .filter(sync_journal::Column::OrderNo.eq(self.order_no.as_str()))
            .filter(sync_journal::Column::Transition.eq(self.transition))
            .one(&self.local)
            .await?;

        match existing {
            Some(row) => {
                let mut row: sync_journal::ActiveModel = row.into();
                if let Some(step) = step {
                    row.last_step = Set(Some(step.to_string()));
                }
                row.completed = Set(completed);
                row.updated_at = Set(Utc::now());
                row.update(&self.local).await?;
            }
            None => {
                sync_journal::ActiveModel {
                    order_no: Set(self.order_no.clone()),
                    transition: Set(self.transition.to_string()),
                    last_step: Set(step.map(|s| s.to_string())),
                    completed: Set(completed),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&self.local)
                .await?;
            }
        }

        Ok(())
    }
}

/// Lists transitions whose journal row never closed: candidates for manual
/// resume or operator attention.
pub async fn pending_transitions(
    registry: &PoolRegistry,
) -> Result<Vec<sync_journal::Model>, ServiceError> {
    sync_journal::Entity::find()
        .filter(sync_journal::Column::Completed.eq(false))
        .all(&registry.local())
        .await
        .map_err(|e| ServiceError::persistence(&DatabaseTarget::Local, e))
}

/// Replays the dispatch stamps onto the order's dedicated store database.
///
/// Runs after the primary dispatch writes have succeeded, so every failure
/// here is non-fatal: it is logged, published as an event, and returned as a
/// warning string for the response body. The dispatch is not retried.
#[instrument(skip(registry, events, dispatched_date))]
pub async fn sync_store_mirror(
    registry: &PoolRegistry,
    events: &EventSender,
    order_no: &str,
    dispatched_by: &str,
    dispatched_date: DateTime<Utc>,
) -> Option<String> {
    match mirror_dispatch(registry, order_no, dispatched_by, dispatched_date).await {
        Ok(store_name) => {
            info!(%order_no, %store_name, "store mirror updated");
            None
        }
        Err(reason) => {
            warn!(%order_no, %reason, "store mirror sync failed");
            let store_name = reason.store_name.clone().unwrap_or_default();
            if let Err(e) = events
                .send(Event::StoreMirrorSyncFailed {
                    order_no: order_no.to_string(),
                    store_name,
                    reason: reason.message.clone(),
                })
                .await
            {
                warn!(%order_no, "failed to publish mirror sync event: {e}");
            }
            Some(reason.message)
        }
    }
}

struct MirrorFailure {
    store_name: Option<String>,
    message: String,
}

impl MirrorFailure {
    fn new(store_name: Option<String>, message: impl Into<String>) -> Self {
        Self {
            store_name,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MirrorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

async fn mirror_dispatch(
    registry: &PoolRegistry,
    order_no: &str,
    dispatched_by: &str,
    dispatched_date: DateTime<Utc>,
) -> Result<String, MirrorFailure> {
    let local = registry.local();

    let header = order::Entity::find()
        .filter(order::Column::OrderNo.eq(order_no))
        .one(&local)
        .await
        .map_err(|e| MirrorFailure::new(None, format!("local header lookup failed: {e}")))?
        .ok_or_else(|| MirrorFailure::new(None, format!("no local header for {order_no}")))?;

    if header.store_name.is_empty() {
        return Err(MirrorFailure::new(
            None,
            format!("order {order_no} has no store name"),
        ));
    }
    let store_name = header.store_name.clone();

    let store_row = store::Entity::find()
        .filter(store::Column::StoreName.eq(store_name.as_str()))
        .one(&local)
        .await
        .map_err(|e| {
            MirrorFailure::new(
                Some(store_name.clone()),
                format!("store registry lookup failed: {e}"),
            )
        })?
        .ok_or_else(|| {
            MirrorFailure::new(
                Some(store_name.clone()),
                format!("store {store_name} is not registered"),
            )
        })?;

    let url = registry.store_url(&store_row.host_ip, store_row.port_no as u16);
    let pool = registry
        .ensure_store(&store_name, url)
        .await
        .map_err(|e| {
            MirrorFailure::new(
                Some(store_name.clone()),
                format!("store database unreachable: {e}"),
            )
        })?;

    let result = order::Entity::update_many()
        .set(order::ActiveModel {
            order_dispatch_by: Set(Some(dispatched_by.to_string())),
            order_dispatched_date: Set(Some(dispatched_date)),
            ..Default::default()
        })
        .filter(order::Column::OrderNo.eq(order_no))
        .exec(&pool)
        .await
        .map_err(|e| {
            MirrorFailure::new(
                Some(store_name.clone()),
                format!("store mirror update failed: {e}"),
            )
        })?;

    if result.rows_affected == 0 {
        return Err(MirrorFailure::new(
            Some(store_name.clone()),
            format!("store mirror has no row for {order_no}"),
        ));
    }

    Ok(store_name)
}
