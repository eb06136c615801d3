use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    Schema, Set,
};
use tokio::sync::mpsc;

use dispatch_api::db::PoolRegistry;
use dispatch_api::entities::{
    cloud_order, grn_header, grn_line, order, order_box, order_line, pack_size, stock_on_hand,
    store, store_user, sync_journal, user_store_link,
};
use dispatch_api::events::EventSender;

/// Test harness backed by two in-memory SQLite databases standing in for the
/// cloud and local stores. Per-store mirror databases are attached on demand.
pub struct TestEnv {
    pub registry: Arc<PoolRegistry>,
    pub events: Arc<EventSender>,
    pub cloud: DatabaseConnection,
    pub local: DatabaseConnection,
    _drain: tokio::task::JoinHandle<()>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let cloud = connect_memory().await;
        let local = connect_memory().await;

        create_table(&cloud, cloud_order::Entity).await;

        create_table(&local, order::Entity).await;
        create_table(&local, order_line::Entity).await;
        create_table(&local, order_box::Entity).await;
        create_table(&local, pack_size::Entity).await;
        create_table(&local, store::Entity).await;
        create_table(&local, store_user::Entity).await;
        create_table(&local, user_store_link::Entity).await;
        create_table(&local, stock_on_hand::Entity).await;
        create_table(&local, grn_header::Entity).await;
        create_table(&local, grn_line::Entity).await;
        create_table(&local, sync_journal::Entity).await;

        let registry = Arc::new(PoolRegistry::from_pools(cloud.clone(), local.clone()));

        let (tx, mut rx) = mpsc::channel(64);
        let events = Arc::new(EventSender::new(tx));
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        Self {
            registry,
            events,
            cloud,
            local,
            _drain: drain,
        }
    }

    /// Registers a store row so order creation passes its referential check.
    pub async fn seed_store(&self, name: &str) {
        store::ActiveModel {
            store_name: Set(name.to_string()),
            user_name: Set("manager".to_string()),
            password_hash: Set("$argon2id$test".to_string()),
            host_ip: Set("127.0.0.1".to_string()),
            port_no: Set(3306),
            ..Default::default()
        }
        .insert(&self.local)
        .await
        .expect("seed store");
    }

    pub async fn seed_pack_size(&self, size: i64, qty_per_box: i32) {
        pack_size::ActiveModel {
            pack_size: Set(size),
            qty_per_box: Set(qty_per_box),
            ..Default::default()
        }
        .insert(&self.local)
        .await
        .expect("seed pack size");
    }

    /// Creates a dedicated mirror database for a store, registers its pool,
    /// and returns the connection so tests can seed and inspect it.
    pub async fn attach_store_mirror(&self, store_name: &str) -> DatabaseConnection {
        let mirror = connect_memory().await;
        create_table(&mirror, order::Entity).await;
        self.registry.register_store_pool(store_name, mirror.clone());
        mirror
    }
}

async fn connect_memory() -> DatabaseConnection {
    // A single persistent connection: every pooled connection to
    // `sqlite::memory:` would otherwise get its own empty database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1);
    Database::connect(opt).await.expect("in-memory database")
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let stmt = schema.create_table_from_entity(entity);
    db.execute(backend.build(&stmt)).await.expect("create table");
}
