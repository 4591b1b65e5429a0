#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use stockledger::{
    config::AppConfig,
    db,
    entities::movement_type::{MovementCode, MovementDirection},
    events,
    services::{
        batches::UpsertBatch,
        inventory::{MovementOutcome, PostMovement},
        Services,
    },
};
use uuid::Uuid;

/// Test harness over an in-memory SQLite database. A single pooled
/// connection keeps the in-memory database alive and serializes writers the
/// way row locks do on Postgres.
pub struct TestEngine {
    pub db: Arc<DatabaseConnection>,
    pub services: Services,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestEngine {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "test");
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let db = Arc::new(pool);
        let (sender, rx) = events::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(rx));
        let services = Services::new(db.clone(), sender);

        Self {
            db,
            services,
            _event_task: event_task,
        }
    }

    /// Registers a batch for the product, optionally with an expiry date.
    pub async fn upsert_batch(
        &self,
        product_id: Uuid,
        batch_no: &str,
        exp_date: Option<NaiveDate>,
    ) -> i64 {
        self.services
            .batches
            .upsert_batch(UpsertBatch {
                product_id,
                batch_no: batch_no.to_string(),
                mfg_date: None,
                exp_date,
                notes: None,
            })
            .await
            .expect("batch upsert")
    }

    /// Posts a goods receipt for the key.
    pub async fn receive(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        batch_id: i64,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> MovementOutcome {
        self.services
            .inventory
            .post_movement(movement(
                MovementCode::RegularIn,
                product_id,
                warehouse_id,
                batch_id,
                qty,
                Some(unit_cost),
            ))
            .await
            .expect("receipt")
    }

    /// Sums regular-stock ledger quantities for a key, signed by movement
    /// direction, skipping voided rows and transit rows. This is the
    /// reconciliation side of the conservation invariant: the result must
    /// equal the position's `qty_on_hand`.
    pub async fn signed_ledger_sum(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        batch_id: i64,
    ) -> Decimal {
        use stockledger::queries::stock_queries::{GetInventoryTransactionsQuery, Query};

        let semantics: HashMap<i32, (MovementDirection, bool)> = self
            .services
            .movement_types
            .list_active()
            .await
            .expect("movement types")
            .into_iter()
            .map(|m| {
                let direction = m.direction().expect("known direction");
                let affects = m.class().expect("known class").affects_regular_stock();
                (m.id, (direction, affects))
            })
            .collect();

        let txns = GetInventoryTransactionsQuery {
            product_id: Some(product_id),
            warehouse_id: Some(warehouse_id),
            batch_id: Some(batch_id),
            ..Default::default()
        }
        .execute(&self.db)
        .await
        .expect("transactions");

        txns.iter().fold(Decimal::ZERO, |acc, txn| {
            match semantics[&txn.movement_type_id] {
                (_, false) => acc,
                (MovementDirection::In, true) => acc + txn.qty,
                (MovementDirection::Out, true) => acc - txn.qty,
            }
        })
    }
}

/// Builds a movement posting with a fresh source document reference.
pub fn movement(
    code: MovementCode,
    product_id: Uuid,
    warehouse_id: Uuid,
    batch_id: i64,
    qty: Decimal,
    unit_cost: Option<Decimal>,
) -> PostMovement {
    PostMovement {
        movement_code: code,
        txn_type: "TEST".to_string(),
        txn_date: None,
        source_type: "TEST_DOC".to_string(),
        source_id: Uuid::new_v4(),
        source_line_id: None,
        product_id,
        warehouse_id,
        batch_id,
        qty,
        unit_cost,
        currency_id: None,
        exchange_rate: None,
        uom_id: None,
    }
}
