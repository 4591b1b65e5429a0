use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel pair.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

// Domain events emitted by the engine after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchUpserted {
        batch_id: i64,
        product_id: Uuid,
        batch_no: String,
        created: bool,
    },
    MovementApplied {
        transaction_id: Uuid,
        movement_code: String,
        product_id: Uuid,
        warehouse_id: Uuid,
        batch_id: i64,
        qty: Decimal,
        new_qty_on_hand: Decimal,
        txn_date: DateTime<Utc>,
    },
    TransactionVoided {
        transaction_id: Uuid,
    },
    TransactionReversed {
        original_id: Uuid,
        reversal_id: Uuid,
    },
}

impl Event {
    /// JSON rendering of the event, for consumers that forward to a bus or
    /// an outbox table.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Drains the event channel, logging each event. Embedding applications
/// that forward events to a bus replace this consumer with their own.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        debug!(payload = %event.payload(), "Engine event");
        match &event {
            Event::BatchUpserted {
                batch_id,
                product_id,
                batch_no,
                created,
            } => {
                info!(
                    batch_id = %batch_id,
                    product_id = %product_id,
                    batch_no = %batch_no,
                    created = %created,
                    "Batch upserted"
                );
            }
            Event::MovementApplied {
                transaction_id,
                movement_code,
                product_id,
                warehouse_id,
                batch_id,
                qty,
                new_qty_on_hand,
                ..
            } => {
                info!(
                    transaction_id = %transaction_id,
                    movement_code = %movement_code,
                    product_id = %product_id,
                    warehouse_id = %warehouse_id,
                    batch_id = %batch_id,
                    qty = %qty,
                    new_qty_on_hand = %new_qty_on_hand,
                    "Movement applied"
                );
            }
            Event::TransactionVoided { transaction_id } => {
                info!(transaction_id = %transaction_id, "Transaction voided");
            }
            Event::TransactionReversed {
                original_id,
                reversal_id,
            } => {
                info!(
                    original_id = %original_id,
                    reversal_id = %reversal_id,
                    "Transaction reversed"
                );
            }
        }
    }
}
