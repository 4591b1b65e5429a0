// Registries
pub mod batches;
pub mod movement_types;

// Core invariant path
pub mod costing;
pub mod inventory;
pub mod ledger;
pub mod positions;

// Planning
pub mod allocation;

use crate::events::EventSender;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Wires every engine service over one pool and event channel.
#[derive(Clone)]
pub struct Services {
    pub inventory: inventory::InventoryService,
    pub allocation: allocation::AllocationService,
    pub batches: batches::BatchService,
    pub movement_types: movement_types::MovementTypeService,
}

impl Services {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            inventory: inventory::InventoryService::new(db.clone(), event_sender.clone()),
            allocation: allocation::AllocationService::new(db.clone()),
            batches: batches::BatchService::new(db.clone(), event_sender),
            movement_types: movement_types::MovementTypeService::new(db),
        }
    }
}
