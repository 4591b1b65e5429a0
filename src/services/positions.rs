use crate::{
    entities::{
        movement_type::{self, MovementDirection},
        stock_position::{self, Entity as StockPositionEntity},
    },
    errors::ServiceError,
    services::costing,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

/// One movement against a position key. `qty` is always a positive
/// magnitude; the movement type's direction decides the sign.
#[derive(Debug, Clone)]
pub struct ApplyMovement {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub batch_id: i64,
    pub qty: Decimal,
    pub unit_cost: Decimal,
    pub currency_id: Option<Uuid>,
    pub uom_id: Option<Uuid>,
}

/// Applies one movement to the stock position for the key, inside the
/// caller's transaction. The position row is read under an exclusive lock
/// (SELECT ... FOR UPDATE on Postgres; SQLite serializes writers at the
/// database level), so concurrent movements against the same key line up.
///
/// Inbound movements lazily create the position and recompute the moving
/// average. Outbound movements (including discards) require an existing
/// position with enough stock; the average cost is untouched.
pub async fn apply_movement<C: ConnectionTrait>(
    conn: &C,
    input: &ApplyMovement,
    movement: &movement_type::Model,
) -> Result<stock_position::Model, ServiceError> {
    if input.qty <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Movement quantity must be positive, got {}",
            input.qty
        )));
    }

    let direction = movement.direction().map_err(|_| {
        ServiceError::InternalError(format!(
            "Movement type {} carries unknown direction '{}'",
            movement.code, movement.direction
        ))
    })?;

    let position = StockPositionEntity::find()
        .filter(stock_position::Column::ProductId.eq(input.product_id))
        .filter(stock_position::Column::WarehouseId.eq(input.warehouse_id))
        .filter(stock_position::Column::BatchId.eq(input.batch_id))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(ServiceError::from_locked_db_err)?;

    match (position, direction) {
        (None, MovementDirection::In) => {
            let now = Utc::now();
            let unit_cost = costing::moving_average(
                Decimal::ZERO,
                Decimal::ZERO,
                input.qty,
                input.unit_cost,
            );
            let created = stock_position::ActiveModel {
                product_id: Set(input.product_id),
                warehouse_id: Set(input.warehouse_id),
                batch_id: Set(input.batch_id),
                qty_on_hand: Set(input.qty),
                unit_cost: Set(unit_cost),
                currency_id: Set(input.currency_id),
                uom_id: Set(input.uom_id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(ServiceError::from_locked_db_err)?;

            debug!(
                position_id = %created.id,
                qty = %created.qty_on_hand,
                unit_cost = %created.unit_cost,
                "Created stock position on first receipt"
            );
            Ok(created)
        }
        (None, MovementDirection::Out) => Err(ServiceError::NotFound(format!(
            "No stock position for product {} batch {} in warehouse {}",
            input.product_id, input.batch_id, input.warehouse_id
        ))),
        (Some(pos), MovementDirection::In) => {
            let new_cost = costing::moving_average(
                pos.qty_on_hand,
                pos.unit_cost,
                input.qty,
                input.unit_cost,
            );
            let new_qty = pos.qty_on_hand + input.qty;

            let mut active: stock_position::ActiveModel = pos.into();
            active.qty_on_hand = Set(new_qty);
            active.unit_cost = Set(new_cost);
            active.updated_at = Set(Utc::now());
            active
                .update(conn)
                .await
                .map_err(ServiceError::from_locked_db_err)
        }
        (Some(pos), MovementDirection::Out) => {
            if input.qty > pos.qty_on_hand {
                return Err(ServiceError::InsufficientStock(format!(
                    "Batch {} in warehouse {} holds {}, requested {}",
                    input.batch_id, input.warehouse_id, pos.qty_on_hand, input.qty
                )));
            }
            let new_qty = pos.qty_on_hand - input.qty;

            let mut active: stock_position::ActiveModel = pos.into();
            active.qty_on_hand = Set(new_qty);
            active.updated_at = Set(Utc::now());
            active
                .update(conn)
                .await
                .map_err(ServiceError::from_locked_db_err)
        }
    }
}

/// Reads a position without locking. Returns `NotFound` for absent keys.
pub async fn get_position<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
    batch_id: i64,
) -> Result<stock_position::Model, ServiceError> {
    StockPositionEntity::find()
        .filter(stock_position::Column::ProductId.eq(product_id))
        .filter(stock_position::Column::WarehouseId.eq(warehouse_id))
        .filter(stock_position::Column::BatchId.eq(batch_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "No stock position for product {} batch {} in warehouse {}",
                product_id, batch_id, warehouse_id
            ))
        })
}
