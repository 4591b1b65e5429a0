use crate::{
    entities::{
        batch,
        stock_position::{self, Entity as StockPositionEntity},
    },
    errors::ServiceError,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// One line of an allocation plan: draw `quantity` from `batch_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub batch_id: i64,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub exp_date: Option<NaiveDate>,
}

/// A caller-proposed allocation to validate against current stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub batch_id: i64,
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Pure planning over current positions. Nothing here mutates state: a plan
/// is advisory, and the locked re-check inside `apply_movement` is the
/// actual enforcement point. A concurrent caller draining the same batches
/// between planning and apply surfaces as `InsufficientStock` at apply time,
/// which plan-then-apply callers treat as a retryable outcome.
#[derive(Clone)]
pub struct AllocationService {
    db: Arc<DatabaseConnection>,
}

impl AllocationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Plans an outbound movement drawing from the oldest batches first
    /// (batch ids are allocated in creation order).
    #[instrument(skip(self))]
    pub async fn allocate_fifo(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        required_qty: Decimal,
    ) -> Result<Vec<AllocationLine>, ServiceError> {
        let candidates = self.stocked_positions(product_id, warehouse_id).await?;
        plan_greedy(candidates, required_qty)
    }

    /// Plans an outbound movement drawing from the soonest-expiring batches
    /// first. Batches without an expiry date sort last; ties break on batch
    /// id ascending.
    #[instrument(skip(self))]
    pub async fn allocate_fefo(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        required_qty: Decimal,
    ) -> Result<Vec<AllocationLine>, ServiceError> {
        let mut candidates = self.stocked_positions(product_id, warehouse_id).await?;
        candidates.sort_by(|(pa, ba), (pb, bb)| {
            let ea = ba.as_ref().and_then(|b| b.exp_date);
            let eb = bb.as_ref().and_then(|b| b.exp_date);
            match (ea, eb) {
                (Some(a), Some(b)) => a.cmp(&b).then(pa.batch_id.cmp(&pb.batch_id)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => pa.batch_id.cmp(&pb.batch_id),
            }
        });
        plan_greedy(candidates, required_qty)
    }

    /// Confirms a caller-proposed allocation against current stock, failing
    /// fast on the first batch that is missing or short. Used to vet
    /// externally-specified allocations before a multi-line movement.
    #[instrument(skip(self, allocations))]
    pub async fn validate_batch_stock(
        &self,
        allocations: &[BatchAllocation],
        warehouse_id: Uuid,
    ) -> Result<(), ServiceError> {
        for alloc in allocations {
            if alloc.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Allocation for batch {} must be positive, got {}",
                    alloc.batch_id, alloc.quantity
                )));
            }

            let position = StockPositionEntity::find()
                .filter(stock_position::Column::ProductId.eq(alloc.product_id))
                .filter(stock_position::Column::WarehouseId.eq(warehouse_id))
                .filter(stock_position::Column::BatchId.eq(alloc.batch_id))
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Batch {} has no stock in warehouse {}",
                        alloc.batch_id, warehouse_id
                    ))
                })?;

            if position.qty_on_hand < alloc.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Batch {} holds {}, requested {} (short by {})",
                    alloc.batch_id,
                    position.qty_on_hand,
                    alloc.quantity,
                    alloc.quantity - position.qty_on_hand
                )));
            }
        }
        Ok(())
    }

    /// Positions with stock for the key, joined to their batches, in batch
    /// creation order (batch id ascending).
    async fn stocked_positions(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<Vec<(stock_position::Model, Option<batch::Model>)>, ServiceError> {
        StockPositionEntity::find()
            .find_also_related(batch::Entity)
            .filter(stock_position::Column::ProductId.eq(product_id))
            .filter(stock_position::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_position::Column::QtyOnHand.gt(Decimal::ZERO))
            .order_by_asc(stock_position::Column::BatchId)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Greedily consumes candidates in the given order until the requirement is
/// met. Returns no partial plan: a shortfall fails the whole call.
fn plan_greedy(
    candidates: Vec<(stock_position::Model, Option<batch::Model>)>,
    required_qty: Decimal,
) -> Result<Vec<AllocationLine>, ServiceError> {
    if required_qty <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Required quantity must be positive, got {}",
            required_qty
        )));
    }

    let mut lines = Vec::new();
    let mut remaining = required_qty;

    for (position, batch) in &candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(position.qty_on_hand);
        lines.push(AllocationLine {
            batch_id: position.batch_id,
            quantity: take,
            unit_cost: position.unit_cost,
            exp_date: batch.as_ref().and_then(|b| b.exp_date),
        });
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        let available = required_qty - remaining;
        return Err(ServiceError::InsufficientStock(format!(
            "Requested {}, only {} available across {} batches",
            required_qty,
            available,
            candidates.len()
        )));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn position(batch_id: i64, qty: Decimal, cost: Decimal) -> stock_position::Model {
        let now = Utc::now();
        stock_position::Model {
            id: batch_id,
            product_id: Uuid::nil(),
            warehouse_id: Uuid::nil(),
            batch_id,
            qty_on_hand: qty,
            unit_cost: cost,
            currency_id: None,
            uom_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn greedy_plan_spans_batches_in_order() {
        let candidates = vec![
            (position(1, dec!(30), dec!(10)), None),
            (position(2, dec!(40), dec!(12)), None),
        ];
        let plan = plan_greedy(candidates, dec!(50)).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].batch_id, 1);
        assert_eq!(plan[0].quantity, dec!(30));
        assert_eq!(plan[1].batch_id, 2);
        assert_eq!(plan[1].quantity, dec!(20));
    }

    #[test]
    fn shortfall_returns_no_partial_plan() {
        let candidates = vec![(position(1, dec!(30), dec!(10)), None)];
        let err = plan_greedy(candidates, dec!(31)).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock(_)));
    }

    #[test]
    fn non_positive_requirement_is_rejected() {
        let err = plan_greedy(Vec::new(), dec!(0)).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
