use crate::{
    entities::{
        movement_type::{self, Entity as MovementTypeEntity, MovementCode, MovementDirection},
        stock_position,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        allocation::AllocationLine,
        ledger::{self, NewTransaction},
        movement_types::MovementTypeService,
        positions::{self, ApplyMovement},
    },
};
use crate::db::DatabaseAccess;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One stock-affecting posting: the movement kind, the position key, the
/// quantity, and the originating business document.
///
/// `unit_cost` is required for inbound movements and for transit movements
/// (whose ledger lines carry the caller's valuation). For regular outbound
/// movements and discards it is ignored: the ledger line is costed at the
/// position's moving average.
#[derive(Debug, Clone)]
pub struct PostMovement {
    pub movement_code: MovementCode,
    pub txn_type: String,
    pub txn_date: Option<DateTime<Utc>>,
    pub source_type: String,
    pub source_id: Uuid,
    pub source_line_id: Option<Uuid>,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub batch_id: i64,
    pub qty: Decimal,
    pub unit_cost: Option<Decimal>,
    pub currency_id: Option<Uuid>,
    pub exchange_rate: Option<Decimal>,
    pub uom_id: Option<Uuid>,
}

/// Context shared by every line of an allocation-plan posting.
#[derive(Debug, Clone)]
pub struct PostAllocation {
    pub movement_code: MovementCode,
    pub txn_type: String,
    pub txn_date: Option<DateTime<Utc>>,
    pub source_type: String,
    pub source_id: Uuid,
    pub source_line_id: Option<Uuid>,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub currency_id: Option<Uuid>,
    pub exchange_rate: Option<Decimal>,
    pub uom_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct MovementOutcome {
    pub transaction_id: Uuid,
    /// Updated position. `None` for transit movements, which only append
    /// ledger rows; the regular-stock aggregate is untouched.
    pub position: Option<stock_position::Model>,
}

/// Engine facade pairing the stock position store with the ledger writer.
/// Every mutating call runs inside one database transaction: the position
/// update and the ledger append succeed or roll back together.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    access: DatabaseAccess,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        let access = DatabaseAccess::new(db.clone());
        Self {
            db,
            access,
            event_sender,
        }
    }

    /// Registry view over the same pool, for callers that need raw lookups.
    pub fn movement_types(&self) -> MovementTypeService {
        MovementTypeService::new(self.db.clone())
    }

    /// Posts a single movement: locks the position, applies the quantity
    /// and costing effect, and appends the ledger line atomically.
    #[instrument(skip(self))]
    pub async fn post_movement(
        &self,
        input: PostMovement,
    ) -> Result<MovementOutcome, ServiceError> {
        let movement = self.movement_types().lookup_by_code(input.movement_code).await?;
        let outcome = self
            .apply_in_transaction(vec![(input.clone(), movement)])
            .await?
            .pop()
            .ok_or_else(|| {
                ServiceError::InternalError("Movement posting produced no outcome".to_string())
            })?;

        self.publish_movement(&input, &outcome).await;
        Ok(outcome)
    }

    /// Applies an allocation plan as a single logical movement: every line
    /// posts inside ONE outer transaction, so a failure partway through
    /// (including a plan gone stale since planning) rolls back all prior
    /// lines. `InsufficientStock` here is a normal retryable outcome for
    /// plan-then-apply callers.
    #[instrument(skip(self, plan))]
    pub async fn post_allocation(
        &self,
        plan: &[AllocationLine],
        ctx: &PostAllocation,
    ) -> Result<Vec<MovementOutcome>, ServiceError> {
        if plan.is_empty() {
            return Err(ServiceError::ValidationError(
                "Allocation plan is empty".to_string(),
            ));
        }

        let movement = self.movement_types().lookup_by_code(ctx.movement_code).await?;
        let direction = parse_direction(&movement)?;
        if direction != MovementDirection::Out {
            return Err(ServiceError::ValidationError(format!(
                "Allocation plans post outbound movements, got {}",
                ctx.movement_code
            )));
        }

        let inputs: Vec<(PostMovement, movement_type::Model)> = plan
            .iter()
            .map(|line| {
                (
                    PostMovement {
                        movement_code: ctx.movement_code,
                        txn_type: ctx.txn_type.clone(),
                        txn_date: ctx.txn_date,
                        source_type: ctx.source_type.clone(),
                        source_id: ctx.source_id,
                        source_line_id: ctx.source_line_id,
                        product_id: ctx.product_id,
                        warehouse_id: ctx.warehouse_id,
                        batch_id: line.batch_id,
                        qty: line.quantity,
                        unit_cost: Some(line.unit_cost),
                        currency_id: ctx.currency_id,
                        exchange_rate: ctx.exchange_rate,
                        uom_id: ctx.uom_id,
                    },
                    movement.clone(),
                )
            })
            .collect();

        let outcomes = self.apply_in_transaction(inputs.clone()).await?;

        for ((input, _), outcome) in inputs.iter().zip(&outcomes) {
            self.publish_movement(input, outcome).await;
        }
        Ok(outcomes)
    }

    /// Voids a ledger row and posts the compensating movement in one
    /// transaction. This is the path that actually reverses economic
    /// effect; a bare void only flags the row for display and audit.
    #[instrument(skip(self))]
    pub async fn reverse_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<MovementOutcome, ServiceError> {
        let (original_id, outcome, reversal_input) = self
            .access
            .transaction::<_, (Uuid, MovementOutcome, PostMovement), ServiceError>(move |txn| {
                Box::pin(async move {
                    let original = ledger::get_transaction(txn, transaction_id).await?;
                    if original.is_deleted {
                        return Err(ServiceError::ValidationError(format!(
                            "Transaction {} is already voided",
                            original.id
                        )));
                    }
                    let batch_id = original.batch_id.ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "Transaction {} has no batch; post a manual correction instead",
                            original.id
                        ))
                    })?;

                    let original_type = MovementTypeEntity::find_by_id(original.movement_type_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Movement type {} not found",
                                original.movement_type_id
                            ))
                        })?;
                    let original_code = parse_code(&original_type)?;
                    let reverse_code = original_code.reverse();

                    let reverse_type = MovementTypeEntity::find()
                        .filter(movement_type::Column::Code.eq(reverse_code.to_string()))
                        .filter(movement_type::Column::Active.eq(true))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Movement type {} not found or inactive",
                                reverse_code
                            ))
                        })?;

                    ledger::void_transaction(txn, original.id).await?;

                    let reversal_input = PostMovement {
                        movement_code: reverse_code,
                        txn_type: "REVERSAL".to_string(),
                        txn_date: None,
                        source_type: "REVERSAL".to_string(),
                        source_id: original.id,
                        source_line_id: original.source_line_id,
                        product_id: original.product_id,
                        warehouse_id: original.warehouse_id,
                        batch_id,
                        qty: original.qty,
                        unit_cost: Some(original.unit_cost),
                        currency_id: original.currency_id,
                        exchange_rate: original.exchange_rate,
                        uom_id: original.uom_id,
                    };
                    let outcome = post_one(txn, &reversal_input, &reverse_type).await?;
                    Ok((original.id, outcome, reversal_input))
                })
            })
            .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::TransactionVoided {
                transaction_id: original_id,
            })
            .await
        {
            warn!(error = %e, "Failed to publish void event");
        }
        if let Err(e) = self
            .event_sender
            .send(Event::TransactionReversed {
                original_id,
                reversal_id: outcome.transaction_id,
            })
            .await
        {
            warn!(error = %e, "Failed to publish reversal event");
        }
        self.publish_movement(&reversal_input, &outcome).await;

        info!(
            original_id = %original_id,
            reversal_id = %outcome.transaction_id,
            "Transaction reversed"
        );
        Ok(outcome)
    }

    /// Soft-voids a ledger row without touching stock. See
    /// [`reverse_transaction`](Self::reverse_transaction) for the reversing
    /// path.
    #[instrument(skip(self))]
    pub async fn void_transaction(&self, transaction_id: Uuid) -> Result<(), ServiceError> {
        ledger::void_transaction(&*self.db, transaction_id).await?;
        if let Err(e) = self
            .event_sender
            .send(Event::TransactionVoided { transaction_id })
            .await
        {
            warn!(error = %e, "Failed to publish void event");
        }
        Ok(())
    }

    /// Runs a batch of movement postings inside one transaction.
    async fn apply_in_transaction(
        &self,
        inputs: Vec<(PostMovement, movement_type::Model)>,
    ) -> Result<Vec<MovementOutcome>, ServiceError> {
        self.access
            .transaction::<_, Vec<MovementOutcome>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut outcomes = Vec::with_capacity(inputs.len());
                    for (input, movement) in &inputs {
                        outcomes.push(post_one(txn, input, movement).await?);
                    }
                    Ok(outcomes)
                })
            })
            .await
    }

    async fn publish_movement(&self, input: &PostMovement, outcome: &MovementOutcome) {
        let event = Event::MovementApplied {
            transaction_id: outcome.transaction_id,
            movement_code: input.movement_code.to_string(),
            product_id: input.product_id,
            warehouse_id: input.warehouse_id,
            batch_id: input.batch_id,
            qty: input.qty,
            new_qty_on_hand: outcome
                .position
                .as_ref()
                .map(|p| p.qty_on_hand)
                .unwrap_or(Decimal::ZERO),
            txn_date: input.txn_date.unwrap_or_else(Utc::now),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to publish movement event");
        }
    }
}

/// Applies one movement and appends its ledger line on the given
/// transaction. Transit movements skip the position store entirely: the
/// transit balance is a ledger-side projection.
async fn post_one<C: sea_orm::ConnectionTrait>(
    txn: &C,
    input: &PostMovement,
    movement: &movement_type::Model,
) -> Result<MovementOutcome, ServiceError> {
    if input.qty <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Movement quantity must be positive, got {}",
            input.qty
        )));
    }

    let direction = parse_direction(movement)?;
    let class = movement.class().map_err(|_| {
        ServiceError::InternalError(format!(
            "Movement type {} carries unknown class '{}'",
            movement.code, movement.class
        ))
    })?;

    let needs_caller_cost =
        direction == MovementDirection::In || !class.affects_regular_stock();
    if needs_caller_cost && input.unit_cost.is_none() {
        return Err(ServiceError::ValidationError(format!(
            "unit_cost is required for {} movements",
            movement.code
        )));
    }

    let (position, ledger_cost) = if class.affects_regular_stock() {
        let updated = positions::apply_movement(
            txn,
            &ApplyMovement {
                product_id: input.product_id,
                warehouse_id: input.warehouse_id,
                batch_id: input.batch_id,
                qty: input.qty,
                unit_cost: input.unit_cost.unwrap_or(Decimal::ZERO),
                currency_id: input.currency_id,
                uom_id: input.uom_id,
            },
            movement,
        )
        .await?;
        // For outbound movements the ledger line is costed at the moving
        // average, which depletion leaves unchanged on the position.
        let cost = match direction {
            MovementDirection::In => input.unit_cost.unwrap_or(updated.unit_cost),
            MovementDirection::Out => updated.unit_cost,
        };
        (Some(updated), cost)
    } else {
        (None, input.unit_cost.unwrap_or(Decimal::ZERO))
    };

    let transaction_id = ledger::record_transaction(
        txn,
        &NewTransaction {
            txn_date: input.txn_date.unwrap_or_else(Utc::now),
            movement_type_id: movement.id,
            txn_type: input.txn_type.clone(),
            source_type: input.source_type.clone(),
            source_id: input.source_id,
            source_line_id: input.source_line_id,
            product_id: input.product_id,
            warehouse_id: input.warehouse_id,
            batch_id: Some(input.batch_id),
            qty: input.qty,
            unit_cost: ledger_cost,
            currency_id: input.currency_id,
            exchange_rate: input.exchange_rate,
            uom_id: input.uom_id,
        },
    )
    .await?;

    Ok(MovementOutcome {
        transaction_id,
        position,
    })
}

fn parse_direction(
    movement: &movement_type::Model,
) -> Result<MovementDirection, ServiceError> {
    movement.direction().map_err(|_| {
        ServiceError::InternalError(format!(
            "Movement type {} carries unknown direction '{}'",
            movement.code, movement.direction
        ))
    })
}

fn parse_code(movement: &movement_type::Model) -> Result<MovementCode, ServiceError> {
    movement.movement_code().map_err(|_| {
        ServiceError::InternalError(format!(
            "Movement type {} is not a known code",
            movement.code
        ))
    })
}
