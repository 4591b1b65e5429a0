use crate::{
    entities::stock_transaction::{self, Entity as StockTransactionEntity},
    errors::ServiceError,
    services::costing,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tracing::debug;
use uuid::Uuid;

/// Fields for one ledger line. `qty` is a positive magnitude; the movement
/// type carries the sign. Amounts are derived here, nowhere else.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub txn_date: DateTime<Utc>,
    pub movement_type_id: i32,
    pub txn_type: String,
    pub source_type: String,
    pub source_id: Uuid,
    pub source_line_id: Option<Uuid>,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub batch_id: Option<i64>,
    pub qty: Decimal,
    pub unit_cost: Decimal,
    pub currency_id: Option<Uuid>,
    pub exchange_rate: Option<Decimal>,
    pub uom_id: Option<Uuid>,
}

/// Appends one immutable ledger row inside the caller's transaction.
///
/// `amount = qty * unit_cost`; `foreign_amount` is the transaction-currency
/// amount (defaults to `amount`); `total_amount` is the base-currency amount
/// (`amount * exchange_rate` when a rate is supplied, else `amount`).
pub async fn record_transaction<C: ConnectionTrait>(
    conn: &C,
    input: &NewTransaction,
) -> Result<Uuid, ServiceError> {
    if input.source_type.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "source_type must not be empty".to_string(),
        ));
    }
    if input.qty <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Transaction quantity must be positive, got {}",
            input.qty
        )));
    }

    let amount = costing::round_money(input.qty * input.unit_cost);
    let foreign_amount = amount;
    let total_amount = match input.exchange_rate {
        Some(rate) => costing::round_money(amount * rate),
        None => amount,
    };

    let id = Uuid::new_v4();
    stock_transaction::ActiveModel {
        id: Set(id),
        txn_date: Set(input.txn_date),
        movement_type_id: Set(input.movement_type_id),
        txn_type: Set(input.txn_type.clone()),
        source_type: Set(input.source_type.clone()),
        source_id: Set(input.source_id),
        source_line_id: Set(input.source_line_id),
        product_id: Set(input.product_id),
        warehouse_id: Set(input.warehouse_id),
        batch_id: Set(input.batch_id),
        qty: Set(input.qty),
        unit_cost: Set(input.unit_cost),
        amount: Set(amount),
        currency_id: Set(input.currency_id),
        exchange_rate: Set(input.exchange_rate),
        foreign_amount: Set(foreign_amount),
        total_amount: Set(total_amount),
        uom_id: Set(input.uom_id),
        is_deleted: Set(false),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    debug!(transaction_id = %id, amount = %amount, "Ledger transaction recorded");
    Ok(id)
}

/// Flips the soft-void flag on a ledger row. Voiding is a display/audit
/// marker only: it never re-derives `qty_on_hand`. Reversing economic effect
/// requires a compensating movement as well. Voiding an already-voided row
/// is a no-op.
pub async fn void_transaction<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<stock_transaction::Model, ServiceError> {
    let txn = StockTransactionEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", id)))?;

    if txn.is_deleted {
        return Ok(txn);
    }

    let mut active: stock_transaction::ActiveModel = txn.into();
    active.is_deleted = Set(true);
    active.update(conn).await.map_err(ServiceError::db_error)
}

/// Fetches one ledger row by id.
pub async fn get_transaction<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<stock_transaction::Model, ServiceError> {
    StockTransactionEntity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", id)))
}
