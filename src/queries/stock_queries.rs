use crate::{
    entities::{
        batch::{self, Entity as BatchEntity},
        movement_type::{self, Entity as MovementTypeEntity, MovementClass, MovementDirection},
        stock_position::{self, Entity as StockPositionEntity},
        stock_transaction::{self, Entity as StockTransactionEntity},
    },
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}

/// Stock of one batch at one warehouse, joined from position and batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStockRow {
    pub batch_id: i64,
    pub batch_no: String,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub qty_on_hand: Decimal,
    pub unit_cost: Decimal,
    pub mfg_date: Option<NaiveDate>,
    pub exp_date: Option<NaiveDate>,
}

fn batch_stock_row(
    position: stock_position::Model,
    batch: Option<batch::Model>,
) -> Option<BatchStockRow> {
    batch.map(|b| BatchStockRow {
        batch_id: position.batch_id,
        batch_no: b.batch_no,
        product_id: position.product_id,
        warehouse_id: position.warehouse_id,
        qty_on_hand: position.qty_on_hand,
        unit_cost: position.unit_cost,
        mfg_date: b.mfg_date,
        exp_date: b.exp_date,
    })
}

/// Batches with stock available to allocate for a key, oldest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetAvailableBatchesQuery {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
}

#[async_trait]
impl Query for GetAvailableBatchesQuery {
    type Result = Vec<BatchStockRow>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let rows = StockPositionEntity::find()
            .find_also_related(BatchEntity)
            .filter(stock_position::Column::ProductId.eq(self.product_id))
            .filter(stock_position::Column::WarehouseId.eq(self.warehouse_id))
            .filter(stock_position::Column::QtyOnHand.gt(Decimal::ZERO))
            .order_by_asc(stock_position::Column::BatchId)
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(pos, b)| batch_stock_row(pos, b))
            .collect())
    }
}

/// Paged batch-stock listing with optional key filters. Zero-quantity
/// positions are excluded unless `include_empty` is set.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GetBatchStockQuery {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub batch_id: Option<i64>,
    pub include_empty: bool,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[async_trait]
impl Query for GetBatchStockQuery {
    type Result = Vec<BatchStockRow>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut query = StockPositionEntity::find().find_also_related(BatchEntity);

        if let Some(product_id) = self.product_id {
            query = query.filter(stock_position::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = self.warehouse_id {
            query = query.filter(stock_position::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(batch_id) = self.batch_id {
            query = query.filter(stock_position::Column::BatchId.eq(batch_id));
        }
        if !self.include_empty {
            query = query.filter(stock_position::Column::QtyOnHand.gt(Decimal::ZERO));
        }

        let rows = query
            .order_by_asc(stock_position::Column::ProductId)
            .order_by_asc(stock_position::Column::WarehouseId)
            .order_by_asc(stock_position::Column::BatchId)
            .offset(self.offset)
            .limit(self.limit)
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(pos, b)| batch_stock_row(pos, b))
            .collect())
    }
}

/// Batches expiring within `days` from today that still have stock,
/// soonest expiry first.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetNearExpiryBatchesQuery {
    pub days: i64,
    pub warehouse_id: Option<Uuid>,
}

#[async_trait]
impl Query for GetNearExpiryBatchesQuery {
    type Result = Vec<BatchStockRow>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let cutoff = Utc::now().date_naive() + Duration::days(self.days);

        let mut query = StockPositionEntity::find()
            .find_also_related(BatchEntity)
            .filter(stock_position::Column::QtyOnHand.gt(Decimal::ZERO))
            .filter(batch::Column::ExpDate.is_not_null())
            .filter(batch::Column::ExpDate.lte(cutoff));

        if let Some(warehouse_id) = self.warehouse_id {
            query = query.filter(stock_position::Column::WarehouseId.eq(warehouse_id));
        }

        let rows = query
            .order_by_asc(batch::Column::ExpDate)
            .order_by_asc(stock_position::Column::BatchId)
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(pos, b)| batch_stock_row(pos, b))
            .collect())
    }
}

/// Paged ledger history with optional filters. Voided rows are hidden
/// unless `include_voided` is set.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GetInventoryTransactionsQuery {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub batch_id: Option<i64>,
    pub movement_type_id: Option<i32>,
    pub source_type: Option<String>,
    pub source_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub include_voided: bool,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[async_trait]
impl Query for GetInventoryTransactionsQuery {
    type Result = Vec<stock_transaction::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut query = StockTransactionEntity::find();

        if let Some(product_id) = self.product_id {
            query = query.filter(stock_transaction::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = self.warehouse_id {
            query = query.filter(stock_transaction::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(batch_id) = self.batch_id {
            query = query.filter(stock_transaction::Column::BatchId.eq(batch_id));
        }
        if let Some(movement_type_id) = self.movement_type_id {
            query = query.filter(stock_transaction::Column::MovementTypeId.eq(movement_type_id));
        }
        if let Some(source_type) = &self.source_type {
            query = query.filter(stock_transaction::Column::SourceType.eq(source_type.clone()));
        }
        if let Some(source_id) = self.source_id {
            query = query.filter(stock_transaction::Column::SourceId.eq(source_id));
        }
        if let Some(from) = self.date_from {
            query = query.filter(stock_transaction::Column::TxnDate.gte(from));
        }
        if let Some(to) = self.date_to {
            query = query.filter(stock_transaction::Column::TxnDate.lte(to));
        }
        if !self.include_voided {
            query = query.filter(stock_transaction::Column::IsDeleted.eq(false));
        }

        query
            .order_by_desc(stock_transaction::Column::TxnDate)
            .order_by_desc(stock_transaction::Column::CreatedAt)
            .offset(self.offset)
            .limit(self.limit)
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Every batch known to the registry, in creation order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GetAllBatchesQuery {}

#[async_trait]
impl Query for GetAllBatchesQuery {
    type Result = Vec<batch::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        BatchEntity::find()
            .order_by_asc(batch::Column::Id)
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Transit-aware stock on hand for a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOnHand {
    pub regular_qty: Decimal,
    pub transit_in: Decimal,
    pub transit_out: Decimal,
    pub total: Decimal,
}

/// `regular + transit_in - transit_out`, where the regular quantity comes
/// from the position aggregate (already net of regular in/out/discard) and
/// the transit terms are recomputed from non-voided transit ledger rows on
/// every call. A read-side projection, not a stored balance.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetStockOnHandQuery {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub batch_id: Option<i64>,
}

#[async_trait]
impl Query for GetStockOnHandQuery {
    type Result = StockOnHand;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut position_query = StockPositionEntity::find()
            .select_only()
            .column_as(
                Expr::col((
                    stock_position::Entity,
                    stock_position::Column::QtyOnHand,
                ))
                .sum(),
                "total",
            )
            .filter(stock_position::Column::ProductId.eq(self.product_id))
            .filter(stock_position::Column::WarehouseId.eq(self.warehouse_id));
        if let Some(batch_id) = self.batch_id {
            position_query = position_query.filter(stock_position::Column::BatchId.eq(batch_id));
        }

        let regular_qty = position_query
            .into_tuple::<Option<Decimal>>()
            .one(db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .flatten()
            .unwrap_or(Decimal::ZERO);

        let transit_types = MovementTypeEntity::find()
            .filter(movement_type::Column::Class.eq(MovementClass::Transit.to_string()))
            .all(db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let transit_in = self
            .transit_sum(db_pool, &transit_types, MovementDirection::In)
            .await?;
        let transit_out = self
            .transit_sum(db_pool, &transit_types, MovementDirection::Out)
            .await?;

        Ok(StockOnHand {
            regular_qty,
            transit_in,
            transit_out,
            total: regular_qty + transit_in - transit_out,
        })
    }
}

impl GetStockOnHandQuery {
    async fn transit_sum(
        &self,
        db_pool: &DatabaseConnection,
        transit_types: &[movement_type::Model],
        direction: MovementDirection,
    ) -> Result<Decimal, ServiceError> {
        let type_ids: Vec<i32> = transit_types
            .iter()
            .filter(|t| t.direction == direction.to_string())
            .map(|t| t.id)
            .collect();

        if type_ids.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let mut query = StockTransactionEntity::find()
            .select_only()
            .column_as(
                Expr::col((
                    stock_transaction::Entity,
                    stock_transaction::Column::Qty,
                ))
                .sum(),
                "total",
            )
            .filter(stock_transaction::Column::ProductId.eq(self.product_id))
            .filter(stock_transaction::Column::WarehouseId.eq(self.warehouse_id))
            .filter(stock_transaction::Column::MovementTypeId.is_in(type_ids))
            .filter(stock_transaction::Column::IsDeleted.eq(false));
        if let Some(batch_id) = self.batch_id {
            query = query.filter(stock_transaction::Column::BatchId.eq(batch_id));
        }

        Ok(query
            .into_tuple::<Option<Decimal>>()
            .one(db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .flatten()
            .unwrap_or(Decimal::ZERO))
    }
}
