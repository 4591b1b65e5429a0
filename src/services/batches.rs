use crate::{
    entities::batch::{self, Entity as BatchEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Input for a batch upsert. Dates and notes are the mutable fields; the
/// `(product_id, batch_no)` pair is the identity.
#[derive(Debug, Clone)]
pub struct UpsertBatch {
    pub product_id: Uuid,
    pub batch_no: String,
    pub mfg_date: Option<NaiveDate>,
    pub exp_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Identity registry for physical batches. Quantity never passes through
/// here; that belongs to the stock position store.
#[derive(Clone)]
pub struct BatchService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl BatchService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates the batch or refreshes its mutable fields, returning the
    /// batch id either way. Concurrent identical calls converge on one row:
    /// a loser of the insert race hits the unique constraint, re-reads the
    /// winner's row and updates it.
    #[instrument(skip(self))]
    pub async fn upsert_batch(&self, input: UpsertBatch) -> Result<i64, ServiceError> {
        if input.batch_no.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "batch_no must not be empty".to_string(),
            ));
        }

        let existing = self.find_by_identity(&input).await?;

        let (batch_id, created) = match existing {
            Some(model) => (self.update_mutable_fields(model, &input).await?, false),
            None => match self.insert_new(&input).await {
                Ok(id) => (id, true),
                Err(e) if is_unique_violation(&e) => {
                    // Lost the insert race; the other caller's row is now
                    // visible through the unique index.
                    warn!(
                        product_id = %input.product_id,
                        batch_no = %input.batch_no,
                        "Concurrent batch insert detected; updating existing row"
                    );
                    let model = self.find_by_identity(&input).await?.ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "Batch {} vanished after unique violation",
                            input.batch_no
                        ))
                    })?;
                    (self.update_mutable_fields(model, &input).await?, false)
                }
                Err(e) => return Err(ServiceError::db_error(e)),
            },
        };

        info!(batch_id = %batch_id, batch_no = %input.batch_no, created = %created, "Batch upserted");

        if let Err(e) = self
            .event_sender
            .send(Event::BatchUpserted {
                batch_id,
                product_id: input.product_id,
                batch_no: input.batch_no.clone(),
                created,
            })
            .await
        {
            warn!(error = %e, "Failed to publish batch upsert event");
        }

        Ok(batch_id)
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, batch_id: i64) -> Result<batch::Model, ServiceError> {
        BatchEntity::find_by_id(batch_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))
    }

    async fn find_by_identity(
        &self,
        input: &UpsertBatch,
    ) -> Result<Option<batch::Model>, ServiceError> {
        BatchEntity::find()
            .filter(batch::Column::ProductId.eq(input.product_id))
            .filter(batch::Column::BatchNo.eq(input.batch_no.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn insert_new(&self, input: &UpsertBatch) -> Result<i64, DbErr> {
        let now = Utc::now();
        let model = batch::ActiveModel {
            product_id: Set(input.product_id),
            batch_no: Set(input.batch_no.clone()),
            mfg_date: Set(input.mfg_date),
            exp_date: Set(input.exp_date),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(model.id)
    }

    async fn update_mutable_fields(
        &self,
        model: batch::Model,
        input: &UpsertBatch,
    ) -> Result<i64, ServiceError> {
        let batch_id = model.id;
        let mut active: batch::ActiveModel = model.into();
        active.mfg_date = Set(input.mfg_date);
        active.exp_date = Set(input.exp_date);
        active.notes = Set(input.notes.clone());
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await.map_err(ServiceError::db_error)?;
        Ok(batch_id)
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("unique") || msg.contains("duplicate key")
}
