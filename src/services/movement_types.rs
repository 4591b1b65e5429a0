use crate::{
    entities::movement_type::{self, Entity as MovementTypeEntity, MovementCode},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;

/// Read-only registry over the movement-type reference table. Movement
/// semantics (direction, class) are data, but lookups go through the typed
/// [`MovementCode`] enum so unknown codes fail fast instead of defaulting.
#[derive(Clone)]
pub struct MovementTypeService {
    db: Arc<DatabaseConnection>,
}

impl MovementTypeService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn lookup_by_code(
        &self,
        code: MovementCode,
    ) -> Result<movement_type::Model, ServiceError> {
        MovementTypeEntity::find()
            .filter(movement_type::Column::Code.eq(code.to_string()))
            .filter(movement_type::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Movement type {} not found or inactive", code))
            })
    }

    #[instrument(skip(self))]
    pub async fn lookup_by_id(&self, id: i32) -> Result<movement_type::Model, ServiceError> {
        MovementTypeEntity::find_by_id(id)
            .filter(movement_type::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Movement type {} not found or inactive", id))
            })
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<movement_type::Model>, ServiceError> {
        MovementTypeEntity::find()
            .filter(movement_type::Column::Active.eq(true))
            .order_by_asc(movement_type::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}
