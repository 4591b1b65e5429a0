use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Canonical movement kinds. The database carries one reference row per
/// variant; unknown codes are rejected at the registry, never defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum MovementCode {
    #[strum(serialize = "REGULAR_IN")]
    RegularIn,
    #[strum(serialize = "REGULAR_OUT")]
    RegularOut,
    #[strum(serialize = "TRANSIT_IN")]
    TransitIn,
    #[strum(serialize = "TRANSIT_OUT")]
    TransitOut,
    #[strum(serialize = "DISCARD")]
    Discard,
}

impl MovementCode {
    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementCode::RegularIn | MovementCode::TransitIn => MovementDirection::In,
            MovementCode::RegularOut | MovementCode::TransitOut | MovementCode::Discard => {
                MovementDirection::Out
            }
        }
    }

    pub fn class(&self) -> MovementClass {
        match self {
            MovementCode::RegularIn | MovementCode::RegularOut => MovementClass::Regular,
            MovementCode::TransitIn | MovementCode::TransitOut => MovementClass::Transit,
            MovementCode::Discard => MovementClass::Discard,
        }
    }

    /// The movement that undoes this one. A discard is undone by a regular
    /// receipt: the stock comes back on hand at its recorded cost.
    pub fn reverse(&self) -> MovementCode {
        match self {
            MovementCode::RegularIn => MovementCode::RegularOut,
            MovementCode::RegularOut => MovementCode::RegularIn,
            MovementCode::TransitIn => MovementCode::TransitOut,
            MovementCode::TransitOut => MovementCode::TransitIn,
            MovementCode::Discard => MovementCode::RegularIn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum MovementDirection {
    #[strum(serialize = "IN")]
    In,
    #[strum(serialize = "OUT")]
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum MovementClass {
    #[strum(serialize = "REGULAR")]
    Regular,
    #[strum(serialize = "TRANSIT")]
    Transit,
    #[strum(serialize = "DISCARD")]
    Discard,
}

impl MovementClass {
    /// Whether movements of this class mutate the stock position aggregate.
    /// Transit movements only append ledger rows; the position is untouched.
    pub fn affects_regular_stock(&self) -> bool {
        matches!(self, MovementClass::Regular | MovementClass::Discard)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movement_types")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code: String,
    pub direction: String,
    pub class: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Parses the stored code; fails on rows that predate the known set.
    pub fn movement_code(&self) -> Result<MovementCode, strum::ParseError> {
        self.code.parse()
    }

    pub fn direction(&self) -> Result<MovementDirection, strum::ParseError> {
        self.direction.parse()
    }

    pub fn class(&self) -> Result<MovementClass, strum::ParseError> {
        self.class.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_transaction::Entity")]
    StockTransactions,
}

impl Related<super::stock_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
