//! Card-to-card transfers.
//!
//! A `Transfer` is written once, in the same database transaction that moves
//! the money, and never updated afterwards.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Success,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
        }
    }
}

impl TryFrom<&str> for TransferStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "success" => Ok(Self::Success),
            other => Err(EngineError::Validation(format!(
                "invalid transfer status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub source_card_id: Uuid,
    pub dest_card_id: Uuid,
    pub amount: MoneyCents,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Builds a successful transfer, enforcing the shape invariants: a
    /// positive amount between two different cards.
    pub fn new(
        source_card_id: Uuid,
        dest_card_id: Uuid,
        amount: MoneyCents,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if source_card_id == dest_card_id {
            return Err(EngineError::Validation("same-card transfer".to_string()));
        }
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "transfer amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source_card_id,
            dest_card_id,
            amount,
            status: TransferStatus::Success,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub source_card_id: String,
    pub dest_card_id: String,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transfer> for ActiveModel {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            source_card_id: ActiveValue::Set(transfer.source_card_id.to_string()),
            dest_card_id: ActiveValue::Set(transfer.dest_card_id.to_string()),
            amount: ActiveValue::Set(transfer.amount.cents()),
            status: ActiveValue::Set(transfer.status.as_str().to_string()),
            created_at: ActiveValue::Set(transfer.created_at),
        }
    }
}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transfer")?,
            source_card_id: parse_uuid(&model.source_card_id, "card")?,
            dest_card_id: parse_uuid(&model.dest_card_id, "card")?,
            amount: MoneyCents::new(model.amount),
            status: TransferStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_same_card() {
        let id = Uuid::new_v4();
        assert_eq!(
            Transfer::new(id, id, MoneyCents::new(100), Utc::now()),
            Err(EngineError::Validation("same-card transfer".to_string()))
        );
    }

    #[test]
    fn rejects_non_positive_amounts() {
        for cents in [0, -1, -10_000] {
            assert!(matches!(
                Transfer::new(Uuid::new_v4(), Uuid::new_v4(), MoneyCents::new(cents), Utc::now()),
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[test]
    fn new_transfer_is_successful() {
        let transfer =
            Transfer::new(Uuid::new_v4(), Uuid::new_v4(), MoneyCents::new(3000), Utc::now())
                .unwrap();
        assert_eq!(transfer.status, TransferStatus::Success);
        assert_eq!(transfer.amount.to_string(), "30.00");
    }
}
