//! Audit trail records.
//!
//! History is append-only: records are inserted in the same transaction as
//! the change they describe and the engine exposes no way to edit or remove
//! them.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    Transfer,
    CardBlocked,
    CardUnblocked,
    CardExpired,
    CardActivated,
}

impl HistoryEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::CardBlocked => "card_blocked",
            Self::CardUnblocked => "card_unblocked",
            Self::CardExpired => "card_expired",
            Self::CardActivated => "card_activated",
        }
    }
}

impl TryFrom<&str> for HistoryEventType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transfer" => Ok(Self::Transfer),
            "card_blocked" => Ok(Self::CardBlocked),
            "card_unblocked" => Ok(Self::CardUnblocked),
            "card_expired" => Ok(Self::CardExpired),
            "card_activated" => Ok(Self::CardActivated),
            other => Err(EngineError::Validation(format!(
                "invalid history event type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub event_type: HistoryEventType,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub user_id: Option<String>,
    pub card_id: Option<Uuid>,
    /// Second card involved in the event (the destination of a transfer).
    pub counterpart_card_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
}

/// A record about to be appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHistoryRecord {
    pub event_type: HistoryEventType,
    pub description: String,
    pub user_id: Option<String>,
    pub card_id: Option<Uuid>,
    pub counterpart_card_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
}

impl NewHistoryRecord {
    #[must_use]
    pub fn new(event_type: HistoryEventType, description: impl Into<String>) -> Self {
        Self {
            event_type,
            description: description.into(),
            user_id: None,
            card_id: None,
            counterpart_card_id: None,
            transfer_id: None,
        }
    }

    #[must_use]
    pub fn user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn card(mut self, card_id: Uuid) -> Self {
        self.card_id = Some(card_id);
        self
    }

    #[must_use]
    pub fn counterpart_card(mut self, card_id: Uuid) -> Self {
        self.counterpart_card_id = Some(card_id);
        self
    }

    #[must_use]
    pub fn transfer(mut self, transfer_id: Uuid) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    /// Stamps the record.
    pub fn into_record(self, created_at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            id: Uuid::new_v4(),
            event_type: self.event_type,
            created_at,
            description: self.description,
            user_id: self.user_id,
            card_id: self.card_id,
            counterpart_card_id: self.counterpart_card_id,
            transfer_id: self.transfer_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub event_type: String,
    pub created_at: DateTimeUtc,
    pub description: String,
    pub user_id: Option<String>,
    pub card_id: Option<String>,
    pub counterpart_card_id: Option<String>,
    pub transfer_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&HistoryRecord> for ActiveModel {
    fn from(record: &HistoryRecord) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            event_type: ActiveValue::Set(record.event_type.as_str().to_string()),
            created_at: ActiveValue::Set(record.created_at),
            description: ActiveValue::Set(record.description.clone()),
            user_id: ActiveValue::Set(record.user_id.clone()),
            card_id: ActiveValue::Set(record.card_id.map(|id| id.to_string())),
            counterpart_card_id: ActiveValue::Set(
                record.counterpart_card_id.map(|id| id.to_string()),
            ),
            transfer_id: ActiveValue::Set(record.transfer_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for HistoryRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let optional = |value: Option<String>, label: &str| {
            value.as_deref().map(|id| parse_uuid(id, label)).transpose()
        };
        Ok(Self {
            id: parse_uuid(&model.id, "history")?,
            event_type: HistoryEventType::try_from(model.event_type.as_str())?,
            created_at: model.created_at,
            description: model.description,
            user_id: model.user_id,
            card_id: optional(model.card_id, "card")?,
            counterpart_card_id: optional(model.counterpart_card_id, "card")?,
            transfer_id: optional(model.transfer_id, "transfer")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_strings_round_trip() {
        for event in [
            HistoryEventType::Transfer,
            HistoryEventType::CardBlocked,
            HistoryEventType::CardUnblocked,
            HistoryEventType::CardExpired,
            HistoryEventType::CardActivated,
        ] {
            assert_eq!(HistoryEventType::try_from(event.as_str()).unwrap(), event);
        }
        assert!(HistoryEventType::try_from("card_deleted").is_err());
    }

    #[test]
    fn builder_sets_references() {
        let card = Uuid::new_v4();
        let other = Uuid::new_v4();
        let transfer = Uuid::new_v4();
        let record = NewHistoryRecord::new(HistoryEventType::Transfer, "moved 1.00")
            .user(Some("alice"))
            .card(card)
            .counterpart_card(other)
            .transfer(transfer)
            .into_record(Utc::now());

        assert_eq!(record.user_id.as_deref(), Some("alice"));
        assert_eq!(record.card_id, Some(card));
        assert_eq!(record.counterpart_card_id, Some(other));
        assert_eq!(record.transfer_id, Some(transfer));
        assert_eq!(record.description, "moved 1.00");
    }
}
