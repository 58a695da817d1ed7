use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Actor, EngineError, HistoryEventType, HistoryRecord, NewHistoryRecord, ResultEngine,
    access::Capability, history,
};

use super::{Engine, with_tx};

/// Filters for reading the audit trail.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
/// A card filter matches records where the card is either side of the event.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub user_id: Option<String>,
    pub card_id: Option<Uuid>,
    pub transfer_id: Option<Uuid>,
    /// If present, acts as an allow-list of event types.
    pub event_types: Option<Vec<HistoryEventType>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

fn validate_history_filter(filter: &HistoryFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::Validation(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.event_types.as_ref().is_some_and(|e| e.is_empty()) {
        return Err(EngineError::Validation(
            "event_types must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    /// Appends one record to the audit trail inside `db`.
    pub(crate) async fn record_history(
        &self,
        db: &DatabaseTransaction,
        record: NewHistoryRecord,
    ) -> ResultEngine<HistoryRecord> {
        let record = record.into_record(Utc::now());
        history::ActiveModel::from(&record).insert(db).await?;
        Ok(record)
    }

    /// Reads the audit trail, oldest first.
    ///
    /// Admins can read everything. Other users must either filter by a card
    /// they own or only get records attributed to themselves.
    pub async fn history(
        &self,
        actor: &Actor,
        filter: &HistoryFilter,
    ) -> ResultEngine<Vec<HistoryRecord>> {
        validate_history_filter(filter)?;
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;

            let user_scope = match filter.card_id {
                Some(card_id) => {
                    self.require_card_read(&db_tx, card_id, actor).await?;
                    filter.user_id.clone()
                }
                None => self
                    .scope_to_self(actor, filter.user_id.as_deref())?
                    .map(ToString::to_string),
            };

            let mut query = history::Entity::find();
            if let Some(user_id) = user_scope {
                query = query.filter(history::Column::UserId.eq(user_id));
            }
            if let Some(card_id) = filter.card_id {
                query = query.filter(
                    Condition::any()
                        .add(history::Column::CardId.eq(card_id.to_string()))
                        .add(history::Column::CounterpartCardId.eq(card_id.to_string())),
                );
            }
            if let Some(transfer_id) = filter.transfer_id {
                query = query.filter(history::Column::TransferId.eq(transfer_id.to_string()));
            }
            if let Some(event_types) = &filter.event_types {
                let event_types: Vec<&str> = event_types.iter().map(|e| e.as_str()).collect();
                query = query.filter(history::Column::EventType.is_in(event_types));
            }
            if let Some(from) = filter.from {
                query = query.filter(history::Column::CreatedAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(history::Column::CreatedAt.lt(to));
            }

            let models = query
                .order_by_asc(history::Column::CreatedAt)
                .limit(filter.limit)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(HistoryRecord::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
