use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Actor, Card, CardStatus, CardTransition, EngineError, HistoryEventType, MoneyCents,
    NewHistoryRecord, ResultEngine,
    access::{Capability, SYSTEM_USER_ID},
    card_number::generate_unique,
    cards,
    codec::CardNumberCodec,
    util::{expiration_after, normalize_required_id, today},
};

use super::{Engine, with_tx};

/// Filters for searching cards.
#[derive(Clone, Debug, Default)]
pub struct CardListFilter {
    /// Restricts to one owner. Non-admin callers are always restricted to
    /// themselves.
    pub owner_id: Option<String>,
    pub status: Option<CardStatus>,
    /// Only cards whose expiration date is strictly before this day.
    pub expiring_before: Option<NaiveDate>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Engine {
    /// Issues a new active card with a zero balance.
    ///
    /// Users can only issue cards to themselves; admins can issue to any
    /// active user.
    pub async fn create_card(&self, actor: &Actor, owner_id: &str) -> ResultEngine<Card> {
        let owner_id = normalize_required_id(owner_id, "owner id")?;
        if !actor.is_owner_or_admin(&owner_id) {
            return Err(EngineError::Forbidden(
                "cards can only be issued to yourself".to_string(),
            ));
        }
        let today = today();
        let card = with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            self.require_active_user(&db_tx, &owner_id).await?;
            self.issue_card(&db_tx, actor, &owner_id, MoneyCents::ZERO, today, None)
                .await
        })?;
        tracing::info!(card_id = %card.id, owner = %card.owner_id, by = actor.label(), "card issued");
        Ok(card)
    }

    /// ACTIVE -> BLOCKED. Allowed to the owner and to admins.
    pub async fn block_card(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<Card> {
        self.transition_card(actor, card_id, CardTransition::Block)
            .await
    }

    /// BLOCKED -> ACTIVE. Admin only.
    pub async fn unblock_card(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<Card> {
        self.transition_card(actor, card_id, CardTransition::Unblock)
            .await
    }

    /// BLOCKED -> ACTIVE, recorded as an activation. Admin only.
    pub async fn activate_card(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<Card> {
        self.transition_card(actor, card_id, CardTransition::Activate)
            .await
    }

    /// ACTIVE/BLOCKED -> EXPIRED for a card past its expiration date. Admin
    /// only; the expiration sweep goes through the same transition.
    pub async fn deactivate_card(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<Card> {
        self.transition_card(actor, card_id, CardTransition::Expire)
            .await
    }

    /// Replaces a card with a freshly numbered one for the same owner.
    ///
    /// The whole balance moves to the replacement. An active original is
    /// blocked; blocked or expired originals keep their status. The original
    /// stays readable and points to its replacement through `replaced_by`.
    pub async fn renew_card(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<Card> {
        let today = today();
        let replacement = with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            let original = self.require_card(&db_tx, card_id).await?;
            self.renew_in_tx(&db_tx, actor, original, today).await
        })?;
        tracing::info!(
            card_id = %card_id,
            replacement_id = %replacement.id,
            by = actor.label(),
            "card renewed"
        );
        Ok(replacement)
    }

    /// Returns a card the actor owns (any card for admins).
    pub async fn card(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<Card> {
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            self.require_card_read(&db_tx, card_id, actor).await
        })
    }

    /// Decrypted card number, for the owner or an admin.
    pub async fn card_number(&self, actor: &Actor, card_id: Uuid) -> ResultEngine<String> {
        let card = self.card(actor, card_id).await?;
        self.codec().decrypt(&card.encrypted_number)
    }

    /// Display form of the card number (`**** **** **** 1234`).
    pub async fn masked_card_number(
        &self,
        actor: &Actor,
        card_id: Uuid,
    ) -> ResultEngine<Option<String>> {
        let number = self.card_number(actor, card_id).await?;
        Ok(CardNumberCodec::mask(&number))
    }

    /// Lists cards, oldest first.
    pub async fn search_cards(
        &self,
        actor: &Actor,
        filter: &CardListFilter,
    ) -> ResultEngine<Vec<Card>> {
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            let owner = self.scope_to_self(actor, filter.owner_id.as_deref())?;

            let mut query = cards::Entity::find();
            if let Some(owner) = owner {
                query = query.filter(cards::Column::OwnerId.eq(owner.to_string()));
            }
            if let Some(status) = filter.status {
                query = query.filter(cards::Column::Status.eq(status.as_str()));
            }
            if let Some(before) = filter.expiring_before {
                query = query.filter(cards::Column::ExpirationDate.lt(before));
            }

            let models = query
                .order_by_asc(cards::Column::CreatedAt)
                .order_by_asc(cards::Column::Id)
                .offset(filter.offset)
                .limit(filter.limit)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Card::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    async fn transition_card(
        &self,
        actor: &Actor,
        card_id: Uuid,
        transition: CardTransition,
    ) -> ResultEngine<Card> {
        let today = today();
        let card = with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            let card = self.require_card(&db_tx, card_id).await?;
            self.apply_transition(&db_tx, actor, card, transition, today)
                .await
        })?;
        tracing::info!(card_id = %card.id, by = actor.label(), "card {}", transition.verb());
        Ok(card)
    }

    /// Moves `card` through `transition` and appends the matching history
    /// record.
    ///
    /// The status update is a compare-and-set on the status that was checked,
    /// so two racing transitions on the same card cannot both succeed.
    pub(crate) async fn apply_transition(
        &self,
        db: &DatabaseTransaction,
        actor: &impl Capability,
        mut card: Card,
        transition: CardTransition,
        today: NaiveDate,
    ) -> ResultEngine<Card> {
        if !transition.permits(actor, &card.owner_id) {
            return Err(EngineError::Forbidden(format!(
                "not allowed to change card status to {}",
                transition.target().as_str()
            )));
        }
        let from = transition.check(&card, today)?;
        let to = transition.target();

        let updated = cards::Entity::update_many()
            .col_expr(cards::Column::Status, Expr::value(to.as_str()))
            .filter(cards::Column::Id.eq(card.id.to_string()))
            .filter(cards::Column::Status.eq(from.as_str()))
            .exec(db)
            .await?;
        if updated.rows_affected != 1 {
            return Err(EngineError::StateConflict(
                "card status changed concurrently".to_string(),
            ));
        }

        let by = actor.user_id().unwrap_or(SYSTEM_USER_ID);
        self.record_history(
            db,
            NewHistoryRecord::new(
                transition.event_type(),
                format!("card {} {} by {by}", card.id, transition.verb()),
            )
            .user(actor.user_id())
            .card(card.id),
        )
        .await?;

        card.status = to;
        Ok(card)
    }

    /// Generates a number, stores the new card and records its activation.
    async fn issue_card(
        &self,
        db: &DatabaseTransaction,
        actor: &impl Capability,
        owner_id: &str,
        balance: MoneyCents,
        today: NaiveDate,
        renewal_of: Option<Uuid>,
    ) -> ResultEngine<Card> {
        let generated = generate_unique(self.codec(), move |encrypted| async move {
            self.encrypted_number_exists(db, &encrypted).await
        })
        .await?;

        let expiration_date = expiration_after(today, self.validity_years())?;
        let mut card = Card::new(
            generated.encrypted,
            owner_id.to_string(),
            expiration_date,
            Utc::now(),
        );
        card.balance = balance;
        cards::ActiveModel::from(&card).insert(db).await?;

        let by = actor.user_id().unwrap_or(SYSTEM_USER_ID);
        let description = match renewal_of {
            Some(original) => format!(
                "card {} issued to {owner_id} by {by} as renewal of card {original}, carrying {balance}",
                card.id
            ),
            None => format!("card {} issued to {owner_id} by {by}", card.id),
        };
        self.record_history(
            db,
            NewHistoryRecord::new(HistoryEventType::CardActivated, description)
                .user(actor.user_id())
                .card(card.id),
        )
        .await?;

        Ok(card)
    }

    async fn renew_in_tx(
        &self,
        db: &DatabaseTransaction,
        actor: &impl Capability,
        original: Card,
        today: NaiveDate,
    ) -> ResultEngine<Card> {
        if !actor.is_owner_or_admin(&original.owner_id) {
            return Err(EngineError::Forbidden("not the owner of the card".to_string()));
        }
        if original.replaced_by.is_some() {
            return Err(EngineError::StateConflict(
                "card has already been renewed".to_string(),
            ));
        }

        let balance = original.balance;
        let replacement = self
            .issue_card(
                db,
                actor,
                &original.owner_id,
                balance,
                today,
                Some(original.id),
            )
            .await?;

        let original_id = original.id;
        if original.status == CardStatus::Active {
            self.apply_transition(db, actor, original, CardTransition::Block, today)
                .await?;
        }

        let drained = cards::Entity::update_many()
            .col_expr(cards::Column::Balance, Expr::value(0i64))
            .col_expr(
                cards::Column::ReplacedBy,
                Expr::value(Some(replacement.id.to_string())),
            )
            .filter(cards::Column::Id.eq(original_id.to_string()))
            .filter(cards::Column::Balance.eq(balance.cents()))
            .filter(cards::Column::ReplacedBy.is_null())
            .exec(db)
            .await?;
        if drained.rows_affected != 1 {
            return Err(EngineError::StateConflict(
                "card changed concurrently".to_string(),
            ));
        }

        Ok(replacement)
    }
}
