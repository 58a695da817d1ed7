use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Actor, CardStatus, EngineError, HistoryEventType, MoneyCents, NewHistoryRecord, ResultEngine,
    Transfer, TransferStatus,
    access::{Capability, SYSTEM_USER_ID},
    cards,
    commands::TransferCmd,
    transfers,
    util::today,
};

use super::{Engine, with_tx};

impl Engine {
    /// Moves money between two cards.
    ///
    /// Checks run in a fixed order: both cards exist, they differ, the amount
    /// is positive, the actor owns the source (or is an admin), both cards are
    /// usable, and the source covers the amount. Debit, credit, the transfer
    /// row and its history record commit together or not at all.
    pub async fn create_transfer(&self, cmd: TransferCmd) -> ResultEngine<Transfer> {
        let today = today();
        let transfer = with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, &cmd.actor).await?;
            self.transfer_in_tx(&db_tx, &cmd, today).await
        })?;
        tracing::info!(
            transfer_id = %transfer.id,
            source = %transfer.source_card_id,
            dest = %transfer.dest_card_id,
            amount = %transfer.amount,
            by = cmd.actor.label(),
            "transfer completed"
        );
        Ok(transfer)
    }

    async fn transfer_in_tx(
        &self,
        db: &DatabaseTransaction,
        cmd: &TransferCmd,
        today: NaiveDate,
    ) -> ResultEngine<Transfer> {
        let source = self.require_card(db, cmd.source_card_id).await?;
        let dest = self.require_card(db, cmd.dest_card_id).await?;
        let transfer = Transfer::new(source.id, dest.id, cmd.amount, Utc::now())?;

        if !cmd.actor.is_owner_or_admin(&source.owner_id) {
            return Err(EngineError::Forbidden(
                "not the owner of the source card".to_string(),
            ));
        }
        source.ensure_usable(today)?;
        dest.ensure_usable(today)?;
        if source.balance < cmd.amount {
            return Err(EngineError::InsufficientFunds(format!(
                "card {} holds {}, needs {}",
                source.id, source.balance, cmd.amount
            )));
        }
        if dest.balance.checked_add(cmd.amount).is_none() {
            return Err(EngineError::InvalidAmount(
                "destination balance overflow".to_string(),
            ));
        }

        self.debit(db, source.id, cmd.amount, today).await?;

        let amount = cmd.amount.cents();
        let credited = cards::Entity::update_many()
            .col_expr(
                cards::Column::Balance,
                Expr::col(cards::Column::Balance).add(amount),
            )
            .filter(cards::Column::Id.eq(dest.id.to_string()))
            .filter(cards::Column::Status.eq(CardStatus::Active.as_str()))
            .filter(cards::Column::ExpirationDate.gte(today))
            .exec(db)
            .await?;
        if credited.rows_affected != 1 {
            return Err(EngineError::StateConflict(
                "destination card changed concurrently".to_string(),
            ));
        }

        transfers::ActiveModel::from(&transfer).insert(db).await?;

        let by = cmd.actor.user_id().unwrap_or(SYSTEM_USER_ID);
        self.record_history(
            db,
            NewHistoryRecord::new(
                HistoryEventType::Transfer,
                format!(
                    "transfer of {} from card {} to card {} by {by}",
                    transfer.amount, transfer.source_card_id, transfer.dest_card_id
                ),
            )
            .user(cmd.actor.user_id())
            .card(transfer.source_card_id)
            .counterpart_card(transfer.dest_card_id)
            .transfer(transfer.id),
        )
        .await?;

        Ok(transfer)
    }

    /// Takes `amount` from a card that is still usable and still covers it.
    ///
    /// When the conditional update matches nothing, the card is read again so
    /// a concurrent block or expiry surfaces as a state conflict rather than
    /// as missing funds.
    async fn debit(
        &self,
        db: &DatabaseTransaction,
        card_id: Uuid,
        amount: MoneyCents,
        today: NaiveDate,
    ) -> ResultEngine<()> {
        let debited = cards::Entity::update_many()
            .col_expr(
                cards::Column::Balance,
                Expr::col(cards::Column::Balance).sub(amount.cents()),
            )
            .filter(cards::Column::Id.eq(card_id.to_string()))
            .filter(cards::Column::Status.eq(CardStatus::Active.as_str()))
            .filter(cards::Column::ExpirationDate.gte(today))
            .filter(cards::Column::Balance.gte(amount.cents()))
            .exec(db)
            .await?;
        if debited.rows_affected == 1 {
            return Ok(());
        }

        let current = self.require_card(db, card_id).await?;
        current.ensure_usable(today)?;
        Err(EngineError::InsufficientFunds(format!(
            "card {card_id} holds {}, needs {amount}",
            current.balance
        )))
    }

    /// Returns a transfer touching a card the actor owns (any for admins).
    pub async fn transfer(&self, actor: &Actor, transfer_id: Uuid) -> ResultEngine<Transfer> {
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            let transfer = self.require_transfer(&db_tx, transfer_id).await?;
            if !actor.is_admin() {
                let source = self.require_card(&db_tx, transfer.source_card_id).await?;
                let dest = self.require_card(&db_tx, transfer.dest_card_id).await?;
                if !actor.is_owner(&source.owner_id) && !actor.is_owner(&dest.owner_id) {
                    return Err(EngineError::Forbidden(
                        "not a party to the transfer".to_string(),
                    ));
                }
            }
            Ok(transfer)
        })
    }

    /// Transfers where the card is the source or the destination, oldest
    /// first.
    pub async fn transfers_by_card(
        &self,
        actor: &Actor,
        card_id: Uuid,
    ) -> ResultEngine<Vec<Transfer>> {
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            self.require_card_read(&db_tx, card_id, actor).await?;
            let card_id = card_id.to_string();
            let condition = Condition::any()
                .add(transfers::Column::SourceCardId.eq(card_id.clone()))
                .add(transfers::Column::DestCardId.eq(card_id));
            self.list_transfers(&db_tx, condition).await
        })
    }

    /// Transfers touching any card owned by `user_id`.
    pub async fn transfers_by_user(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> ResultEngine<Vec<Transfer>> {
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            let user_id = self
                .scope_to_self(actor, Some(user_id))?
                .unwrap_or(user_id)
                .to_string();
            self.require_user(&db_tx, &user_id).await?;

            let card_ids: Vec<String> = cards::Entity::find()
                .select_only()
                .column(cards::Column::Id)
                .filter(cards::Column::OwnerId.eq(user_id))
                .into_tuple()
                .all(&db_tx)
                .await?;
            if card_ids.is_empty() {
                return Ok(Vec::new());
            }
            let condition = Condition::any()
                .add(transfers::Column::SourceCardId.is_in(card_ids.clone()))
                .add(transfers::Column::DestCardId.is_in(card_ids));
            self.list_transfers(&db_tx, condition).await
        })
    }

    /// All transfers with the given status. Admin only.
    pub async fn transfers_by_status(
        &self,
        actor: &Actor,
        status: TransferStatus,
    ) -> ResultEngine<Vec<Transfer>> {
        if !actor.is_admin() {
            return Err(EngineError::Forbidden(
                "listing transfers by status requires admin".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor).await?;
            let condition = Condition::all().add(transfers::Column::Status.eq(status.as_str()));
            self.list_transfers(&db_tx, condition).await
        })
    }

    async fn list_transfers(
        &self,
        db: &DatabaseTransaction,
        condition: Condition,
    ) -> ResultEngine<Vec<Transfer>> {
        transfers::Entity::find()
            .filter(condition)
            .order_by_asc(transfers::Column::CreatedAt)
            .order_by_asc(transfers::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Transfer::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::{ConnectionTrait, Database, Statement};

    use super::*;
    use crate::codec::{CardNumberCodec, KEY_LEN};

    async fn engine() -> Engine {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        db.execute(Statement::from_string(
            db.get_database_backend(),
            "INSERT INTO users (id, role, active) VALUES ('alice', 'user', 1)",
        ))
        .await
        .unwrap();
        Engine::builder()
            .database(db)
            .codec(CardNumberCodec::new(&[7u8; KEY_LEN]).unwrap())
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failed_debit_on_a_usable_card_is_missing_funds() {
        let engine = engine().await;
        let alice = Actor::user("alice");
        let card = engine.create_card(&alice, "alice").await.unwrap();

        let db_tx = engine.database.begin().await.unwrap();
        let err = engine
            .debit(&db_tx, card.id, MoneyCents::new(100), today())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds(_)));
    }

    #[tokio::test]
    async fn failed_debit_on_a_card_blocked_meanwhile_is_a_state_conflict() {
        let engine = engine().await;
        let alice = Actor::user("alice");
        let card = engine.create_card(&alice, "alice").await.unwrap();
        engine.block_card(&alice, card.id).await.unwrap();

        let db_tx = engine.database.begin().await.unwrap();
        let err = engine
            .debit(&db_tx, card.id, MoneyCents::new(100), today())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::StateConflict("card is not active".to_string()));
    }

    #[tokio::test]
    async fn failed_debit_after_the_last_valid_day_is_expired() {
        let engine = engine().await;
        let alice = Actor::user("alice");
        let card = engine.create_card(&alice, "alice").await.unwrap();
        let after_expiry = card.expiration_date.succ_opt().unwrap();

        let db_tx = engine.database.begin().await.unwrap();
        let err = engine
            .debit(&db_tx, card.id, MoneyCents::new(100), after_expiry)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::StateConflict("card is expired".to_string()));
    }
}
