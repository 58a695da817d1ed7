use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    Card, EngineError, ResultEngine, Transfer, access::Capability, cards, transfers, users,
};

use super::Engine;

impl Engine {
    /// Ensures a user actor is known and still active. The system actor always
    /// passes.
    pub(crate) async fn require_actor(
        &self,
        db: &DatabaseTransaction,
        actor: &impl Capability,
    ) -> ResultEngine<()> {
        let Some(user_id) = actor.user_id() else {
            return Ok(());
        };
        let active = users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .is_some_and(|user| user.active);
        if !active {
            return Err(EngineError::Forbidden("user is not active".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    pub(super) async fn require_active_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<users::Model> {
        let user = self.require_user(db, user_id).await?;
        if !user.active {
            return Err(EngineError::KeyNotFound("user not exists".to_string()));
        }
        Ok(user)
    }

    pub(crate) async fn require_card(
        &self,
        db: &DatabaseTransaction,
        card_id: Uuid,
    ) -> ResultEngine<Card> {
        let model = cards::Entity::find_by_id(card_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("card not exists".to_string()))?;
        Card::try_from(model)
    }

    /// Loads a card the actor owns (or any card for admins).
    pub(super) async fn require_card_read(
        &self,
        db: &DatabaseTransaction,
        card_id: Uuid,
        actor: &impl Capability,
    ) -> ResultEngine<Card> {
        let card = self.require_card(db, card_id).await?;
        if !actor.is_owner_or_admin(&card.owner_id) {
            return Err(EngineError::Forbidden("not the owner of the card".to_string()));
        }
        Ok(card)
    }

    pub(super) async fn require_transfer(
        &self,
        db: &DatabaseTransaction,
        transfer_id: Uuid,
    ) -> ResultEngine<Transfer> {
        let model = transfers::Entity::find_by_id(transfer_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transfer not exists".to_string()))?;
        Transfer::try_from(model)
    }

    pub(super) async fn encrypted_number_exists(
        &self,
        db: &DatabaseTransaction,
        encrypted_number: &str,
    ) -> ResultEngine<bool> {
        cards::Entity::find()
            .filter(cards::Column::EncryptedNumber.eq(encrypted_number.to_string()))
            .one(db)
            .await
            .map(|model| model.is_some())
            .map_err(Into::into)
    }

    /// Non-admins may only ask about themselves; returns the user id a query
    /// must be scoped to.
    pub(super) fn scope_to_self<'a>(
        &self,
        actor: &'a impl Capability,
        requested: Option<&'a str>,
    ) -> ResultEngine<Option<&'a str>> {
        if actor.is_admin() {
            return Ok(requested);
        }
        let me = actor
            .user_id()
            .ok_or_else(|| EngineError::Forbidden("user identity required".to_string()))?;
        match requested {
            Some(other) if other != me => Err(EngineError::Forbidden(
                "cannot read another user's data".to_string(),
            )),
            _ => Ok(Some(me)),
        }
    }
}
