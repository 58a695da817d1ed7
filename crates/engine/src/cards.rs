//! The module contains `Card`, its status state machine and the `cards` table.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, HistoryEventType, MoneyCents, ResultEngine, access::Capability, util::parse_uuid,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Blocked,
    /// Terminal: an expired card never changes status again.
    Expired,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Expired
    }
}

impl TryFrom<&str> for CardStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            "expired" => Ok(Self::Expired),
            other => Err(EngineError::Validation(format!(
                "invalid card status: {other}"
            ))),
        }
    }
}

/// A payment card.
///
/// The plain card number never leaves the codec: only `encrypted_number` is
/// kept here and in the database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub encrypted_number: String,
    pub status: CardStatus,
    pub expiration_date: NaiveDate,
    pub balance: MoneyCents,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    /// Set once the card has been renewed; points to the replacement.
    pub replaced_by: Option<Uuid>,
}

impl Card {
    pub fn new(
        encrypted_number: String,
        owner_id: String,
        expiration_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            encrypted_number,
            status: CardStatus::Active,
            expiration_date,
            balance: MoneyCents::ZERO,
            owner_id,
            created_at,
            replaced_by: None,
        }
    }

    /// A card is overdue the day after its expiration date.
    pub fn is_past_expiration(&self, today: NaiveDate) -> bool {
        self.expiration_date < today
    }

    /// Active and not overdue: the only state in which money can move.
    pub fn ensure_usable(&self, today: NaiveDate) -> ResultEngine<()> {
        if self.status == CardStatus::Expired || self.is_past_expiration(today) {
            return Err(EngineError::StateConflict("card is expired".to_string()));
        }
        if self.status != CardStatus::Active {
            return Err(EngineError::StateConflict("card is not active".to_string()));
        }
        Ok(())
    }
}

/// Status changes a card can go through after creation.
///
/// | transition | from            | to      | who             |
/// |------------|-----------------|---------|-----------------|
/// | `Block`    | active          | blocked | owner or admin  |
/// | `Unblock`  | blocked         | active  | admin           |
/// | `Activate` | blocked         | active  | admin           |
/// | `Expire`   | active, blocked | expired | system or admin |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardTransition {
    Block,
    Unblock,
    Activate,
    Expire,
}

impl CardTransition {
    pub fn target(self) -> CardStatus {
        match self {
            Self::Block => CardStatus::Blocked,
            Self::Unblock | Self::Activate => CardStatus::Active,
            Self::Expire => CardStatus::Expired,
        }
    }

    pub fn event_type(self) -> HistoryEventType {
        match self {
            Self::Block => HistoryEventType::CardBlocked,
            Self::Unblock => HistoryEventType::CardUnblocked,
            Self::Activate => HistoryEventType::CardActivated,
            Self::Expire => HistoryEventType::CardExpired,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Block => "blocked",
            Self::Unblock => "unblocked",
            Self::Activate => "activated",
            Self::Expire => "expired",
        }
    }

    pub fn permits(self, actor: &impl Capability, owner_id: &str) -> bool {
        match self {
            Self::Block => actor.is_owner_or_admin(owner_id),
            Self::Unblock | Self::Activate => actor.is_admin(),
            Self::Expire => actor.is_admin() || actor.is_system(),
        }
    }

    /// Checks that `card` may take this transition on `today`.
    ///
    /// Returns the status the card is leaving, which the caller uses as the
    /// expected value of its compare-and-set update.
    pub fn check(self, card: &Card, today: NaiveDate) -> ResultEngine<CardStatus> {
        let from = card.status;
        if from.is_terminal() {
            return Err(EngineError::StateConflict("card is expired".to_string()));
        }
        match self {
            Self::Block if from != CardStatus::Active => {
                Err(EngineError::StateConflict("card is not active".to_string()))
            }
            Self::Unblock | Self::Activate if from != CardStatus::Blocked => {
                Err(EngineError::StateConflict("card is not blocked".to_string()))
            }
            Self::Unblock | Self::Activate if card.is_past_expiration(today) => {
                Err(EngineError::StateConflict(
                    "card is past its expiration date".to_string(),
                ))
            }
            Self::Expire if !card.is_past_expiration(today) => Err(EngineError::StateConflict(
                "card has not reached its expiration date".to_string(),
            )),
            _ => Ok(from),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub encrypted_number: String,
    pub status: String,
    pub expiration_date: Date,
    pub balance: i64,
    pub owner_id: String,
    pub created_at: DateTimeUtc,
    pub replaced_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Card> for ActiveModel {
    fn from(card: &Card) -> Self {
        Self {
            id: ActiveValue::Set(card.id.to_string()),
            encrypted_number: ActiveValue::Set(card.encrypted_number.clone()),
            status: ActiveValue::Set(card.status.as_str().to_string()),
            expiration_date: ActiveValue::Set(card.expiration_date),
            balance: ActiveValue::Set(card.balance.cents()),
            owner_id: ActiveValue::Set(card.owner_id.clone()),
            created_at: ActiveValue::Set(card.created_at),
            replaced_by: ActiveValue::Set(card.replaced_by.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for Card {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "card")?,
            encrypted_number: model.encrypted_number,
            status: CardStatus::try_from(model.status.as_str())?,
            expiration_date: model.expiration_date,
            balance: MoneyCents::new(model.balance),
            owner_id: model.owner_id,
            created_at: model.created_at,
            replaced_by: model
                .replaced_by
                .as_deref()
                .map(|id| parse_uuid(id, "card"))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, TimeZone};

    use super::*;
    use crate::Actor;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn card(status: CardStatus, expiration_date: NaiveDate) -> Card {
        let mut card = Card::new(
            "opaque".to_string(),
            "alice".to_string(),
            expiration_date,
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        card.status = status;
        card
    }

    fn future() -> NaiveDate {
        today().checked_add_days(Days::new(30)).unwrap()
    }

    fn yesterday() -> NaiveDate {
        today().checked_sub_days(Days::new(1)).unwrap()
    }

    #[test]
    fn new_card_is_active_and_empty() {
        let card = card(CardStatus::Active, future());
        assert_eq!(card.status, CardStatus::Active);
        assert_eq!(card.balance, MoneyCents::ZERO);
        assert!(card.ensure_usable(today()).is_ok());
    }

    #[test]
    fn only_active_cards_in_date_are_usable() {
        assert!(card(CardStatus::Active, today()).ensure_usable(today()).is_ok());
        assert_eq!(
            card(CardStatus::Blocked, future()).ensure_usable(today()),
            Err(EngineError::StateConflict("card is not active".to_string()))
        );
        assert_eq!(
            card(CardStatus::Active, yesterday()).ensure_usable(today()),
            Err(EngineError::StateConflict("card is expired".to_string()))
        );
        assert_eq!(
            card(CardStatus::Blocked, yesterday()).ensure_usable(today()),
            Err(EngineError::StateConflict("card is expired".to_string()))
        );
        assert_eq!(
            card(CardStatus::Expired, future()).ensure_usable(today()),
            Err(EngineError::StateConflict("card is expired".to_string()))
        );
    }

    #[test]
    fn expiration_day_itself_is_not_overdue() {
        let card = card(CardStatus::Active, today());
        assert!(!card.is_past_expiration(today()));
        assert!(card.is_past_expiration(today().checked_add_days(Days::new(1)).unwrap()));
    }

    #[test]
    fn block_requires_active() {
        let t = CardTransition::Block;
        assert_eq!(t.check(&card(CardStatus::Active, future()), today()).unwrap(), CardStatus::Active);
        assert_eq!(
            t.check(&card(CardStatus::Blocked, future()), today()),
            Err(EngineError::StateConflict("card is not active".to_string()))
        );
    }

    #[test]
    fn expired_is_terminal_for_every_transition() {
        let expired = card(CardStatus::Expired, yesterday());
        for t in [
            CardTransition::Block,
            CardTransition::Unblock,
            CardTransition::Activate,
            CardTransition::Expire,
        ] {
            assert_eq!(
                t.check(&expired, today()),
                Err(EngineError::StateConflict("card is expired".to_string()))
            );
        }
    }

    #[test]
    fn unblock_rejects_overdue_cards() {
        let blocked = card(CardStatus::Blocked, yesterday());
        assert!(matches!(
            CardTransition::Unblock.check(&blocked, today()),
            Err(EngineError::StateConflict(_))
        ));
        let blocked = card(CardStatus::Blocked, future());
        assert_eq!(
            CardTransition::Activate.check(&blocked, today()).unwrap(),
            CardStatus::Blocked
        );
    }

    #[test]
    fn expire_requires_overdue_card() {
        assert!(matches!(
            CardTransition::Expire.check(&card(CardStatus::Active, future()), today()),
            Err(EngineError::StateConflict(_))
        ));
        assert_eq!(
            CardTransition::Expire
                .check(&card(CardStatus::Blocked, yesterday()), today())
                .unwrap(),
            CardStatus::Blocked
        );
    }

    #[test]
    fn transition_permissions() {
        let owner = Actor::user("alice");
        let stranger = Actor::user("bob");
        let admin = Actor::admin("root");
        let system = Actor::system();

        assert!(CardTransition::Block.permits(&owner, "alice"));
        assert!(!CardTransition::Block.permits(&stranger, "alice"));
        assert!(CardTransition::Block.permits(&admin, "alice"));

        assert!(!CardTransition::Unblock.permits(&owner, "alice"));
        assert!(CardTransition::Unblock.permits(&admin, "alice"));
        assert!(!CardTransition::Activate.permits(&system, "alice"));

        assert!(CardTransition::Expire.permits(&system, "alice"));
        assert!(CardTransition::Expire.permits(&admin, "alice"));
        assert!(!CardTransition::Expire.permits(&owner, "alice"));
    }

    #[test]
    fn model_round_trip_keeps_replacement_link() {
        let mut original = card(CardStatus::Blocked, future());
        original.balance = MoneyCents::new(4200);
        original.replaced_by = Some(Uuid::new_v4());

        let model = Model {
            id: original.id.to_string(),
            encrypted_number: original.encrypted_number.clone(),
            status: original.status.as_str().to_string(),
            expiration_date: original.expiration_date,
            balance: original.balance.cents(),
            owner_id: original.owner_id.clone(),
            created_at: original.created_at,
            replaced_by: original.replaced_by.map(|id| id.to_string()),
        };
        assert_eq!(Card::try_from(model).unwrap(), original);
    }
}
