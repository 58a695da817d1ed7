//! Command structs for engine operations.
//!
//! These types group the parameters of write operations, keeping call sites
//! readable and avoiding long argument lists.

use uuid::Uuid;

use crate::{Actor, MoneyCents};

/// Move money from one card to another.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub source_card_id: Uuid,
    pub dest_card_id: Uuid,
    pub amount: MoneyCents,
    pub actor: Actor,
}

impl TransferCmd {
    #[must_use]
    pub fn new(source_card_id: Uuid, dest_card_id: Uuid, amount: MoneyCents, actor: Actor) -> Self {
        Self {
            source_card_id,
            dest_card_id,
            amount,
            actor,
        }
    }
}
