//! Card ledger engine: card lifecycle, card-to-card transfers, the audit
//! trail and the scheduled expiration of overdue cards.
//!
//! Everything goes through [`Engine`], built with [`Engine::builder`] from a
//! sea-orm connection and a [`CardNumberCodec`].

pub use access::{Actor, Capability, Role};
pub use cards::{Card, CardStatus, CardTransition};
pub use codec::CardNumberCodec;
pub use commands::TransferCmd;
pub use error::EngineError;
pub use history::{HistoryEventType, HistoryRecord, NewHistoryRecord};
pub use money::MoneyCents;
pub use ops::{CardListFilter, DEFAULT_VALIDITY_YEARS, Engine, EngineBuilder, HistoryFilter};
pub use sweeper::{DEFAULT_SWEEP_PERIOD, ExpirationSweeper, SweepReport};
pub use transfers::{Transfer, TransferStatus};
pub use users::User;

pub mod access;
pub mod card_number;
mod cards;
pub mod codec;
mod commands;
mod error;
mod history;
mod money;
mod ops;
mod sweeper;
mod transfers;
mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
