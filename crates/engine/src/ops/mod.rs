use sea_orm::DatabaseConnection;

use crate::{EngineError, ResultEngine, codec::CardNumberCodec};

mod access;
mod cards;
mod history;
mod transfers;
mod users;

pub use cards::CardListFilter;
pub use history::HistoryFilter;

/// Default card validity, in years from issuance.
pub const DEFAULT_VALIDITY_YEARS: u32 = 3;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    pub(crate) database: DatabaseConnection,
    codec: CardNumberCodec,
    validity_years: u32,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The codec used for stored card numbers.
    pub fn codec(&self) -> &CardNumberCodec {
        &self.codec
    }

    pub fn validity_years(&self) -> u32 {
        self.validity_years
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    codec: Option<CardNumberCodec>,
    validity_years: Option<u32>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required card number codec
    pub fn codec(mut self, codec: CardNumberCodec) -> EngineBuilder {
        self.codec = Some(codec);
        self
    }

    /// Years a new card stays valid (default [`DEFAULT_VALIDITY_YEARS`]).
    pub fn validity_years(mut self, years: u32) -> EngineBuilder {
        self.validity_years = Some(years);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let codec = self
            .codec
            .ok_or_else(|| EngineError::Encryption("missing card number codec".to_string()))?;
        let validity_years = self.validity_years.unwrap_or(DEFAULT_VALIDITY_YEARS);
        if validity_years == 0 {
            return Err(EngineError::Validation(
                "card validity must be at least one year".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            codec,
            validity_years,
        })
    }
}
