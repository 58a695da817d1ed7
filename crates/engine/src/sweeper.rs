//! Scheduled expiration of overdue cards.
//!
//! [`Engine::run_expiration_sweep`] is a single pass; [`ExpirationSweeper`]
//! repeats it on a fixed period until told to stop.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tokio::sync::watch;

use crate::{
    Actor, CardStatus, CardTransition, EngineError, ResultEngine, cards, ops::Engine,
    ops::with_tx, util,
};

/// Default time between two sweeps.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Overdue active cards found at the start of the pass.
    pub scanned: usize,
    pub expired: usize,
    /// Cards that changed status between the scan and their update.
    pub skipped: usize,
    pub failed: usize,
}

impl Engine {
    /// Expires every ACTIVE card whose expiration date is before `today`.
    ///
    /// Each card is expired in its own transaction, through the same
    /// transition as [`Engine::deactivate_card`], so one bad card does not
    /// hold back the others. Running it twice on the same day expires nothing
    /// the second time.
    pub async fn run_expiration_sweep(&self, today: NaiveDate) -> ResultEngine<SweepReport> {
        let candidates = cards::Entity::find()
            .filter(cards::Column::Status.eq(CardStatus::Active.as_str()))
            .filter(cards::Column::ExpirationDate.lt(today))
            .order_by_asc(cards::Column::ExpirationDate)
            .all(&self.database)
            .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        for model in candidates {
            let card_id = model.id.clone();
            match self.expire_one(model, today).await {
                Ok(()) => report.expired += 1,
                Err(EngineError::StateConflict(reason)) => {
                    tracing::debug!(card_id = %card_id, reason = %reason, "card skipped by sweep");
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(card_id = %card_id, "failed to expire card: {err}");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            %today,
            scanned = report.scanned,
            expired = report.expired,
            skipped = report.skipped,
            failed = report.failed,
            "expiration sweep finished"
        );
        Ok(report)
    }

    async fn expire_one(&self, model: cards::Model, today: NaiveDate) -> ResultEngine<()> {
        let card_id = util::parse_uuid(&model.id, "card")?;
        let system = Actor::system();
        with_tx!(self, |db_tx| {
            let card = self.require_card(&db_tx, card_id).await?;
            self.apply_transition(&db_tx, &system, card, CardTransition::Expire, today)
                .await
                .map(|_| ())
        })
    }
}

/// Runs [`Engine::run_expiration_sweep`] periodically.
pub struct ExpirationSweeper {
    engine: Arc<Engine>,
    period: Duration,
}

impl ExpirationSweeper {
    /// A zero period falls back to [`DEFAULT_SWEEP_PERIOD`].
    pub fn new(engine: Arc<Engine>, period: Duration) -> Self {
        let period = if period.is_zero() {
            DEFAULT_SWEEP_PERIOD
        } else {
            period
        };
        Self { engine, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One pass dated today (UTC).
    pub async fn tick(&self) -> ResultEngine<SweepReport> {
        self.engine.run_expiration_sweep(util::today()).await
    }

    /// Sweeps immediately, then once per period, until `shutdown` becomes
    /// `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(period_secs = self.period.as_secs(), "expiration sweeper started");
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::error!("expiration sweep failed: {err}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("expiration sweeper stopped");
    }
}

