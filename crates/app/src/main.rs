use std::{sync::Arc, time::Duration};

use engine::{CardNumberCodec, Engine, ExpirationSweeper};
use migration::{Migrator, MigratorTrait};
use settings::Database;
use tokio::sync::watch;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "cardledger={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let codec = CardNumberCodec::from_base64_key(&settings.cards.encryption_key)?;
    let engine = Engine::builder()
        .database(db)
        .codec(codec)
        .validity_years(settings.cards.validity_years)
        .build()
        .await?;
    let engine = Arc::new(engine);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if settings.sweeper.enabled {
        let sweeper = ExpirationSweeper::new(
            Arc::clone(&engine),
            Duration::from_secs(settings.sweeper.interval_secs),
        );
        tasks.spawn(async move {
            tracing::info!("Found sweeper settings...");
            sweeper.run(shutdown_rx).await;
        });
    } else {
        tracing::info!("expiration sweeper disabled");
    }

    tasks.spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {err}");
        }
        tracing::info!("shutting down");
        let _ = shutdown_tx.send(true);
    });

    while tasks.join_next().await.is_some() {}

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
