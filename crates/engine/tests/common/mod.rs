#![allow(dead_code)]

use chrono::{Days, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{Actor, Card, CardNumberCodec, Engine, codec::KEY_LEN};
use migration::MigratorTrait;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const ROOT: &str = "root";
pub const CAROL: &str = "carol";

pub fn alice() -> Actor {
    Actor::user(ALICE)
}

pub fn bob() -> Actor {
    Actor::user(BOB)
}

pub fn root() -> Actor {
    Actor::admin(ROOT)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn yesterday() -> NaiveDate {
    today() - Days::new(1)
}

/// Engine over a migrated in-memory database seeded with `alice`, `bob`
/// (users), `root` (admin) and `carol` (inactive user).
pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for (id, role, active) in [
        (ALICE, "user", true),
        (BOB, "user", true),
        (ROOT, "admin", true),
        (CAROL, "user", false),
    ] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (id, role, active) VALUES (?, ?, ?)",
            vec![id.into(), role.into(), active.into()],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder()
        .database(db.clone())
        .codec(CardNumberCodec::new(&[7u8; KEY_LEN]).unwrap())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn set_balance(db: &DatabaseConnection, card_id: Uuid, cents: i64) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE cards SET balance = ? WHERE id = ?",
        vec![cents.into(), card_id.to_string().into()],
    ))
    .await
    .unwrap();
}

pub async fn set_expiration(db: &DatabaseConnection, card_id: Uuid, date: NaiveDate) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE cards SET expiration_date = ? WHERE id = ?",
        vec![date.into(), card_id.to_string().into()],
    ))
    .await
    .unwrap();
}

pub async fn balance_of(db: &DatabaseConnection, card_id: Uuid) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT balance FROM cards WHERE id = ?",
            vec![card_id.to_string().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "balance").unwrap()
}

pub async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

/// Drops a table so that the next write to it fails inside the store.
pub async fn drop_table(db: &DatabaseConnection, table: &str) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, format!("DROP TABLE {table}")))
        .await
        .unwrap();
}

/// Issues a card to `owner` and loads it with `cents`.
pub async fn funded_card(
    engine: &Engine,
    db: &DatabaseConnection,
    owner: &Actor,
    cents: i64,
) -> Card {
    let owner_id = match owner {
        Actor::User { user_id, .. } => user_id.clone(),
        Actor::System => panic!("cards belong to users"),
    };
    let card = engine.create_card(owner, &owner_id).await.unwrap();
    set_balance(db, card.id, cents).await;
    engine.card(owner, card.id).await.unwrap()
}
