//! Initial schema: creates every table the card ledger needs.
//!
//! - `users`: identities allowed to act, with their role
//! - `cards`: payment cards, their status and balance
//! - `transfers`: completed card-to-card transfers
//! - `history`: append-only audit trail

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Role,
    Active,
}

#[derive(Iden)]
enum Cards {
    Table,
    Id,
    EncryptedNumber,
    Status,
    ExpirationDate,
    Balance,
    OwnerId,
    CreatedAt,
    ReplacedBy,
}

#[derive(Iden)]
enum Transfers {
    Table,
    Id,
    SourceCardId,
    DestCardId,
    Amount,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum History {
    Table,
    Id,
    EventType,
    CreatedAt,
    Description,
    UserId,
    CardId,
    CounterpartCardId,
    TransferId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string()
                            .not_null()
                            .default("user"),
                    )
                    .col(
                        ColumnDef::new(Users::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Cards
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Cards::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Cards::Id).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(Cards::EncryptedNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Cards::Status).string().not_null())
                    .col(ColumnDef::new(Cards::ExpirationDate).date().not_null())
                    .col(
                        ColumnDef::new(Cards::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Cards::OwnerId).string().not_null())
                    .col(ColumnDef::new(Cards::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Cards::ReplacedBy).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-cards-owner_id")
                            .from(Cards::Table, Cards::OwnerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-cards-status-expiration_date")
                    .table(Cards::Table)
                    .col(Cards::Status)
                    .col(Cards::ExpirationDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-cards-owner_id")
                    .table(Cards::Table)
                    .col(Cards::OwnerId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transfers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transfers::SourceCardId).string().not_null())
                    .col(ColumnDef::new(Transfers::DestCardId).string().not_null())
                    .col(ColumnDef::new(Transfers::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::Status).string().not_null())
                    .col(ColumnDef::new(Transfers::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-source_card_id")
                            .from(Transfers::Table, Transfers::SourceCardId)
                            .to(Cards::Table, Cards::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-dest_card_id")
                            .from(Transfers::Table, Transfers::DestCardId)
                            .to(Cards::Table, Cards::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-source_card_id")
                    .table(Transfers::Table)
                    .col(Transfers::SourceCardId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-dest_card_id")
                    .table(Transfers::Table)
                    .col(Transfers::DestCardId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. History
        // ───────────────────────────────────────────────────────────────────
        // No foreign keys: the audit trail outlives whatever it points to.
        manager
            .create_table(
                Table::create()
                    .table(History::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(History::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(History::EventType).string().not_null())
                    .col(ColumnDef::new(History::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(History::Description).string().not_null())
                    .col(ColumnDef::new(History::UserId).string())
                    .col(ColumnDef::new(History::CardId).string())
                    .col(ColumnDef::new(History::CounterpartCardId).string())
                    .col(ColumnDef::new(History::TransferId).string())
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx-history-card_id", History::CardId),
            ("idx-history-counterpart_card_id", History::CounterpartCardId),
            ("idx-history-user_id", History::UserId),
            ("idx-history-transfer_id", History::TransferId),
            ("idx-history-created_at", History::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(History::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(History::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cards::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
