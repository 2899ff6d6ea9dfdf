use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_account_tables::Migration),
            Box::new(m20240301_000003_create_ledger_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Banks::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Banks::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Banks::Name).string().not_null())
                        .col(ColumnDef::new(Banks::Address).string().null())
                        .col(
                            ColumnDef::new(Banks::BankCode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Banks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Locations::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Locations::Name).string().not_null())
                        .col(ColumnDef::new(Locations::Address).string().null())
                        .col(ColumnDef::new(Locations::BankId).uuid().not_null())
                        .col(ColumnDef::new(Locations::MaxCapacity).big_integer().null())
                        .col(ColumnDef::new(Locations::SecurityLevel).string().null())
                        .col(
                            ColumnDef::new(Locations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_locations_bank_id")
                                .from(Locations::Table, Locations::BankId)
                                .to(Banks::Table, Banks::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CardTypes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CardTypes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CardTypes::Name).string().not_null())
                        .col(ColumnDef::new(CardTypes::SubType).string().null())
                        .col(ColumnDef::new(CardTypes::SubSubType).string().null())
                        .col(ColumnDef::new(CardTypes::BankId).uuid().null())
                        .col(ColumnDef::new(CardTypes::Description).string().null())
                        .col(
                            ColumnDef::new(CardTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_card_types_bank_id")
                                .from(CardTypes::Table, CardTypes::BankId)
                                .to(Banks::Table, Banks::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_locations_bank_id")
                        .table(Locations::Table)
                        .col(Locations::BankId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CardTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Banks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Banks {
        Table,
        Id,
        Name,
        Address,
        BankCode,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Locations {
        Table,
        Id,
        Name,
        Address,
        BankId,
        MaxCapacity,
        SecurityLevel,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum CardTypes {
        Table,
        Id,
        Name,
        SubType,
        SubSubType,
        BankId,
        Description,
        CreatedAt,
    }
}

mod m20240301_000002_create_account_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_account_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Reports::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Reports::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Reports::Title).string().not_null())
                        .col(ColumnDef::new(Reports::ReportType).string().not_null())
                        .col(ColumnDef::new(Reports::GeneratedBy).uuid().null())
                        .col(
                            ColumnDef::new(Reports::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_created_at")
                        .table(Users::Table)
                        .col(Users::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_reports_created_at")
                        .table(Reports::Table)
                        .col(Reports::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reports::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        Role,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Reports {
        Table,
        Id,
        Title,
        ReportType,
        GeneratedBy,
        CreatedAt,
    }
}

mod m20240301_000003_create_ledger_tables {
    use super::m20240301_000001_create_catalog_tables::{CardTypes, Locations};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stocks::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stocks::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stocks::LocationId).uuid().not_null())
                        .col(ColumnDef::new(Stocks::CardTypeId).uuid().not_null())
                        .col(
                            ColumnDef::new(Stocks::Quantity)
                                .big_integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Stocks::Quantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Stocks::AlertThreshold)
                                .big_integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Stocks::AlertThreshold).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Stocks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stocks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stocks_location_id")
                                .from(Stocks::Table, Stocks::LocationId)
                                .to(Locations::Table, Locations::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stocks_card_type_id")
                                .from(Stocks::Table, Stocks::CardTypeId)
                                .to(CardTypes::Table, CardTypes::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One counter per (location, card type); the upsert relies on it.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_stocks_location_card_type")
                        .table(Stocks::Table)
                        .col(Stocks::LocationId)
                        .col(Stocks::CardTypeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Movements::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Movements::Type).string_len(16).not_null())
                        .col(ColumnDef::new(Movements::Quantity).big_integer().not_null())
                        .col(ColumnDef::new(Movements::UserId).uuid().not_null())
                        .col(ColumnDef::new(Movements::CardTypeId).uuid().not_null())
                        .col(ColumnDef::new(Movements::LocationId).uuid().not_null())
                        .col(ColumnDef::new(Movements::DestLocationId).uuid().null())
                        .col(ColumnDef::new(Movements::ReferenceNumber).string().null())
                        .col(ColumnDef::new(Movements::Notes).string().null())
                        .col(ColumnDef::new(Movements::Attachments).json().null())
                        .col(
                            ColumnDef::new(Movements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_created_at")
                        .table(Movements::Table)
                        .col(Movements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_location_card_type")
                        .table(Movements::Table)
                        .col(Movements::LocationId)
                        .col(Movements::CardTypeId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_dest_location_id")
                        .table(Movements::Table)
                        .col(Movements::DestLocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stocks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stocks {
        Table,
        Id,
        LocationId,
        CardTypeId,
        Quantity,
        AlertThreshold,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Movements {
        Table,
        Id,
        Type,
        Quantity,
        UserId,
        CardTypeId,
        LocationId,
        DestLocationId,
        ReferenceNumber,
        Notes,
        Attachments,
        CreatedAt,
    }
}
