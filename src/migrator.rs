use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_movement_types_table::Migration),
            Box::new(m20240101_000002_create_batches_table::Migration),
            Box::new(m20240101_000003_create_stock_positions_table::Migration),
            Box::new(m20240101_000004_create_stock_transactions_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_movement_types_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_movement_types_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MovementTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MovementTypes::Id)
                                .integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementTypes::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(MovementTypes::Direction).string().not_null())
                        .col(ColumnDef::new(MovementTypes::Class).string().not_null())
                        .col(
                            ColumnDef::new(MovementTypes::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(MovementTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Reference data: one row per movement kind. DISCARD is an
            // outbound movement against regular stock.
            let seed: [(&str, &str, &str); 5] = [
                ("REGULAR_IN", "IN", "REGULAR"),
                ("REGULAR_OUT", "OUT", "REGULAR"),
                ("TRANSIT_IN", "IN", "TRANSIT"),
                ("TRANSIT_OUT", "OUT", "TRANSIT"),
                ("DISCARD", "OUT", "DISCARD"),
            ];
            for (code, direction, class) in seed {
                manager
                    .exec_stmt(
                        Query::insert()
                            .into_table(MovementTypes::Table)
                            .columns([
                                MovementTypes::Code,
                                MovementTypes::Direction,
                                MovementTypes::Class,
                                MovementTypes::Active,
                                MovementTypes::CreatedAt,
                            ])
                            .values_panic([
                                code.into(),
                                direction.into(),
                                class.into(),
                                true.into(),
                                Expr::current_timestamp().into(),
                            ])
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MovementTypes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum MovementTypes {
        Table,
        Id,
        Code,
        Direction,
        Class,
        Active,
        CreatedAt,
    }
}

mod m20240101_000002_create_batches_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Batches::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Batches::BatchNo).string().not_null())
                        .col(ColumnDef::new(Batches::MfgDate).date().null())
                        .col(ColumnDef::new(Batches::ExpDate).date().null())
                        .col(ColumnDef::new(Batches::Notes).string().null())
                        .col(
                            ColumnDef::new(Batches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // The upsert contract hinges on this constraint: a concurrent
            // duplicate insert must collide, not create a second row.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_product_batch_no")
                        .table(Batches::Table)
                        .col(Batches::ProductId)
                        .col(Batches::BatchNo)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_exp_date")
                        .table(Batches::Table)
                        .col(Batches::ExpDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Batches {
        Table,
        Id,
        ProductId,
        BatchNo,
        MfgDate,
        ExpDate,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_stock_positions_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_batches_table::Batches;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_positions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockPositions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockPositions::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockPositions::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockPositions::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockPositions::BatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockPositions::QtyOnHand)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockPositions::UnitCost)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockPositions::CurrencyId).uuid().null())
                        .col(ColumnDef::new(StockPositions::UomId).uuid().null())
                        .col(
                            ColumnDef::new(StockPositions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockPositions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_positions_batch")
                                .from(StockPositions::Table, StockPositions::BatchId)
                                .to(Batches::Table, Batches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_positions_key")
                        .table(StockPositions::Table)
                        .col(StockPositions::ProductId)
                        .col(StockPositions::WarehouseId)
                        .col(StockPositions::BatchId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_positions_product_warehouse")
                        .table(StockPositions::Table)
                        .col(StockPositions::ProductId)
                        .col(StockPositions::WarehouseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockPositions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockPositions {
        Table,
        Id,
        ProductId,
        WarehouseId,
        BatchId,
        QtyOnHand,
        UnitCost,
        CurrencyId,
        UomId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_stock_transactions_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_movement_types_table::MovementTypes;
    use super::m20240101_000002_create_batches_table::Batches;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_stock_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TxnDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::MovementTypeId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransactions::TxnType).string().not_null())
                        .col(
                            ColumnDef::new(StockTransactions::SourceType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransactions::SourceId).uuid().not_null())
                        .col(ColumnDef::new(StockTransactions::SourceLineId).uuid().null())
                        .col(ColumnDef::new(StockTransactions::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockTransactions::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::BatchId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Qty)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::UnitCost)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Amount)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockTransactions::CurrencyId).uuid().null())
                        .col(
                            ColumnDef::new(StockTransactions::ExchangeRate)
                                .decimal_len(19, 6)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::ForeignAmount)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TotalAmount)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockTransactions::UomId).uuid().null())
                        .col(
                            ColumnDef::new(StockTransactions::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_transactions_movement_type")
                                .from(
                                    StockTransactions::Table,
                                    StockTransactions::MovementTypeId,
                                )
                                .to(MovementTypes::Table, MovementTypes::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_transactions_batch")
                                .from(StockTransactions::Table, StockTransactions::BatchId)
                                .to(Batches::Table, Batches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transactions_key")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::ProductId)
                        .col(StockTransactions::WarehouseId)
                        .col(StockTransactions::BatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transactions_txn_date")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::TxnDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transactions_source")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::SourceType)
                        .col(StockTransactions::SourceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockTransactions {
        Table,
        Id,
        TxnDate,
        MovementTypeId,
        TxnType,
        SourceType,
        SourceId,
        SourceLineId,
        ProductId,
        WarehouseId,
        BatchId,
        Qty,
        UnitCost,
        Amount,
        CurrencyId,
        ExchangeRate,
        ForeignAmount,
        TotalAmount,
        UomId,
        IsDeleted,
        CreatedAt,
    }
}
