use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_orders_table::Migration),
            Box::new(m20240601_000002_create_order_items_table::Migration),
            Box::new(m20240601_000003_add_order_indexes::Migration),
        ]
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    Sn,
    BuyerId,
    PaymentId,
    PaymentSn,
    OriginalTotalPrice,
    RealTotalPrice,
    Status,
    Ctime,
    Utime,
}

#[derive(DeriveIden)]
pub enum OrderItems {
    Table,
    Id,
    OrderId,
    SpuId,
    SkuId,
    SkuName,
    SkuDescription,
    SkuOriginalPrice,
    SkuRealPrice,
    Quantity,
    Ctime,
    Utime,
}

mod m20240601_000001_create_orders_table {
    use super::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::Sn).string_len(64).not_null().unique_key())
                        .col(ColumnDef::new(Orders::BuyerId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentId)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentSn)
                                .string_len(64)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Orders::OriginalTotalPrice)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::RealTotalPrice).big_integer().not_null())
                        .col(ColumnDef::new(Orders::Status).integer().not_null())
                        .col(ColumnDef::new(Orders::Ctime).big_integer().not_null())
                        .col(ColumnDef::new(Orders::Utime).big_integer().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000002_create_order_items_table {
    use super::{OrderItems, Orders};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).big_integer().not_null())
                        .col(ColumnDef::new(OrderItems::SpuId).big_integer().not_null())
                        .col(ColumnDef::new(OrderItems::SkuId).big_integer().not_null())
                        .col(ColumnDef::new(OrderItems::SkuName).string().not_null())
                        .col(
                            ColumnDef::new(OrderItems::SkuDescription)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(OrderItems::SkuOriginalPrice)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::SkuRealPrice)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Quantity).big_integer().not_null())
                        .col(ColumnDef::new(OrderItems::Ctime).big_integer().not_null())
                        .col(ColumnDef::new(OrderItems::Utime).big_integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }
}

mod m20240601_000003_add_order_indexes {
    use super::{OrderItems, Orders};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_add_order_indexes"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Buyer listing, newest first
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_buyer_ctime")
                        .table(Orders::Table)
                        .col(Orders::BuyerId)
                        .col((Orders::Ctime, IndexOrder::Desc))
                        .to_owned(),
                )
                .await?;

            // Timeout sweep
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status_ctime")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .col(Orders::Ctime)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_orders_status_ctime")
                        .table(Orders::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_orders_buyer_ctime")
                        .table(Orders::Table)
                        .to_owned(),
                )
                .await
        }
    }
}
