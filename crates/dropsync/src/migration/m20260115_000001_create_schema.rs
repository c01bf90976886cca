//! Initial migration to create the dropsync database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_order_records(manager).await?;
        self.create_sync_statuses(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncStatuses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_order_records(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderRecords::ShopDomain)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderRecords::RemoteId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OrderRecords::Payload)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(OrderRecords::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key for idempotent upserts.
        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_shop_remote")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::ShopDomain)
                    .col(OrderRecords::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_shop")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::ShopDomain)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_statuses(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncStatuses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncStatuses::ShopDomain)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncStatuses::Phase)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(SyncStatuses::SyncedCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncStatuses::TotalCount)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(SyncStatuses::ResumeCursor).text().null())
                    .col(
                        ColumnDef::new(SyncStatuses::LastCompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SyncStatuses::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(SyncStatuses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OrderRecords {
    Table,
    Id,
    ShopDomain,
    RemoteId,
    CreatedAt,
    Payload,
    SyncedAt,
}

#[derive(DeriveIden)]
enum SyncStatuses {
    Table,
    ShopDomain,
    Phase,
    SyncedCount,
    TotalCount,
    ResumeCursor,
    LastCompletedAt,
    ErrorMessage,
    UpdatedAt,
}
