/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BuildServer::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BuildServer::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BuildServer::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(BuildServer::Url)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(BuildServer::Username).string().not_null())
                    .col(ColumnDef::new(BuildServer::Password).string().not_null())
                    .col(ColumnDef::new(BuildServer::CreatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BuildServer::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BuildServer {
    Table,
    Id,
    Name,
    Url,
    Username,
    Password,
    CreatedAt,
}
