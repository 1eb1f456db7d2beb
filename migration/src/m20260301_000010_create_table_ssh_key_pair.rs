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
                    .table(SshKeyPair::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SshKeyPair::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SshKeyPair::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SshKeyPair::PublicKey).string().not_null())
                    .col(ColumnDef::new(SshKeyPair::PrivateKey).text().not_null())
                    .col(ColumnDef::new(SshKeyPair::CreatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SshKeyPair::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SshKeyPair {
    Table,
    Id,
    Name,
    PublicKey,
    PrivateKey,
    CreatedAt,
}
