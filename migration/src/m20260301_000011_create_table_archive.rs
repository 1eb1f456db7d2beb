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
                    .table(Archive::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Archive::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Archive::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Archive::Host).string())
                    .col(
                        ColumnDef::new(Archive::Port)
                            .integer()
                            .not_null()
                            .default(22),
                    )
                    .col(ColumnDef::new(Archive::Basedir).string().not_null())
                    .col(ColumnDef::new(Archive::Username).string())
                    .col(ColumnDef::new(Archive::Policy).integer().not_null())
                    .col(ColumnDef::new(Archive::Transport).integer().not_null())
                    .col(ColumnDef::new(Archive::SshCredentials).uuid())
                    .col(
                        ColumnDef::new(Archive::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Archive::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-archive-ssh_credentials")
                            .from(Archive::Table, Archive::SshCredentials)
                            .to(SshKeyPair::Table, SshKeyPair::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Archive::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Archive {
    Table,
    Id,
    Name,
    Host,
    Port,
    Basedir,
    Username,
    Policy,
    Transport,
    SshCredentials,
    IsDefault,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SshKeyPair {
    Table,
    Id,
}
