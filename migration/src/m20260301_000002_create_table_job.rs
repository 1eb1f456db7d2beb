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
                    .table(Job::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Job::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Job::Server).uuid().not_null())
                    .col(ColumnDef::new(Job::Name).string().not_null())
                    .col(ColumnDef::new(Job::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-job-server")
                            .from(Job::Table, Job::Server)
                            .to(BuildServer::Table, BuildServer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-job-server-name")
                    .table(Job::Table)
                    .col(Job::Server)
                    .col(Job::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
    Server,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BuildServer {
    Table,
    Id,
}
