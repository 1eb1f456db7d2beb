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
                    .table(Build::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Build::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Build::Job).uuid().not_null())
                    .col(ColumnDef::new(Build::Number).big_integer().not_null())
                    .col(
                        ColumnDef::new(Build::BuildId)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Build::Phase).integer().not_null())
                    .col(ColumnDef::new(Build::Status).string().not_null())
                    .col(ColumnDef::new(Build::Url).string().not_null())
                    .col(ColumnDef::new(Build::Duration).big_integer())
                    .col(ColumnDef::new(Build::RequestedBy).string())
                    .col(ColumnDef::new(Build::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Build::UpdatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-build-job")
                            .from(Build::Table, Build::Job)
                            .to(Job::Table, Job::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-build-job-number")
                    .table(Build::Table)
                    .col(Build::Job)
                    .col(Build::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-build-build_id")
                    .table(Build::Table)
                    .col(Build::BuildId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Build::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
    Job,
    Number,
    BuildId,
    Phase,
    Status,
    Url,
    Duration,
    RequestedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
}
