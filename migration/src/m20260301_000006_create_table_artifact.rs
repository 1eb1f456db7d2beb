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
                    .table(Artifact::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Artifact::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Artifact::Build).uuid().not_null())
                    .col(ColumnDef::new(Artifact::Filename).string().not_null())
                    .col(ColumnDef::new(Artifact::Url).string().not_null())
                    .col(ColumnDef::new(Artifact::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-artifact-build")
                            .from(Artifact::Table, Artifact::Build)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-artifact-build-filename")
                    .table(Artifact::Table)
                    .col(Artifact::Build)
                    .col(Artifact::Filename)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Artifact::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Artifact {
    Table,
    Id,
    Build,
    Filename,
    Url,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
}
