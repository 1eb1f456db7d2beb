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
                    .table(Dependency::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Dependency::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Dependency::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Dependency::Job).uuid())
                    .col(ColumnDef::new(Dependency::Description).text().not_null())
                    .col(ColumnDef::new(Dependency::Parameters).text())
                    .col(ColumnDef::new(Dependency::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-dependency-job")
                            .from(Dependency::Table, Dependency::Job)
                            .to(Job::Table, Job::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Dependency::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Dependency {
    Table,
    Id,
    Name,
    Job,
    Description,
    Parameters,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
}
