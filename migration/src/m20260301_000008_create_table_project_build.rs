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
                    .table(ProjectBuild::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectBuild::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectBuild::Project).uuid().not_null())
                    .col(ColumnDef::new(ProjectBuild::RequestedBy).string())
                    .col(
                        ColumnDef::new(ProjectBuild::RequestedAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProjectBuild::EndedAt).date_time())
                    .col(
                        ColumnDef::new(ProjectBuild::Status)
                            .string()
                            .not_null()
                            .default("UNKNOWN"),
                    )
                    .col(
                        ColumnDef::new(ProjectBuild::Phase)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ProjectBuild::BuildId).string().not_null())
                    .col(
                        ColumnDef::new(ProjectBuild::BuildKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ProjectBuild::Archived).date_time())
                    .col(
                        ColumnDef::new(ProjectBuild::Automated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_build-project")
                            .from(ProjectBuild::Table, ProjectBuild::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-project_build-project-build_id")
                    .table(ProjectBuild::Table)
                    .col(ProjectBuild::Project)
                    .col(ProjectBuild::BuildId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectBuild::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectBuild {
    Table,
    Id,
    Project,
    RequestedBy,
    RequestedAt,
    EndedAt,
    Status,
    Phase,
    BuildId,
    BuildKey,
    Archived,
    Automated,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}
