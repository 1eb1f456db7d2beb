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
                    .table(ProjectDependency::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectDependency::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectDependency::Project).uuid().not_null())
                    .col(
                        ColumnDef::new(ProjectDependency::Dependency)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectDependency::AutoTrack)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ProjectDependency::CurrentBuild).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_dependency-project")
                            .from(ProjectDependency::Table, ProjectDependency::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_dependency-dependency")
                            .from(ProjectDependency::Table, ProjectDependency::Dependency)
                            .to(Dependency::Table, Dependency::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_dependency-current_build")
                            .from(ProjectDependency::Table, ProjectDependency::CurrentBuild)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-project_dependency-project-dependency")
                    .table(ProjectDependency::Table)
                    .col(ProjectDependency::Project)
                    .col(ProjectDependency::Dependency)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectDependency::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectDependency {
    Table,
    Id,
    Project,
    Dependency,
    AutoTrack,
    CurrentBuild,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Dependency {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
}
