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
                    .table(ProjectBuildDependency::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectBuildDependency::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProjectBuildDependency::ProjectBuild)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectBuildDependency::Dependency)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProjectBuildDependency::Build).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_build_dependency-project_build")
                            .from(
                                ProjectBuildDependency::Table,
                                ProjectBuildDependency::ProjectBuild,
                            )
                            .to(ProjectBuild::Table, ProjectBuild::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_build_dependency-dependency")
                            .from(
                                ProjectBuildDependency::Table,
                                ProjectBuildDependency::Dependency,
                            )
                            .to(Dependency::Table, Dependency::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_build_dependency-build")
                            .from(ProjectBuildDependency::Table, ProjectBuildDependency::Build)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-project_build_dependency-project_build-dependency")
                    .table(ProjectBuildDependency::Table)
                    .col(ProjectBuildDependency::ProjectBuild)
                    .col(ProjectBuildDependency::Dependency)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ProjectBuildDependency::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectBuildDependency {
    Table,
    Id,
    ProjectBuild,
    Dependency,
    Build,
}

#[derive(DeriveIden)]
enum ProjectBuild {
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
