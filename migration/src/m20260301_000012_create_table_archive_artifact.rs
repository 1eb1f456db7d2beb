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
                    .table(ArchiveArtifact::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ArchiveArtifact::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ArchiveArtifact::Archive).uuid().not_null())
                    .col(ColumnDef::new(ArchiveArtifact::Artifact).uuid().not_null())
                    .col(ColumnDef::new(ArchiveArtifact::Build).uuid())
                    .col(ColumnDef::new(ArchiveArtifact::Dependency).uuid())
                    .col(ColumnDef::new(ArchiveArtifact::ProjectBuildDependency).uuid())
                    .col(
                        ColumnDef::new(ArchiveArtifact::ArchivedPath)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ArchiveArtifact::ArchivedAt).date_time())
                    .col(
                        ColumnDef::new(ArchiveArtifact::ArchivedSize)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ArchiveArtifact::ChecksummedAt).date_time())
                    .col(
                        ColumnDef::new(ArchiveArtifact::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-archive_artifact-archive")
                            .from(ArchiveArtifact::Table, ArchiveArtifact::Archive)
                            .to(Archive::Table, Archive::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-archive_artifact-artifact")
                            .from(ArchiveArtifact::Table, ArchiveArtifact::Artifact)
                            .to(Artifact::Table, Artifact::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-archive_artifact-build")
                            .from(ArchiveArtifact::Table, ArchiveArtifact::Build)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-archive_artifact-dependency")
                            .from(ArchiveArtifact::Table, ArchiveArtifact::Dependency)
                            .to(Dependency::Table, Dependency::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-archive_artifact-project_build_dependency")
                            .from(
                                ArchiveArtifact::Table,
                                ArchiveArtifact::ProjectBuildDependency,
                            )
                            .to(ProjectBuildDependency::Table, ProjectBuildDependency::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-archive_artifact-archive-archived_path")
                    .table(ArchiveArtifact::Table)
                    .col(ArchiveArtifact::Archive)
                    .col(ArchiveArtifact::ArchivedPath)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-archive_artifact-archive-artifact-project_build_dependency")
                    .table(ArchiveArtifact::Table)
                    .col(ArchiveArtifact::Archive)
                    .col(ArchiveArtifact::Artifact)
                    .col(ArchiveArtifact::ProjectBuildDependency)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Bare placements have no slot, so they need a partial index.
        manager
            .get_connection()
            .execute_unprepared(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS "idx-archive_artifact-archive-artifact-dependency" ON "archive_artifact" ("archive", "artifact", "dependency") WHERE "project_build_dependency" IS NULL"#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ArchiveArtifact::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ArchiveArtifact {
    Table,
    Id,
    Archive,
    Artifact,
    Build,
    Dependency,
    ProjectBuildDependency,
    ArchivedPath,
    ArchivedAt,
    ArchivedSize,
    ChecksummedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Archive {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Artifact {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Dependency {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ProjectBuildDependency {
    Table,
    Id,
}
