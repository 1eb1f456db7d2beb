/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_table_build_server;
mod m20260301_000002_create_table_job;
mod m20260301_000003_create_table_dependency;
mod m20260301_000004_create_table_project;
mod m20260301_000005_create_table_build;
mod m20260301_000006_create_table_artifact;
mod m20260301_000007_create_table_project_dependency;
mod m20260301_000008_create_table_project_build;
mod m20260301_000009_create_table_project_build_dependency;
mod m20260301_000010_create_table_ssh_key_pair;
mod m20260301_000011_create_table_archive;
mod m20260301_000012_create_table_archive_artifact;
mod m20260301_000013_create_table_task;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_table_build_server::Migration),
            Box::new(m20260301_000002_create_table_job::Migration),
            Box::new(m20260301_000003_create_table_dependency::Migration),
            Box::new(m20260301_000004_create_table_project::Migration),
            Box::new(m20260301_000005_create_table_build::Migration),
            Box::new(m20260301_000006_create_table_artifact::Migration),
            Box::new(m20260301_000007_create_table_project_dependency::Migration),
            Box::new(m20260301_000008_create_table_project_build::Migration),
            Box::new(m20260301_000009_create_table_project_build_dependency::Migration),
            Box::new(m20260301_000010_create_table_ssh_key_pair::Migration),
            Box::new(m20260301_000011_create_table_archive::Migration),
            Box::new(m20260301_000012_create_table_archive_artifact::Migration),
            Box::new(m20260301_000013_create_table_task::Migration),
        ]
    }
}
