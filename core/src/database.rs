/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use migration::Migrator;
use sea_orm::{
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter,
};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::info;
use tracing::log::LevelFilter;

use super::tasks::recover_tasks;
use super::types::*;

pub async fn connect_db(cli: &Cli) -> Result<DatabaseConnection> {
    let db_url = if let Some(file) = &cli.database_url_file {
        std::fs::read_to_string(file)
            .context("Failed to read database url from file")?
            .trim()
            .to_string()
    } else if let Some(url) = &cli.database_url {
        url.clone()
    } else {
        anyhow::bail!("No database url provided")
    };

    let mut opt = ConnectOptions::new(db_url);

    if cli.log_level == "debug" {
        opt.sqlx_logging(true)
            .sqlx_logging_level(LevelFilter::Debug);
    } else {
        opt.sqlx_logging(false);
    }

    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8));

    let db = Database::connect(opt)
        .await
        .context("Failed to connect to database")?;
    migrate(&db).await?;
    Ok(db)
}

/// Runs pending migrations and requeues tasks interrupted by a previous shutdown.
pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("Failed to run database migrations")?;
    update_db(db).await.context("Failed to update database")?;
    Ok(())
}

async fn update_db(db: &DatabaseConnection) -> Result<(), DbErr> {
    let recovered = recover_tasks(db).await?;

    if recovered > 0 {
        info!(count = recovered, "Requeued interrupted tasks");
    }

    Ok(())
}

pub async fn get_build_server_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<MBuildServer>> {
    EBuildServer::find()
        .filter(CBuildServer::Name.eq(name))
        .one(db)
        .await
        .context("Failed to query build server")
}

pub async fn get_job_by_name(
    db: &DatabaseConnection,
    server: &MBuildServer,
    name: &str,
) -> Result<Option<MJob>> {
    EJob::find()
        .filter(CJob::Server.eq(server.id))
        .filter(CJob::Name.eq(name))
        .one(db)
        .await
        .context("Failed to query job")
}

pub async fn get_dependency_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<MDependency>> {
    EDependency::find()
        .filter(CDependency::Name.eq(name))
        .one(db)
        .await
        .context("Failed to query dependency")
}

pub async fn get_project_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<MProject>> {
    EProject::find()
        .filter(CProject::Name.eq(name))
        .one(db)
        .await
        .context("Failed to query project")
}

pub async fn get_project_build_by_build_id(
    db: &DatabaseConnection,
    project: &MProject,
    build_id: &str,
) -> Result<Option<MProjectBuild>> {
    EProjectBuild::find()
        .filter(CProjectBuild::Project.eq(project.id))
        .filter(CProjectBuild::BuildId.eq(build_id))
        .one(db)
        .await
        .context("Failed to query project build")
}

pub async fn get_archive_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<MArchive>> {
    EArchive::find()
        .filter(CArchive::Name.eq(name))
        .one(db)
        .await
        .context("Failed to query archive")
}
