/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result, anyhow};
use archiver::archive::{get_default_archive, set_default_archive};
use clap::Parser;
use gantry_core::database::{
    get_archive_by_name, get_build_server_by_name, get_dependency_by_name, get_project_build_by_build_id,
    get_project_by_name,
};
use gantry_core::init_state;
use gantry_core::tasks::{TaskPayload, enqueue};
use gantry_core::types::*;
use orchestrator::notifications::{BuildNotification, record_build_notification};
use orchestrator::projects::build_project;
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("Invalid log level: {}", cli.log_level))?;

    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

fn init_error_reporting(cli: &Cli) -> Option<sentry::ClientInitGuard> {
    if !cli.report_errors {
        return None;
    }

    Some(sentry::init(sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
    }))
}

async fn get_archive(state: &ServerState, name: Option<&str>) -> Result<MArchive> {
    match name {
        Some(name) => get_archive_by_name(&state.db, name)
            .await?
            .ok_or_else(|| anyhow!("Archive '{}' does not exist", name)),
        None => get_default_archive(&state.db)
            .await?
            .ok_or_else(|| anyhow!("No default archive configured")),
    }
}

async fn serve(state: Arc<ServerState>) -> Result<()> {
    orchestrator::start_orchestrator(Arc::clone(&state)).await?;
    archiver::start_archiver(Arc::clone(&state)).await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    Ok(())
}

async fn notify(state: Arc<ServerState>, server: &str, file: Option<&str>) -> Result<()> {
    let server = get_build_server_by_name(&state.db, server)
        .await?
        .ok_or_else(|| anyhow!("Build server '{}' does not exist", server))?;

    let json = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read notification from {}", path))?,
        None => {
            let mut json = String::new();
            std::io::stdin()
                .read_to_string(&mut json)
                .context("Failed to read notification from stdin")?;
            json
        }
    };

    let build = record_build_notification(&state, &server, BuildNotification::from_json(&json)?).await?;
    println!("{}", build.id);
    Ok(())
}

async fn request_project_build(
    state: Arc<ServerState>,
    project: &str,
    user: Option<&str>,
    dependencies: &[String],
    queue_build: bool,
) -> Result<()> {
    let project = get_project_by_name(&state.db, project)
        .await?
        .ok_or_else(|| anyhow!("Project '{}' does not exist", project))?;

    let mut dependency_ids = vec![];
    for name in dependencies {
        let dependency = get_dependency_by_name(&state.db, name)
            .await?
            .ok_or_else(|| anyhow!("Dependency '{}' does not exist", name))?;
        dependency_ids.push(dependency.id);
    }

    let project_build = build_project(&state, &project, user, &dependency_ids, queue_build, false).await?;
    println!("{} {}", project_build.build_id, project_build.build_key);
    Ok(())
}

async fn queue_project_archival(
    state: Arc<ServerState>,
    project: &str,
    build_id: &str,
    archive: Option<&str>,
) -> Result<()> {
    let project = get_project_by_name(&state.db, project)
        .await?
        .ok_or_else(|| anyhow!("Project '{}' does not exist", project))?;
    let project_build = get_project_build_by_build_id(&state.db, &project, build_id)
        .await?
        .ok_or_else(|| anyhow!("Project build '{}' of {} does not exist", build_id, project.name))?;

    let archive = match archive {
        Some(name) => Some(get_archive(&state, Some(name)).await?.id),
        None => None,
    };

    let task = enqueue(
        &state,
        TaskPayload::ArchiveProjectBuild {
            project_build: project_build.id,
            archive,
        },
        None,
    )
    .await?;

    println!("{}", task.id);
    Ok(())
}

async fn queue_checksums(state: Arc<ServerState>, build: Uuid, archive: Option<&str>) -> Result<()> {
    let archive = get_archive(&state, archive).await?;

    let task = enqueue(
        &state,
        TaskPayload::GenerateChecksums {
            archive: archive.id,
            build,
        },
        None,
    )
    .await?;

    println!("{}", task.id);
    Ok(())
}

#[tokio::main]
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    let _guard = init_error_reporting(&cli);

    let command = cli.command.clone().unwrap_or(Command::Serve);
    let state = init_state(cli).await?;

    match command {
        Command::Serve => serve(state).await,
        Command::Notify { server, file } => notify(state, &server, file.as_deref()).await,
        Command::BuildProject {
            project,
            user,
            dependencies,
            no_queue,
        } => request_project_build(state, &project, user.as_deref(), &dependencies, !no_queue).await,
        Command::ArchiveProjectBuild {
            project,
            build_id,
            archive,
        } => queue_project_archival(state, &project, &build_id, archive.as_deref()).await,
        Command::GenerateChecksums { build, archive } => {
            queue_checksums(state, build, archive.as_deref()).await
        }
        Command::SetDefaultArchive { name } => {
            let archive = set_default_archive(&state.db, &name).await?;
            println!("{}", archive.id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reporting_is_opt_in() {
        let cli = Cli::parse_from(["gantry-server"]);
        assert!(init_error_reporting(&cli).is_none());
    }
}
