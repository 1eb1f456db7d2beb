/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::input::greater_than_zero;
use clap::{Parser, Subcommand};
use entity::*;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "Gantry", display_name = "Gantry", bin_name = "gantry-server", author = "Wavelens", version, about, long_about = None)]
pub struct Cli {
    #[arg(long, env = "GANTRY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    #[arg(long, env = "GANTRY_LOG_JSON", default_value = "false")]
    pub log_json: bool,
    #[arg(long, env = "GANTRY_DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(long, env = "GANTRY_DATABASE_URL_FILE")]
    pub database_url_file: Option<String>,
    #[arg(long, env = "GANTRY_CRYPT_SECRET_FILE")]
    pub crypt_secret_file: Option<String>,
    #[arg(long, env = "GANTRY_STATE_FILE")]
    pub state_file: Option<String>,
    #[arg(long, env = "GANTRY_MAX_CONCURRENT_TASKS", value_parser = greater_than_zero::<usize>, default_value = "10")]
    pub max_concurrent_tasks: usize,
    #[arg(long, env = "GANTRY_TASK_POLL_INTERVAL", value_parser = greater_than_zero::<u64>, default_value = "5")]
    pub task_poll_interval: u64,
    #[arg(long, env = "GANTRY_TASK_MAX_ATTEMPTS", value_parser = greater_than_zero::<i32>, default_value = "5")]
    pub task_max_attempts: i32,
    #[arg(long, env = "GANTRY_TASK_RETRY_BACKOFF", value_parser = greater_than_zero::<i64>, default_value = "30")]
    pub task_retry_backoff: i64,
    #[arg(long, env = "GANTRY_TASK_DEFER_INTERVAL", value_parser = greater_than_zero::<i64>, default_value = "30")]
    pub task_defer_interval: i64,
    #[arg(long, env = "GANTRY_REPORT_ERRORS", default_value = "false")]
    pub report_errors: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the orchestrator and archiver workers.
    Serve,
    /// Record a build notification sent by a build server.
    Notify {
        /// Name of the build server the notification came from.
        #[arg(long)]
        server: String,
        /// JSON notification, read from stdin when omitted.
        #[arg(long)]
        file: Option<String>,
    },
    /// Request a build of a project.
    BuildProject {
        project: String,
        #[arg(long)]
        user: Option<String>,
        /// Only build these dependencies, the others keep their current build.
        #[arg(long = "dependency")]
        dependencies: Vec<String>,
        /// Create the project build without requesting remote builds.
        #[arg(long, default_value = "false")]
        no_queue: bool,
    },
    /// Archive every artifact of a finished project build.
    ArchiveProjectBuild {
        project: String,
        build_id: String,
        #[arg(long)]
        archive: Option<String>,
    },
    /// Append checksums of the archived project artifacts of a build.
    GenerateChecksums {
        build: Uuid,
        #[arg(long)]
        archive: Option<String>,
    },
    /// Mark an archive as the default destination.
    SetDefaultArchive { name: String },
}

#[derive(Debug)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub cli: Cli,
}

pub type EArchive = archive::Entity;
pub type EArchiveArtifact = archive_artifact::Entity;
pub type EArtifact = artifact::Entity;
pub type EBuild = build::Entity;
pub type EBuildServer = build_server::Entity;
pub type EDependency = dependency::Entity;
pub type EJob = job::Entity;
pub type EProject = project::Entity;
pub type EProjectBuild = project_build::Entity;
pub type EProjectBuildDependency = project_build_dependency::Entity;
pub type EProjectDependency = project_dependency::Entity;
pub type ESshKeyPair = ssh_key_pair::Entity;
pub type ETask = task::Entity;

pub type MArchive = archive::Model;
pub type MArchiveArtifact = archive_artifact::Model;
pub type MArtifact = artifact::Model;
pub type MBuild = build::Model;
pub type MBuildServer = build_server::Model;
pub type MDependency = dependency::Model;
pub type MJob = job::Model;
pub type MProject = project::Model;
pub type MProjectBuild = project_build::Model;
pub type MProjectBuildDependency = project_build_dependency::Model;
pub type MProjectDependency = project_dependency::Model;
pub type MSshKeyPair = ssh_key_pair::Model;
pub type MTask = task::Model;

pub type AArchive = archive::ActiveModel;
pub type AArchiveArtifact = archive_artifact::ActiveModel;
pub type AArtifact = artifact::ActiveModel;
pub type ABuild = build::ActiveModel;
pub type ABuildServer = build_server::ActiveModel;
pub type ADependency = dependency::ActiveModel;
pub type AJob = job::ActiveModel;
pub type AProject = project::ActiveModel;
pub type AProjectBuild = project_build::ActiveModel;
pub type AProjectBuildDependency = project_build_dependency::ActiveModel;
pub type AProjectDependency = project_dependency::ActiveModel;
pub type ASshKeyPair = ssh_key_pair::ActiveModel;
pub type ATask = task::ActiveModel;

pub type CArchive = archive::Column;
pub type CArchiveArtifact = archive_artifact::Column;
pub type CArtifact = artifact::Column;
pub type CBuild = build::Column;
pub type CBuildServer = build_server::Column;
pub type CDependency = dependency::Column;
pub type CJob = job::Column;
pub type CProject = project::Column;
pub type CProjectBuild = project_build::Column;
pub type CProjectBuildDependency = project_build_dependency::Column;
pub type CProjectDependency = project_dependency::Column;
pub type CSshKeyPair = ssh_key_pair::Column;
pub type CTask = task::Column;
