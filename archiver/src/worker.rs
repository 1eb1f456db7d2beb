/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use async_trait::async_trait;
use entity::task::TaskKind;
use gantry_core::tasks::{TaskHandler, TaskOutcome, TaskPayload, task_loop};
use gantry_core::types::*;
use std::sync::Arc;

use super::coordinator::{
    archive_projectbuild, generate_checksums, link_artifact, process_build_artifacts,
    transfer_artifact,
};

const KINDS: &[TaskKind] = &[
    TaskKind::ProcessBuildArtifacts,
    TaskKind::TransferArtifact,
    TaskKind::LinkArtifact,
    TaskKind::GenerateChecksums,
    TaskKind::ArchiveProjectBuild,
];

#[derive(Debug, Default)]
pub struct ArchiverWorker;

impl ArchiverWorker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskHandler for ArchiverWorker {
    fn name(&self) -> &'static str {
        "archiver"
    }

    fn kinds(&self) -> &'static [TaskKind] {
        KINDS
    }

    async fn handle(&self, state: Arc<ServerState>, payload: TaskPayload) -> Result<TaskOutcome> {
        match payload {
            TaskPayload::ProcessBuildArtifacts { build } => {
                process_build_artifacts(&state, build).await?;
            }
            TaskPayload::TransferArtifact { archive_artifact } => {
                transfer_artifact(&state, archive_artifact).await?;
            }
            TaskPayload::LinkArtifact {
                source,
                destination,
            } => {
                link_artifact(&state, source, destination).await?;
            }
            TaskPayload::GenerateChecksums { archive, build } => {
                return generate_checksums(&state, archive, build).await;
            }
            TaskPayload::ArchiveProjectBuild {
                project_build,
                archive,
            } => {
                archive_projectbuild(&state, project_build, archive).await?;
            }
            other => anyhow::bail!("Archiver cannot handle {:?} tasks", other.kind()),
        }

        Ok(TaskOutcome::Completed)
    }
}

pub async fn archiver_loop(state: Arc<ServerState>) {
    task_loop(state, Arc::new(ArchiverWorker::new())).await;
}
