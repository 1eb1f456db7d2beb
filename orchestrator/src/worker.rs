/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use entity::task::TaskKind;
use gantry_core::tasks::{TaskHandler, TaskOutcome, TaskPayload, enqueue, task_loop};
use gantry_core::types::*;
use sea_orm::EntityTrait;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::client::{BuildServerClient, build_job};
use super::dependencies::process_build_dependencies;

const KINDS: &[TaskKind] = &[TaskKind::ProcessBuild, TaskKind::BuildJob];

pub struct OrchestratorWorker {
    client: Arc<dyn BuildServerClient>,
}

impl OrchestratorWorker {
    pub fn new(client: Arc<dyn BuildServerClient>) -> Self {
        Self { client }
    }
}

/// Updates the project builds around a build and queues archiving once it is finalized.
#[instrument(skip(state), fields(build_id = %build_id))]
pub async fn process_build(state: &ServerState, build_id: Uuid) -> Result<()> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await
        .context("Failed to query build")?
        .with_context(|| format!("Build {} does not exist", build_id))?;

    let build_id = process_build_dependencies(state, &build).await?;

    if build.phase.is_terminal() {
        enqueue(state, TaskPayload::ProcessBuildArtifacts { build: build_id }, None).await?;
    } else {
        debug!(phase = %build.phase, "Build not finalized, not archiving yet");
    }

    Ok(())
}

#[async_trait]
impl TaskHandler for OrchestratorWorker {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    fn kinds(&self) -> &'static [TaskKind] {
        KINDS
    }

    async fn handle(&self, state: Arc<ServerState>, payload: TaskPayload) -> Result<TaskOutcome> {
        match payload {
            TaskPayload::ProcessBuild { build } => process_build(&state, build).await?,
            TaskPayload::BuildJob {
                job,
                build_id,
                parameters,
                requested_by,
            } => {
                build_job(
                    &state,
                    self.client.as_ref(),
                    job,
                    build_id.as_deref(),
                    parameters,
                    requested_by.as_deref(),
                )
                .await?
            }
            other => anyhow::bail!("Orchestrator cannot handle {:?} tasks", other.kind()),
        }

        Ok(TaskOutcome::Completed)
    }
}

pub async fn orchestrator_loop(state: Arc<ServerState>, client: Arc<dyn BuildServerClient>) {
    task_loop(state, Arc::new(OrchestratorWorker::new(client))).await;
}
