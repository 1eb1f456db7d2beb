/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Database backed task queue.
//!
//! Tasks are claimed with a compare-and-set on their status, so several
//! pollers can share the table. A task with `depends_on` only becomes
//! claimable once that task completed, and fails once it failed. Delivery is
//! at least once: tasks still running at start-up are put back in the queue.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use entity::task::{TaskKind, TaskStatus};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::types::*;

const CLAIM_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    ProcessBuild {
        build: Uuid,
    },
    BuildJob {
        job: Uuid,
        build_id: Option<String>,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
        requested_by: Option<String>,
    },
    ProcessBuildArtifacts {
        build: Uuid,
    },
    TransferArtifact {
        archive_artifact: Uuid,
    },
    LinkArtifact {
        source: Uuid,
        destination: Uuid,
    },
    GenerateChecksums {
        archive: Uuid,
        build: Uuid,
    },
    ArchiveProjectBuild {
        project_build: Uuid,
        archive: Option<Uuid>,
    },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::ProcessBuild { .. } => TaskKind::ProcessBuild,
            TaskPayload::BuildJob { .. } => TaskKind::BuildJob,
            TaskPayload::ProcessBuildArtifacts { .. } => TaskKind::ProcessBuildArtifacts,
            TaskPayload::TransferArtifact { .. } => TaskKind::TransferArtifact,
            TaskPayload::LinkArtifact { .. } => TaskKind::LinkArtifact,
            TaskPayload::GenerateChecksums { .. } => TaskKind::GenerateChecksums,
            TaskPayload::ArchiveProjectBuild { .. } => TaskKind::ArchiveProjectBuild,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Not ready yet; run again later without consuming an attempt.
    Deferred,
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn kinds(&self) -> &'static [TaskKind];
    async fn handle(&self, state: Arc<ServerState>, payload: TaskPayload) -> Result<TaskOutcome>;
}

pub async fn enqueue(
    state: &ServerState,
    payload: TaskPayload,
    depends_on: Option<Uuid>,
) -> Result<MTask> {
    let now = Utc::now().naive_utc();
    let kind = payload.kind();

    let atask = ATask {
        id: Set(Uuid::now_v7()),
        kind: Set(kind),
        payload: Set(serde_json::to_value(&payload).context("Failed to serialize task payload")?),
        status: Set(TaskStatus::Queued),
        attempts: Set(0),
        max_attempts: Set(state.cli.task_max_attempts),
        depends_on: Set(depends_on),
        last_error: Set(None),
        run_after: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let task = atask
        .insert(&state.db)
        .await
        .context("Failed to insert task")?;

    debug!(task_id = %task.id, kind = ?kind, depends_on = ?depends_on, "Queued task");
    Ok(task)
}

/// Queued and running tasks of `kinds` with their payloads, oldest first.
pub async fn pending_tasks(
    db: &DatabaseConnection,
    kinds: &[TaskKind],
) -> Result<Vec<(MTask, TaskPayload)>> {
    let tasks = ETask::find()
        .filter(CTask::Status.is_in([TaskStatus::Queued, TaskStatus::Running]))
        .filter(CTask::Kind.is_in(kinds.iter().copied()))
        .order_by_asc(CTask::CreatedAt)
        .order_by_asc(CTask::Id)
        .all(db)
        .await
        .context("Failed to query pending tasks")?;

    let mut result = vec![];
    for task in tasks {
        match serde_json::from_value::<TaskPayload>(task.payload.clone()) {
            Ok(payload) => result.push((task, payload)),
            Err(e) => warn!(task_id = %task.id, error = %e, "Skipping task with invalid payload"),
        }
    }

    Ok(result)
}

/// Claims the oldest runnable task of one of `kinds`.
pub async fn claim_next(state: &ServerState, kinds: &[TaskKind]) -> Result<Option<MTask>> {
    let db = &state.db;
    let now = Utc::now().naive_utc();

    let mut pages = ETask::find()
        .filter(CTask::Status.eq(TaskStatus::Queued))
        .filter(CTask::Kind.is_in(kinds.iter().copied()))
        .filter(CTask::RunAfter.lte(now))
        .order_by_asc(CTask::CreatedAt)
        .order_by_asc(CTask::Id)
        .paginate(db, CLAIM_PAGE_SIZE);

    while let Some(candidates) = pages
        .fetch_and_next()
        .await
        .context("Failed to query queued tasks")?
    {
        for candidate in candidates {
            if let Some(dependency) = candidate.depends_on {
                let dependency = ETask::find_by_id(dependency)
                    .one(db)
                    .await
                    .context("Failed to query task dependency")?;

                match dependency {
                    Some(d) if d.status == TaskStatus::Failed => {
                        let message = format!("Dependency task {} failed", d.id);
                        warn!(task_id = %candidate.id, dependency = %d.id, "Dependency failed");
                        fail_task(state, candidate, &message, false).await?;
                        continue;
                    }
                    Some(d) if d.status != TaskStatus::Completed => continue,
                    _ => {}
                }
            }

            let result = ETask::update_many()
                .col_expr(CTask::Status, Expr::value(TaskStatus::Running.to_value()))
                .col_expr(CTask::Attempts, Expr::col(CTask::Attempts).add(1))
                .col_expr(CTask::UpdatedAt, Expr::value(Utc::now().naive_utc()))
                .filter(CTask::Id.eq(candidate.id))
                .filter(CTask::Status.eq(TaskStatus::Queued))
                .exec(db)
                .await
                .context("Failed to claim task")?;

            if result.rows_affected == 1 {
                return ETask::find_by_id(candidate.id)
                    .one(db)
                    .await
                    .context("Failed to reload claimed task");
            }
        }
    }

    Ok(None)
}

pub async fn complete_task(db: &DatabaseConnection, task: MTask) -> Result<MTask, DbErr> {
    let mut atask: ATask = task.into();
    atask.status = Set(TaskStatus::Completed);
    atask.last_error = Set(None);
    atask.updated_at = Set(Utc::now().naive_utc());
    atask.update(db).await
}

/// Records a failed run. Retries with linear back-off until `max_attempts` is used up.
pub async fn fail_task(state: &ServerState, task: MTask, error: &str, retry: bool) -> Result<MTask> {
    let now = Utc::now().naive_utc();
    let exhausted = !retry || task.attempts >= task.max_attempts;
    let backoff = ChronoDuration::seconds(state.cli.task_retry_backoff * i64::from(task.attempts.max(1)));

    let mut atask: ATask = task.into();
    atask.last_error = Set(Some(error.to_string()));
    atask.updated_at = Set(now);

    if exhausted {
        atask.status = Set(TaskStatus::Failed);
    } else {
        atask.status = Set(TaskStatus::Queued);
        atask.run_after = Set(now + backoff);
    }

    atask
        .update(&state.db)
        .await
        .context("Failed to record task failure")
}

pub async fn defer_task(state: &ServerState, task: MTask) -> Result<MTask> {
    let now = Utc::now().naive_utc();
    let attempts = (task.attempts - 1).max(0);

    let mut atask: ATask = task.into();
    atask.status = Set(TaskStatus::Queued);
    atask.attempts = Set(attempts);
    atask.run_after = Set(now + ChronoDuration::seconds(state.cli.task_defer_interval));
    atask.updated_at = Set(now);

    atask
        .update(&state.db)
        .await
        .context("Failed to defer task")
}

/// Puts tasks left running by a previous process back into the queue.
pub async fn recover_tasks(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let result = ETask::update_many()
        .col_expr(CTask::Status, Expr::value(TaskStatus::Queued.to_value()))
        .col_expr(CTask::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .filter(CTask::Status.eq(TaskStatus::Running))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

#[instrument(skip(state, handler, task), fields(task_id = %task.id, kind = ?task.kind, attempt = task.attempts))]
pub async fn run_task(
    state: Arc<ServerState>,
    handler: &dyn TaskHandler,
    task: MTask,
) -> Result<MTask> {
    let payload: TaskPayload = match serde_json::from_value(task.payload.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Invalid task payload");
            let message = format!("Invalid task payload: {}", e);
            return fail_task(&state, task, &message, false).await;
        }
    };

    match handler.handle(Arc::clone(&state), payload).await {
        Ok(TaskOutcome::Completed) => {
            debug!("Task completed");
            Ok(complete_task(&state.db, task).await?)
        }
        Ok(TaskOutcome::Deferred) => {
            debug!("Task deferred");
            defer_task(&state, task).await
        }
        Err(e) => {
            let message = format!("{:#}", e);
            warn!(error = %message, "Task failed");
            fail_task(&state, task, &message, true).await
        }
    }
}

/// Runs claimable tasks one after another until none is left.
pub async fn run_pending(state: Arc<ServerState>, handler: &dyn TaskHandler) -> Result<usize> {
    let mut count = 0;

    while let Some(task) = claim_next(&state, handler.kinds()).await? {
        run_task(Arc::clone(&state), handler, task).await?;
        count += 1;
    }

    Ok(count)
}

pub async fn task_loop(state: Arc<ServerState>, handler: Arc<dyn TaskHandler>) {
    info!(worker = handler.name(), "Starting task loop");

    let mut current_tasks = vec![];
    let mut interval = time::interval(Duration::from_secs(state.cli.task_poll_interval));

    loop {
        let mut added_task = false;
        current_tasks.retain(|task: &JoinHandle<()>| !task.is_finished());

        while current_tasks.len() < state.cli.max_concurrent_tasks {
            let task = match claim_next(&state, handler.kinds()).await {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(e) => {
                    error!(worker = handler.name(), error = %e, "Failed to claim task");
                    break;
                }
            };

            let state = Arc::clone(&state);
            let handler = Arc::clone(&handler);

            current_tasks.push(tokio::spawn(async move {
                if let Err(e) = run_task(state, handler.as_ref(), task).await {
                    error!(error = %e, "Failed to record task result");
                }
            }));
            added_task = true;
        }

        if !added_task {
            interval.tick().await;
        }
    }
}
