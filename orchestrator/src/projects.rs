/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use entity::build::BuildPhase;
use entity::project_build::UNKNOWN_STATUS;
use gantry_core::input::split_parameters;
use gantry_core::tasks::{TaskPayload, enqueue};
use gantry_core::types::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Dependency '{0}' has no job to build")]
    MissingJob(String),
    #[error("Dependency {dependency} is not part of project '{project}'")]
    UnknownDependency { project: String, dependency: Uuid },
    #[error("No free build id left for project '{0}'")]
    BuildIdTaken(String),
}

const BUILD_ID_ATTEMPTS: usize = 5;

pub fn generate_build_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Daily sequence of a project, `YYYYMMDD.N` with N one past the highest
/// sequence number handed out that day.
pub async fn generate_projectbuild_id<C: ConnectionTrait>(
    db: &C,
    project: &MProject,
    now: NaiveDateTime,
) -> Result<String> {
    let prefix = format!("{}.", now.format("%Y%m%d"));

    let next = EProjectBuild::find()
        .filter(CProjectBuild::Project.eq(project.id))
        .filter(CProjectBuild::BuildId.starts_with(&prefix))
        .all(db)
        .await
        .context("Failed to query project builds of the day")?
        .iter()
        .filter_map(|pb| pb.build_id.strip_prefix(&prefix)?.parse::<u64>().ok())
        .max()
        .map_or(0, |n| n + 1);

    Ok(format!("{}{}", prefix, next))
}

/// Highest numbered finalized build of the dependency's job.
pub async fn get_current_build<C: ConnectionTrait>(
    db: &C,
    dependency: &MDependency,
) -> Result<Option<MBuild>> {
    let Some(job) = dependency.job else {
        return Ok(None);
    };

    EBuild::find()
        .filter(CBuild::Job.eq(job))
        .filter(CBuild::Phase.eq(BuildPhase::Finalized))
        .order_by_desc(CBuild::Number)
        .one(db)
        .await
        .context("Failed to query current build")
}

/// Whether a build of the dependency's job has started and not finished yet.
pub async fn is_building<C: ConnectionTrait>(db: &C, dependency: &MDependency) -> Result<bool> {
    let Some(job) = dependency.job else {
        return Ok(false);
    };

    let started = EBuild::find()
        .filter(CBuild::Job.eq(job))
        .filter(CBuild::Phase.eq(BuildPhase::Started))
        .count(db)
        .await
        .context("Failed to query started builds")?;

    Ok(started > 0)
}

/// Artifacts of the builds the project dependencies currently point at.
pub async fn get_current_artifacts<C: ConnectionTrait>(
    db: &C,
    project: &MProject,
) -> Result<Vec<MArtifact>> {
    let builds = EProjectDependency::find()
        .filter(CProjectDependency::Project.eq(project.id))
        .all(db)
        .await
        .context("Failed to query project dependencies")?
        .into_iter()
        .filter_map(|pd| pd.current_build)
        .collect::<Vec<Uuid>>();

    EArtifact::find()
        .filter(CArtifact::Build.is_in(builds))
        .order_by_asc(CArtifact::Filename)
        .all(db)
        .await
        .context("Failed to query current artifacts")
}

/// Project dependencies paired with their dependency, ordered by job.
pub async fn get_project_dependencies<C: ConnectionTrait>(
    db: &C,
    project: &MProject,
) -> Result<Vec<(MProjectDependency, MDependency)>> {
    let project_dependencies = EProjectDependency::find()
        .filter(CProjectDependency::Project.eq(project.id))
        .all(db)
        .await
        .context("Failed to query project dependencies")?;

    let dependency_ids = project_dependencies
        .iter()
        .map(|pd| pd.dependency)
        .collect::<Vec<Uuid>>();

    let dependencies = EDependency::find()
        .filter(CDependency::Id.is_in(dependency_ids))
        .all(db)
        .await
        .context("Failed to query dependencies")?
        .into_iter()
        .map(|d| (d.id, d))
        .collect::<HashMap<Uuid, MDependency>>();

    let mut pairs = project_dependencies
        .into_iter()
        .filter_map(|pd| dependencies.get(&pd.dependency).cloned().map(|d| (pd, d)))
        .collect::<Vec<_>>();

    pairs.sort_by(|(_, a), (_, b)| a.job.cmp(&b.job).then_with(|| a.name.cmp(&b.name)));
    Ok(pairs)
}

/// Creates a project build with one slot per project dependency.
///
/// Requested builds leave the slots of the selected dependencies empty and,
/// with `queue_build`, ask the build server to build them tagged with the
/// new `build_key`. Every other slot, and every slot of an automated build,
/// is filled with the dependency's current build.
#[instrument(skip(state, project, dependencies), fields(project = %project.name))]
pub async fn build_project(
    state: &ServerState,
    project: &MProject,
    user: Option<&str>,
    dependencies: &[Uuid],
    queue_build: bool,
    automated: bool,
) -> Result<MProjectBuild> {
    let mut created = None;

    for attempt in 1..=BUILD_ID_ATTEMPTS {
        created = insert_project_build(state, project, user, dependencies, automated).await?;

        if created.is_some() {
            break;
        }

        debug!(attempt, "Project build id taken concurrently, retrying");
    }

    let (project_build, to_build) =
        created.ok_or_else(|| ProjectError::BuildIdTaken(project.name.clone()))?;

    info!(
        project_build = %project_build.build_id,
        build_key = %project_build.build_key,
        automated,
        "Created project build"
    );

    if queue_build {
        for dependency in to_build.iter() {
            build_dependency(state, dependency, Some(&project_build.build_key), user).await?;
        }
    }

    Ok(project_build)
}

/// Inserts the project build and its slots, or `None` when its build id was
/// taken by a concurrent request.
async fn insert_project_build(
    state: &ServerState,
    project: &MProject,
    user: Option<&str>,
    dependencies: &[Uuid],
    automated: bool,
) -> Result<Option<(MProjectBuild, Vec<MDependency>)>> {
    let txn = state.db.begin().await.context("Failed to begin transaction")?;
    let project_dependencies = get_project_dependencies(&txn, project).await?;

    for dependency in dependencies {
        if !project_dependencies.iter().any(|(_, d)| d.id == *dependency) {
            return Err(ProjectError::UnknownDependency {
                project: project.name.clone(),
                dependency: *dependency,
            }
            .into());
        }
    }

    let now = Utc::now().naive_utc();
    let aproject_build = AProjectBuild {
        id: Set(Uuid::now_v7()),
        project: Set(project.id),
        requested_by: Set(user.map(str::to_string)),
        requested_at: Set(now),
        ended_at: Set(None),
        status: Set(UNKNOWN_STATUS.to_string()),
        phase: Set(BuildPhase::Unknown),
        build_id: Set(generate_projectbuild_id(&txn, project, now).await?),
        build_key: Set(generate_build_key()),
        archived: Set(None),
        automated: Set(automated),
    };

    let project_build = match aproject_build.insert(&txn).await {
        Ok(project_build) => project_build,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            txn.rollback().await.context("Failed to roll back project build")?;
            return Ok(None);
        }
        Err(e) => return Err(e).context("Failed to insert project build"),
    };

    let mut to_build = vec![];

    for (project_dependency, dependency) in project_dependencies {
        let selected = dependencies.is_empty() || dependencies.contains(&dependency.id);
        let build = if selected && !automated {
            to_build.push(dependency.clone());
            None
        } else {
            project_dependency.current_build
        };

        AProjectBuildDependency {
            id: Set(Uuid::now_v7()),
            project_build: Set(project_build.id),
            dependency: Set(dependency.id),
            build: Set(build),
        }
        .insert(&txn)
        .await
        .context("Failed to insert project build dependency")?;
    }

    txn.commit().await.context("Failed to commit project build")?;
    Ok(Some((project_build, to_build)))
}

/// Queues a remote build of the dependency's job with its parameters.
#[instrument(skip(state, dependency), fields(dependency = %dependency.name))]
pub async fn build_dependency(
    state: &ServerState,
    dependency: &MDependency,
    build_id: Option<&str>,
    user: Option<&str>,
) -> Result<MTask> {
    let job = dependency
        .job
        .ok_or_else(|| ProjectError::MissingJob(dependency.name.clone()))?;
    let parameters = split_parameters(dependency.parameters.as_deref())?;

    enqueue(
        state,
        TaskPayload::BuildJob {
            job,
            build_id: build_id.map(str::to_string),
            parameters,
            requested_by: user.map(str::to_string),
        },
        None,
    )
    .await
}

/// Whether the project build finished, is not archived yet and has artifacts.
pub async fn can_be_archived(db: &DatabaseConnection, project_build: &MProjectBuild) -> Result<bool> {
    if !project_build.phase.is_terminal() || project_build.archived.is_some() {
        return Ok(false);
    }

    let artifacts = EArtifact::find()
        .join(JoinType::InnerJoin, entity::artifact::Relation::Build.def())
        .filter(CBuild::BuildId.eq(project_build.build_key.as_str()))
        .count(db)
        .await
        .context("Failed to count project build artifacts")?;

    Ok(artifacts > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key_is_32_hex() {
        let key = generate_build_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_build_key());
    }
}
