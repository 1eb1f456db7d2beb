/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Propagation of a dependency build into the projects using it.
//!
//! The steps run in order and are safe to repeat for the same build. There
//! is no rollback, a failing step aborts the rest and relies on the task
//! being delivered again.

use anyhow::{Context, Result};
use chrono::Utc;
use entity::build::BuildPhase;
use gantry_core::types::*;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::projects::build_project;

#[instrument(skip(state, build), fields(build_id = %build.id, number = build.number))]
pub async fn process_build_dependencies(state: &ServerState, build: &MBuild) -> Result<Uuid> {
    update_autotracked_dependencies(&state.db, build).await?;
    let satisfied = update_projectbuilds(&state.db, build).await?;
    create_projectbuilds_for_autotracking(state, build, satisfied.map(|pb| pb.project)).await?;
    Ok(build.id)
}

async fn get_job_dependencies(db: &DatabaseConnection, build: &MBuild) -> Result<Vec<MDependency>> {
    EDependency::find()
        .filter(CDependency::Job.eq(build.job))
        .order_by_asc(CDependency::Name)
        .all(db)
        .await
        .context("Failed to query dependencies of job")
}

/// Points every auto-tracking project dependency of the build's job at the build.
///
/// Latest notification wins, an older build delivered late rewinds the pointer.
pub async fn update_autotracked_dependencies(db: &DatabaseConnection, build: &MBuild) -> Result<u64> {
    let dependencies = get_job_dependencies(db, build)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect::<Vec<Uuid>>();

    if dependencies.is_empty() {
        return Ok(0);
    }

    let result = EProjectDependency::update_many()
        .col_expr(CProjectDependency::CurrentBuild, Expr::value(Some(build.id)))
        .filter(CProjectDependency::Dependency.is_in(dependencies))
        .filter(CProjectDependency::AutoTrack.eq(true))
        .exec(db)
        .await
        .context("Failed to update auto tracked dependencies")?;

    debug!(count = result.rows_affected, "Updated auto tracked dependencies");
    Ok(result.rows_affected)
}

/// Attaches the build to the project build it was requested for and
/// recomputes that project build.
pub async fn update_projectbuilds(
    db: &DatabaseConnection,
    build: &MBuild,
) -> Result<Option<MProjectBuild>> {
    if build.build_id.is_empty() {
        return Ok(None);
    }

    let Some(project_build) = EProjectBuild::find()
        .filter(CProjectBuild::BuildKey.eq(build.build_id.as_str()))
        .one(db)
        .await
        .context("Failed to query project build")?
    else {
        debug!(build_key = %build.build_id, "No project build for build key");
        return Ok(None);
    };

    let dependencies = get_job_dependencies(db, build)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect::<Vec<Uuid>>();

    let result = EProjectBuildDependency::update_many()
        .col_expr(CProjectBuildDependency::Build, Expr::value(Some(build.id)))
        .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
        .filter(CProjectBuildDependency::Dependency.is_in(dependencies))
        .exec(db)
        .await
        .context("Failed to attach build to project build")?;

    if result.rows_affected == 0 {
        debug!(project_build = %project_build.build_id, "Build does not fill a slot of the project build");
        return Ok(None);
    }

    update_projectbuild_aggregate(db, project_build).await.map(Some)
}

/// Applies the status and phase all slots agree on.
///
/// Any disagreement, including an empty slot, leaves the value unchanged.
pub async fn update_projectbuild_aggregate(
    db: &DatabaseConnection,
    project_build: MProjectBuild,
) -> Result<MProjectBuild> {
    let slots = EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
        .all(db)
        .await
        .context("Failed to query project build dependencies")?;

    let Some(build_ids) = slots.iter().map(|s| s.build).collect::<Option<Vec<Uuid>>>() else {
        return Ok(project_build);
    };

    if build_ids.is_empty() {
        return Ok(project_build);
    }

    let builds = EBuild::find()
        .filter(CBuild::Id.is_in(build_ids.clone()))
        .all(db)
        .await
        .context("Failed to query project build builds")?
        .into_iter()
        .map(|b| (b.id, b))
        .collect::<HashMap<Uuid, MBuild>>();

    let mut statuses = HashSet::new();
    let mut phases = HashSet::new();

    for build_id in build_ids.iter() {
        let Some(build) = builds.get(build_id) else {
            return Ok(project_build);
        };

        statuses.insert(build.status.clone());
        phases.insert(build.phase);
    }

    let status = if statuses.len() == 1 { statuses.into_iter().next() } else { None };
    let phase = if phases.len() == 1 { phases.into_iter().next() } else { None };

    let mut aproject_build: AProjectBuild = project_build.clone().into();
    let mut changed = false;

    if let Some(status) = status.filter(|s| *s != project_build.status) {
        aproject_build.status = Set(status);
        changed = true;
    }

    if let Some(phase) = phase.filter(|p| *p != project_build.phase) {
        aproject_build.phase = Set(phase);
        changed = true;

        if phase == BuildPhase::Finalized {
            aproject_build.ended_at = Set(Some(Utc::now().naive_utc()));
            info!(
                project_build = %project_build.build_id,
                build_key = %project_build.build_key,
                "Project build finished"
            );
        }
    }

    if !changed {
        return Ok(project_build);
    }

    aproject_build
        .update(db)
        .await
        .context("Failed to update project build")
}

/// Creates an automated project build for every project auto-tracking a
/// dependency of the build's job, except `skip_project`.
///
/// A project that already has an automated build for this build only gets
/// that one recomputed.
pub async fn create_projectbuilds_for_autotracking(
    state: &ServerState,
    build: &MBuild,
    skip_project: Option<Uuid>,
) -> Result<Vec<MProjectBuild>> {
    let db = &state.db;
    let mut project_builds = vec![];

    for dependency in get_job_dependencies(db, build).await? {
        let project_dependencies = EProjectDependency::find()
            .filter(CProjectDependency::Dependency.eq(dependency.id))
            .filter(CProjectDependency::AutoTrack.eq(true))
            .order_by_asc(CProjectDependency::Id)
            .all(db)
            .await
            .context("Failed to query auto tracking project dependencies")?;

        for project_dependency in project_dependencies {
            if Some(project_dependency.project) == skip_project {
                continue;
            }

            let Some(project) = EProject::find_by_id(project_dependency.project)
                .one(db)
                .await
                .context("Failed to query project")?
            else {
                continue;
            };

            let project_build = match get_automated_projectbuild(db, &project, &dependency, build).await? {
                Some(project_build) => project_build,
                None => {
                    let project_build = build_project(state, &project, None, &[], false, true).await?;

                    EProjectBuildDependency::update_many()
                        .col_expr(CProjectBuildDependency::Build, Expr::value(Some(build.id)))
                        .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
                        .filter(CProjectBuildDependency::Dependency.eq(dependency.id))
                        .exec(db)
                        .await
                        .context("Failed to attach build to automated project build")?;

                    info!(
                        project = %project.name,
                        dependency = %dependency.name,
                        project_build = %project_build.build_id,
                        "Created automated project build"
                    );

                    project_build
                }
            };

            project_builds.push(update_projectbuild_aggregate(db, project_build).await?);
        }
    }

    Ok(project_builds)
}

async fn get_automated_projectbuild(
    db: &DatabaseConnection,
    project: &MProject,
    dependency: &MDependency,
    build: &MBuild,
) -> Result<Option<MProjectBuild>> {
    let slots = EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::Dependency.eq(dependency.id))
        .filter(CProjectBuildDependency::Build.eq(build.id))
        .all(db)
        .await
        .context("Failed to query project build dependencies")?;

    if slots.is_empty() {
        return Ok(None);
    }

    EProjectBuild::find()
        .filter(CProjectBuild::Id.is_in(slots.into_iter().map(|s| s.project_build)))
        .filter(CProjectBuild::Project.eq(project.id))
        .filter(CProjectBuild::Automated.eq(true))
        .order_by_asc(CProjectBuild::RequestedAt)
        .one(db)
        .await
        .context("Failed to query automated project build")
}
