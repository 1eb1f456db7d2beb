/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! The ledger of artifacts placed into an archive.

use anyhow::{Context, Result};
use chrono::Utc;
use gantry_core::types::*;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::policy::Policy;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive '{0}' does not exist")]
    UnknownArchive(String),
    #[error("Archive {0} does not exist")]
    MissingArchive(Uuid),
    #[error("Placement {0} does not exist")]
    MissingPlacement(Uuid),
    #[error("Placement {0} has not been transferred yet")]
    NotTransferred(Uuid),
    #[error("Path {path} is already held by artifact {artifact}")]
    PathTaken { path: String, artifact: Uuid },
}

/// Every placement of one artifact; the first is transferred, the rest are linked to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPlacements {
    pub artifact: MArtifact,
    pub placements: Vec<MArchiveArtifact>,
}

/// Logical destination of a placement; the ledger holds at most one row per
/// (archive, artifact, destination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Destination {
    Dependency(Uuid),
    Slot(Uuid),
}

impl Destination {
    fn of(row: &MArchiveArtifact) -> Option<Self> {
        match (row.project_build_dependency, row.dependency) {
            (Some(slot), _) => Some(Destination::Slot(slot)),
            (None, Some(dependency)) => Some(Destination::Dependency(dependency)),
            (None, None) => None,
        }
    }

    fn slot(&self) -> Option<Uuid> {
        match self {
            Destination::Slot(slot) => Some(*slot),
            Destination::Dependency(_) => None,
        }
    }
}

struct Candidate {
    path: String,
    dependency: Uuid,
    destination: Destination,
}

/// Ledger rows for every destination of the build's artifacts.
///
/// Per artifact the bare placements (one per dependency of the job, by name)
/// come first, followed by one placement per project build slot holding the
/// build, ordered by the project build's request time. Calling it again
/// returns the same rows without creating new ones.
///
/// Placements of the same artifact may share a path. A path already held by
/// a different artifact fails with [`ArchiveError::PathTaken`] and nothing is
/// recorded for the build.
pub async fn add_build(
    db: &DatabaseConnection,
    archive: &MArchive,
    build: &MBuild,
) -> Result<Vec<ArtifactPlacements>> {
    let policy = Policy::from(archive.policy);

    let artifacts = EArtifact::find()
        .filter(CArtifact::Build.eq(build.id))
        .order_by_asc(CArtifact::Filename)
        .all(db)
        .await
        .context("Failed to query artifacts")?;

    if artifacts.is_empty() {
        debug!(build_id = %build.id, "Build has no artifacts");
        return Ok(vec![]);
    }

    let job_dependencies = EDependency::find()
        .filter(CDependency::Job.eq(build.job))
        .order_by_asc(CDependency::Name)
        .all(db)
        .await
        .context("Failed to query dependencies of job")?;

    let slots = get_project_slots(db, build).await?;

    let mut candidates = vec![];
    for artifact in artifacts.iter() {
        let mut paths = vec![];

        for dependency in job_dependencies.iter() {
            paths.push(Candidate {
                path: policy.get_path(artifact, build, dependency, None),
                dependency: dependency.id,
                destination: Destination::Dependency(dependency.id),
            });
        }

        for (slot, dependency, project_build, project) in slots.iter() {
            paths.push(Candidate {
                path: policy.get_path(artifact, build, dependency, Some((project_build, project))),
                dependency: dependency.id,
                destination: Destination::Slot(slot.id),
            });
        }

        candidates.push(paths);
    }

    let txn = db.begin().await.context("Failed to begin transaction")?;

    let mut existing = EArchiveArtifact::find()
        .filter(CArchiveArtifact::Archive.eq(archive.id))
        .filter(CArchiveArtifact::Artifact.is_in(artifacts.iter().map(|a| a.id)))
        .all(&txn)
        .await
        .context("Failed to query archive artifacts")?
        .into_iter()
        .filter_map(|row| Destination::of(&row).map(|destination| ((row.artifact, destination), row)))
        .collect::<HashMap<(Uuid, Destination), MArchiveArtifact>>();

    let mut owners = EArchiveArtifact::find()
        .filter(CArchiveArtifact::Archive.eq(archive.id))
        .filter(CArchiveArtifact::ArchivedPath.is_in(candidates.iter().flatten().map(|c| c.path.clone())))
        .all(&txn)
        .await
        .context("Failed to query archived paths")?
        .into_iter()
        .map(|row| (row.archived_path, row.artifact))
        .collect::<HashMap<String, Uuid>>();

    let now = Utc::now().naive_utc();
    let mut result = vec![];
    let mut created = 0;

    for (artifact, paths) in artifacts.into_iter().zip(candidates.into_iter()) {
        let mut placements = vec![];

        for candidate in paths {
            if let Some(row) = existing.get(&(artifact.id, candidate.destination)) {
                placements.push(row.clone());
                continue;
            }

            match owners.get(&candidate.path) {
                Some(owner) if *owner != artifact.id => {
                    return Err(ArchiveError::PathTaken {
                        path: candidate.path,
                        artifact: *owner,
                    }
                    .into());
                }
                _ => {}
            }

            let aplacement = AArchiveArtifact {
                id: Set(Uuid::now_v7()),
                archive: Set(archive.id),
                artifact: Set(artifact.id),
                build: Set(Some(build.id)),
                dependency: Set(Some(candidate.dependency)),
                project_build_dependency: Set(candidate.destination.slot()),
                archived_path: Set(candidate.path.clone()),
                archived_at: Set(None),
                archived_size: Set(0),
                checksummed_at: Set(None),
                created_at: Set(now),
            };

            let row = aplacement
                .insert(&txn)
                .await
                .context("Failed to insert archive artifact")?;

            owners.insert(candidate.path, artifact.id);
            existing.insert((artifact.id, candidate.destination), row.clone());
            placements.push(row);
            created += 1;
        }

        result.push(ArtifactPlacements {
            artifact,
            placements,
        });
    }

    txn.commit().await.context("Failed to commit archive artifacts")?;

    info!(archive = %archive.name, build_id = %build.id, artifacts = result.len(), created, "Placed build artifacts");
    Ok(result)
}

/// Project build slots holding the build, by request time of their project build.
async fn get_project_slots<C: ConnectionTrait>(
    db: &C,
    build: &MBuild,
) -> Result<Vec<(MProjectBuildDependency, MDependency, MProjectBuild, MProject)>> {
    let slots = EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::Build.eq(build.id))
        .order_by_asc(CProjectBuildDependency::Id)
        .all(db)
        .await
        .context("Failed to query project build dependencies")?;

    let mut result = vec![];
    for slot in slots {
        let dependency = EDependency::find_by_id(slot.dependency)
            .one(db)
            .await
            .context("Failed to query dependency")?
            .with_context(|| format!("Dependency {} does not exist", slot.dependency))?;
        let project_build = EProjectBuild::find_by_id(slot.project_build)
            .one(db)
            .await
            .context("Failed to query project build")?
            .with_context(|| format!("Project build {} does not exist", slot.project_build))?;
        let project = EProject::find_by_id(project_build.project)
            .one(db)
            .await
            .context("Failed to query project")?
            .with_context(|| format!("Project {} does not exist", project_build.project))?;

        result.push((slot, dependency, project_build, project));
    }

    result.sort_by(|(a_slot, _, a_pb, _), (b_slot, _, b_pb, _)| {
        a_pb.requested_at
            .cmp(&b_pb.requested_at)
            .then_with(|| a_slot.id.cmp(&b_slot.id))
    });

    Ok(result)
}

pub async fn get_archived_artifacts_for_build(
    db: &DatabaseConnection,
    archive: &MArchive,
    build: &MBuild,
) -> Result<Vec<MArchiveArtifact>> {
    EArchiveArtifact::find()
        .filter(CArchiveArtifact::Archive.eq(archive.id))
        .filter(CArchiveArtifact::Build.eq(build.id))
        .order_by_asc(CArchiveArtifact::ArchivedPath)
        .all(db)
        .await
        .context("Failed to query archived artifacts")
}

pub async fn get_default_archive(db: &DatabaseConnection) -> Result<Option<MArchive>> {
    EArchive::find()
        .filter(CArchive::IsDefault.eq(true))
        .order_by_asc(CArchive::Name)
        .one(db)
        .await
        .context("Failed to query default archive")
}

/// Makes `name` the only default archive.
pub async fn set_default_archive(db: &DatabaseConnection, name: &str) -> Result<MArchive> {
    let txn = db.begin().await.context("Failed to begin transaction")?;

    let archive = EArchive::find()
        .filter(CArchive::Name.eq(name))
        .one(&txn)
        .await
        .context("Failed to query archive")?
        .ok_or_else(|| ArchiveError::UnknownArchive(name.to_string()))?;

    EArchive::update_many()
        .col_expr(CArchive::IsDefault, Expr::value(false))
        .filter(CArchive::IsDefault.eq(true))
        .exec(&txn)
        .await
        .context("Failed to clear default archive")?;

    let mut aarchive: AArchive = archive.into();
    aarchive.is_default = Set(true);
    let archive = aarchive
        .update(&txn)
        .await
        .context("Failed to set default archive")?;

    txn.commit().await.context("Failed to commit default archive")?;

    info!(archive = %archive.name, "Set default archive");
    Ok(archive)
}
