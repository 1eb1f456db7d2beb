/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::Utc;
use entity::archive::ArchiveTransport;
use entity::build::BuildPhase;
use entity::task::{TaskKind, TaskStatus};
use gantry_core::sources::{decrypt_ssh_private_key, load_crypt_key};
use gantry_core::tasks::{TaskOutcome, TaskPayload, enqueue, pending_tasks};
use gantry_core::types::*;
use orchestrator::projects::can_be_archived;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::archive::{ArchiveError, ArtifactPlacements, add_build, get_default_archive};
use super::transport::{SshCredentials, Transport};

const PLACEMENT_KINDS: &[TaskKind] = &[
    TaskKind::TransferArtifact,
    TaskKind::LinkArtifact,
    TaskKind::GenerateChecksums,
];

async fn get_archive(state: &ServerState, archive_id: Uuid) -> Result<MArchive> {
    EArchive::find_by_id(archive_id)
        .one(&state.db)
        .await
        .context("Failed to query archive")?
        .ok_or_else(|| ArchiveError::MissingArchive(archive_id).into())
}

async fn get_placement(state: &ServerState, placement_id: Uuid) -> Result<MArchiveArtifact> {
    EArchiveArtifact::find_by_id(placement_id)
        .one(&state.db)
        .await
        .context("Failed to query archive artifact")?
        .ok_or_else(|| ArchiveError::MissingPlacement(placement_id).into())
}

/// Transport of an archive; ssh archives decrypt their key pair first.
pub async fn open_transport(state: &ServerState, archive: &MArchive) -> Result<Transport> {
    let credentials = match (archive.transport, archive.ssh_credentials) {
        (ArchiveTransport::Ssh, Some(key_pair_id)) => {
            let key_pair = ESshKeyPair::find_by_id(key_pair_id)
                .one(&state.db)
                .await
                .context("Failed to query ssh key pair")?
                .with_context(|| format!("SSH key pair {} does not exist", key_pair_id))?;

            let crypt_key = load_crypt_key(state.cli.crypt_secret_file.as_deref())?;
            let (private_key, public_key) = decrypt_ssh_private_key(&crypt_key, &key_pair)?;

            Some(SshCredentials {
                public_key,
                private_key,
            })
        }
        _ => None,
    };

    Ok(Transport::for_archive(archive, credentials)?)
}

/// Schedules archival of a finished build into the default archive.
#[instrument(skip(state), fields(build_id = %build_id))]
pub async fn process_build_artifacts(state: &ServerState, build_id: Uuid) -> Result<usize> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await
        .context("Failed to query build")?
        .with_context(|| format!("Build {} does not exist", build_id))?;

    let Some(archive) = get_default_archive(&state.db).await? else {
        info!("No default archive configured, not archiving build artifacts");
        return Ok(0);
    };

    let scheduled = schedule_build(state, &archive, &build).await?;
    Ok(scheduled + schedule_slot_builds(state, &archive, &build).await?)
}

/// Schedules the other finished builds of unarchived project builds holding `build`.
///
/// Slots filled with an older build when the project build was created only
/// get their project placements here.
pub async fn schedule_slot_builds(
    state: &ServerState,
    archive: &MArchive,
    build: &MBuild,
) -> Result<usize> {
    let project_build_ids = EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::Build.eq(build.id))
        .all(&state.db)
        .await
        .context("Failed to query project build dependencies")?
        .into_iter()
        .map(|slot| slot.project_build)
        .collect::<HashSet<Uuid>>();

    let project_builds = EProjectBuild::find()
        .filter(CProjectBuild::Id.is_in(project_build_ids))
        .filter(CProjectBuild::Archived.is_null())
        .order_by_asc(CProjectBuild::RequestedAt)
        .all(&state.db)
        .await
        .context("Failed to query project builds")?;

    let mut seen = HashSet::from([build.id]);
    let mut scheduled = 0;

    for project_build in project_builds {
        let slots = EProjectBuildDependency::find()
            .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
            .order_by_asc(CProjectBuildDependency::Id)
            .all(&state.db)
            .await
            .context("Failed to query project build dependencies")?;

        for build_id in slots.into_iter().filter_map(|slot| slot.build) {
            if !seen.insert(build_id) {
                continue;
            }

            let Some(slot_build) = EBuild::find_by_id(build_id)
                .one(&state.db)
                .await
                .context("Failed to query build")?
            else {
                continue;
            };

            if slot_build.phase != BuildPhase::Finalized {
                continue;
            }

            debug!(project_build = %project_build.build_id, build_id = %slot_build.id, "Scheduling slot build");
            scheduled += schedule_build(state, archive, &slot_build).await?;
        }
    }

    Ok(scheduled)
}

/// Queues one transfer per artifact and a link per further placement.
///
/// Placements that are already archived, or already have a pending transfer
/// or link, are left alone, so scheduling the same build again only picks up
/// what is missing. Returns the number of queued transfers and links.
pub async fn schedule_build(state: &ServerState, archive: &MArchive, build: &MBuild) -> Result<usize> {
    let placements = add_build(&state.db, archive, build).await?;

    let mut transfers = HashMap::new();
    let mut links = HashSet::new();
    let mut checksums_queued = false;

    for (task, payload) in pending_tasks(&state.db, PLACEMENT_KINDS).await? {
        match payload {
            TaskPayload::TransferArtifact { archive_artifact } => {
                transfers.insert(archive_artifact, task.id);
            }
            TaskPayload::LinkArtifact { destination, .. } => {
                links.insert(destination);
            }
            TaskPayload::GenerateChecksums {
                archive: archive_id,
                build: build_id,
            } => {
                checksums_queued |= task.status == TaskStatus::Queued
                    && archive_id == archive.id
                    && build_id == build.id;
            }
            _ => {}
        }
    }

    let mut scheduled = 0;
    let mut unchecksummed = false;

    for ArtifactPlacements {
        artifact,
        placements,
    } in placements
    {
        let Some((first, rest)) = placements.split_first() else {
            continue;
        };

        unchecksummed |= placements
            .iter()
            .any(|p| p.project_build_dependency.is_some() && p.checksummed_at.is_none());

        let transfer = if first.is_archived() {
            None
        } else if let Some(task_id) = transfers.get(&first.id) {
            Some(*task_id)
        } else {
            let task = enqueue(
                state,
                TaskPayload::TransferArtifact {
                    archive_artifact: first.id,
                },
                None,
            )
            .await?;

            scheduled += 1;
            Some(task.id)
        };

        for placement in rest.iter().filter(|p| !p.is_archived() && !links.contains(&p.id)) {
            enqueue(
                state,
                TaskPayload::LinkArtifact {
                    source: first.id,
                    destination: placement.id,
                },
                transfer,
            )
            .await?;

            scheduled += 1;
        }

        debug!(artifact = %artifact.filename, placements = placements.len(), "Scheduled artifact");
    }

    if unchecksummed && !checksums_queued {
        enqueue(
            state,
            TaskPayload::GenerateChecksums {
                archive: archive.id,
                build: build.id,
            },
            None,
        )
        .await?;
    }

    info!(archive = %archive.name, build_id = %build.id, scheduled, "Scheduled build archival");
    Ok(scheduled)
}

async fn set_archived(
    state: &ServerState,
    placement: MArchiveArtifact,
    size: i64,
) -> Result<MArchiveArtifact> {
    let mut aplacement: AArchiveArtifact = placement.into();
    aplacement.archived_at = Set(Some(Utc::now().naive_utc()));
    aplacement.archived_size = Set(size);

    aplacement
        .update(&state.db)
        .await
        .context("Failed to update archive artifact")
}

#[instrument(skip(state), fields(placement = %placement_id))]
pub async fn transfer_artifact(state: &ServerState, placement_id: Uuid) -> Result<()> {
    let placement = get_placement(state, placement_id).await?;

    if placement.is_archived() {
        debug!("Artifact already archived");
        return Ok(());
    }

    let archive = get_archive(state, placement.archive).await?;
    let artifact = EArtifact::find_by_id(placement.artifact)
        .one(&state.db)
        .await
        .context("Failed to query artifact")?
        .with_context(|| format!("Artifact {} does not exist", placement.artifact))?;
    let build = EBuild::find_by_id(artifact.build)
        .one(&state.db)
        .await
        .context("Failed to query build")?
        .with_context(|| format!("Build {} does not exist", artifact.build))?;
    let job = EJob::find_by_id(build.job)
        .one(&state.db)
        .await
        .context("Failed to query job")?
        .with_context(|| format!("Job {} does not exist", build.job))?;
    let server = EBuildServer::find_by_id(job.server)
        .one(&state.db)
        .await
        .context("Failed to query build server")?
        .with_context(|| format!("Build server {} does not exist", job.server))?;

    let mut transport = open_transport(state, &archive).await?;
    let result = match transport.start().await {
        Ok(()) => {
            transport
                .archive_url(
                    &artifact.url,
                    &placement.archived_path,
                    &server.username,
                    &server.password,
                )
                .await
        }
        Err(e) => Err(e),
    };
    transport.end().await;

    let size = result.with_context(|| format!("Failed to archive {}", artifact.url))?;
    set_archived(state, placement, size as i64).await?;

    mark_projectbuilds_archived(state, &archive, build.id).await?;
    Ok(())
}

#[instrument(skip(state), fields(source = %source_id, destination = %destination_id))]
pub async fn link_artifact(state: &ServerState, source_id: Uuid, destination_id: Uuid) -> Result<()> {
    let destination = get_placement(state, destination_id).await?;

    if destination.is_archived() {
        debug!("Artifact already linked");
        return Ok(());
    }

    let source = get_placement(state, source_id).await?;

    if !source.is_archived() {
        return Err(ArchiveError::NotTransferred(source.id).into());
    }

    let archive = get_archive(state, destination.archive).await?;
    let mut transport = open_transport(state, &archive).await?;
    let result = match transport.start().await {
        Ok(()) => {
            transport
                .link_filename_to_filename(&source.archived_path, &destination.archived_path)
                .await
        }
        Err(e) => Err(e),
    };
    transport.end().await;

    result.with_context(|| format!("Failed to link {}", destination.archived_path))?;

    let build = destination.build;
    set_archived(state, destination, source.archived_size).await?;

    if let Some(build) = build {
        mark_projectbuilds_archived(state, &archive, build).await?;
    }

    Ok(())
}

/// Appends checksums of the project placements of a build.
///
/// Deferred until every one of them has been transferred or linked. Each
/// placement is written to its manifest once; placements sharing a path with
/// one already in the manifest are only marked.
#[instrument(skip(state), fields(archive = %archive_id, build_id = %build_id))]
pub async fn generate_checksums(
    state: &ServerState,
    archive_id: Uuid,
    build_id: Uuid,
) -> Result<TaskOutcome> {
    let archive = get_archive(state, archive_id).await?;

    let placements = EArchiveArtifact::find()
        .filter(CArchiveArtifact::Archive.eq(archive.id))
        .filter(CArchiveArtifact::Build.eq(build_id))
        .filter(CArchiveArtifact::ProjectBuildDependency.is_not_null())
        .filter(CArchiveArtifact::ChecksummedAt.is_null())
        .order_by_asc(CArchiveArtifact::ArchivedPath)
        .all(&state.db)
        .await
        .context("Failed to query project placements")?;

    if placements.is_empty() {
        debug!("No project placements left to checksum");
        return Ok(TaskOutcome::Completed);
    }

    let pending = placements.iter().filter(|p| !p.is_archived()).count();
    if pending > 0 {
        debug!(pending, "Placements not archived yet, deferring checksums");
        return Ok(TaskOutcome::Deferred);
    }

    let mut transport = open_transport(state, &archive).await?;
    let result = match transport.start().await {
        Ok(()) => append_checksums(state, &archive, &mut transport, placements).await,
        Err(e) => Err(e.into()),
    };
    transport.end().await;

    let count = result.context("Failed to generate checksums")?;

    info!(archive = %archive.name, count, "Generated checksums");
    Ok(TaskOutcome::Completed)
}

async fn append_checksums(
    state: &ServerState,
    archive: &MArchive,
    transport: &mut Transport,
    placements: Vec<MArchiveArtifact>,
) -> Result<usize> {
    let mut written = EArchiveArtifact::find()
        .filter(CArchiveArtifact::Archive.eq(archive.id))
        .filter(CArchiveArtifact::ArchivedPath.is_in(placements.iter().map(|p| p.archived_path.clone())))
        .filter(CArchiveArtifact::ChecksummedAt.is_not_null())
        .all(&state.db)
        .await
        .context("Failed to query checksummed placements")?
        .into_iter()
        .map(|p| p.archived_path)
        .collect::<HashSet<String>>();

    let mut count = 0;
    for placement in placements {
        if !written.contains(&placement.archived_path) {
            transport.generate_checksums(&placement).await?;
            count += 1;
        }

        written.insert(placement.archived_path.clone());

        let mut aplacement: AArchiveArtifact = placement.into();
        aplacement.checksummed_at = Set(Some(Utc::now().naive_utc()));
        aplacement
            .update(&state.db)
            .await
            .context("Failed to mark placement checksummed")?;
    }

    Ok(count)
}

/// Marks finalized project builds holding `build_id` as archived once every
/// artifact of every slot build has an archived project placement.
pub async fn mark_projectbuilds_archived(
    state: &ServerState,
    archive: &MArchive,
    build_id: Uuid,
) -> Result<Vec<MProjectBuild>> {
    let project_build_ids = EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::Build.eq(build_id))
        .all(&state.db)
        .await
        .context("Failed to query project build dependencies")?
        .into_iter()
        .map(|slot| slot.project_build)
        .collect::<HashSet<Uuid>>();

    let project_builds = EProjectBuild::find()
        .filter(CProjectBuild::Id.is_in(project_build_ids))
        .filter(CProjectBuild::Phase.eq(BuildPhase::Finalized))
        .filter(CProjectBuild::Archived.is_null())
        .all(&state.db)
        .await
        .context("Failed to query project builds")?;

    let mut archived = vec![];
    for project_build in project_builds {
        let slots = EProjectBuildDependency::find()
            .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
            .all(&state.db)
            .await
            .context("Failed to query project build dependencies")?;

        let artifacts = EArtifact::find()
            .filter(CArtifact::Build.is_in(slots.iter().filter_map(|slot| slot.build)))
            .all(&state.db)
            .await
            .context("Failed to query slot artifacts")?;

        let placed = EArchiveArtifact::find()
            .filter(CArchiveArtifact::Archive.eq(archive.id))
            .filter(CArchiveArtifact::ProjectBuildDependency.is_in(slots.iter().map(|slot| slot.id)))
            .filter(CArchiveArtifact::ArchivedAt.is_not_null())
            .all(&state.db)
            .await
            .context("Failed to query project build placements")?
            .into_iter()
            .filter_map(|p| p.project_build_dependency.map(|slot| (p.artifact, slot)))
            .collect::<HashSet<(Uuid, Uuid)>>();

        let expected = slots
            .iter()
            .flat_map(|slot| {
                artifacts
                    .iter()
                    .filter(move |artifact| slot.build == Some(artifact.build))
                    .map(move |artifact| (artifact.id, slot.id))
            })
            .collect::<Vec<(Uuid, Uuid)>>();

        if expected.is_empty() || !expected.iter().all(|pair| placed.contains(pair)) {
            debug!(project_build = %project_build.build_id, expected = expected.len(), placed = placed.len(), "Project build not fully archived");
            continue;
        }

        let mut aproject_build: AProjectBuild = project_build.into();
        aproject_build.archived = Set(Some(Utc::now().naive_utc()));
        let project_build = aproject_build
            .update(&state.db)
            .await
            .context("Failed to mark project build archived")?;

        info!(project_build = %project_build.build_id, archive = %archive.name, "Project build archived");
        archived.push(project_build);
    }

    Ok(archived)
}

/// Schedules archival of every build attached to a finished project build.
#[instrument(skip(state), fields(project_build = %project_build_id))]
pub async fn archive_projectbuild(
    state: &ServerState,
    project_build_id: Uuid,
    archive_id: Option<Uuid>,
) -> Result<usize> {
    let project_build = EProjectBuild::find_by_id(project_build_id)
        .one(&state.db)
        .await
        .context("Failed to query project build")?
        .with_context(|| format!("Project build {} does not exist", project_build_id))?;

    if !can_be_archived(&state.db, &project_build).await? {
        info!(build_id = %project_build.build_id, "Project build cannot be archived");
        return Ok(0);
    }

    let archive = match archive_id {
        Some(archive_id) => get_archive(state, archive_id).await?,
        None => match get_default_archive(&state.db).await? {
            Some(archive) => archive,
            None => {
                info!("No default archive configured, not archiving project build");
                return Ok(0);
            }
        },
    };

    let slots = EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
        .order_by_asc(CProjectBuildDependency::Id)
        .all(&state.db)
        .await
        .context("Failed to query project build dependencies")?;

    let mut seen = HashSet::new();
    let mut scheduled = 0;

    for build_id in slots.iter().filter_map(|slot| slot.build) {
        if !seen.insert(build_id) {
            continue;
        }

        let build = EBuild::find_by_id(build_id)
            .one(&state.db)
            .await
            .context("Failed to query build")?
            .with_context(|| format!("Build {} does not exist", build_id))?;

        scheduled += schedule_build(state, &archive, &build).await?;
    }

    Ok(scheduled)
}
