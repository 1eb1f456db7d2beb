/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Ingestion of the build notifications a build server posts for its jobs.
//!
//! A notification is sent for every phase of a build. The build row is
//! upserted by `(job, number)` so notifications can be replayed, and
//! artifacts are imported once per `(build, filename)`. Artifacts sharing a
//! base name keep their relative path as file name.

use anyhow::{Context, Result};
use chrono::Utc;
use entity::build::BuildPhase;
use entity::project_build::UNKNOWN_STATUS;
use gantry_core::consts::{BUILD_ID_PARAMETER, REQUESTOR_PARAMETER};
use gantry_core::database::get_job_by_name;
use gantry_core::tasks::{TaskPayload, enqueue};
use gantry_core::types::*;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification for unknown job '{job}' on server '{server}'")]
    UnknownJob { server: String, job: String },
    #[error("{0}")]
    InvalidPhase(String),
    #[error("Artifact '{0}' has no usable file name")]
    InvalidArtifact(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildNotification {
    /// Name of the job on the notifying server.
    pub name: String,
    pub build: NotifiedBuild,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiedBuild {
    pub number: i64,
    pub phase: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Artifact path mapped to its download locations, e.g. `{"archive": url}`.
    #[serde(default)]
    pub artifacts: BTreeMap<String, BTreeMap<String, String>>,
}

impl BuildNotification {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse build notification")
    }
}

fn artifact_segments(path: &str) -> Result<Vec<&str>, NotificationError> {
    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<&str>>();

    if segments.is_empty() || segments.contains(&"..") {
        return Err(NotificationError::InvalidArtifact(path.to_string()));
    }

    Ok(segments)
}

/// File name of every artifact path: its last segment, or the whole relative
/// path when several artifacts of the build share that segment.
fn artifact_filenames<'a>(
    paths: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeMap<&'a str, String>, NotificationError> {
    let mut segments = BTreeMap::new();
    let mut names = HashMap::<&str, usize>::new();

    for path in paths {
        let parts = artifact_segments(path)?;
        if let Some(name) = parts.last() {
            *names.entry(*name).or_default() += 1;
        }
        segments.insert(path, parts);
    }

    Ok(segments
        .into_iter()
        .map(|(path, parts)| {
            let shared = parts
                .last()
                .and_then(|name| names.get(name))
                .is_some_and(|count| *count > 1);

            let filename = match parts.last() {
                Some(name) if !shared => name.to_string(),
                _ => parts.join("/"),
            };

            (path, filename)
        })
        .collect())
}

fn artifact_url(locations: &BTreeMap<String, String>) -> Option<&String> {
    locations.get("archive").or_else(|| locations.values().next())
}

/// Stores the reported state of a build and queues its processing.
///
/// A build that already reached `FINALIZED` keeps that phase when a late
/// notification for an earlier phase arrives. The correlation tag is only
/// set while the stored one is still empty.
#[instrument(skip(state, server, notification), fields(server = %server.name, job = %notification.name, number = notification.build.number))]
pub async fn record_build_notification(
    state: &ServerState,
    server: &MBuildServer,
    notification: BuildNotification,
) -> Result<MBuild> {
    let job = get_job_by_name(&state.db, server, &notification.name)
        .await?
        .ok_or_else(|| NotificationError::UnknownJob {
            server: server.name.clone(),
            job: notification.name.clone(),
        })?;

    let reported = notification.build;
    let phase = BuildPhase::from_str(&reported.phase).map_err(NotificationError::InvalidPhase)?;
    let build_id = reported
        .parameters
        .get(BUILD_ID_PARAMETER)
        .cloned()
        .unwrap_or_default();
    let requested_by = reported.parameters.get(REQUESTOR_PARAMETER).cloned();
    let now = Utc::now().naive_utc();

    let txn = state.db.begin().await.context("Failed to begin transaction")?;

    let abuild = ABuild {
        id: Set(Uuid::now_v7()),
        job: Set(job.id),
        number: Set(reported.number),
        build_id: Set(build_id.clone()),
        phase: Set(phase),
        status: Set(reported
            .status
            .clone()
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string())),
        url: Set(reported.url.clone().unwrap_or_default()),
        duration: Set(reported.duration),
        requested_by: Set(requested_by.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    EBuild::insert(abuild)
        .on_conflict(
            OnConflict::columns([CBuild::Job, CBuild::Number])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await
        .context("Failed to insert build")?;

    let build = EBuild::find()
        .filter(CBuild::Job.eq(job.id))
        .filter(CBuild::Number.eq(reported.number))
        .one(&txn)
        .await
        .context("Failed to query build")?
        .with_context(|| format!("Build {} of job {} vanished", reported.number, job.name))?;

    let mut abuild: ABuild = build.clone().into();

    if !build.phase.is_terminal() {
        abuild.phase = Set(phase);
    }

    if let Some(status) = reported.status {
        abuild.status = Set(status);
    }

    if let Some(url) = reported.url {
        abuild.url = Set(url);
    }

    if reported.duration.is_some() {
        abuild.duration = Set(reported.duration);
    }

    if build.build_id.is_empty() && !build_id.is_empty() {
        abuild.build_id = Set(build_id);
    }

    if build.requested_by.is_none() && requested_by.is_some() {
        abuild.requested_by = Set(requested_by);
    }

    abuild.updated_at = Set(now);
    let build = abuild.update(&txn).await.context("Failed to update build")?;

    let located = reported
        .artifacts
        .iter()
        .filter_map(|(path, locations)| match artifact_url(locations) {
            Some(url) => Some((path.as_str(), url)),
            None => {
                debug!(path = %path, "Skipping artifact without location");
                None
            }
        })
        .collect::<Vec<(&str, &String)>>();
    let filenames = artifact_filenames(located.iter().map(|(path, _)| *path))?;

    for (path, url) in located {
        let filename = filenames
            .get(path)
            .cloned()
            .ok_or_else(|| NotificationError::InvalidArtifact(path.to_string()))?;

        let aartifact = AArtifact {
            id: Set(Uuid::now_v7()),
            build: Set(build.id),
            filename: Set(filename),
            url: Set(url.clone()),
            created_at: Set(now),
        };

        EArtifact::insert(aartifact)
            .on_conflict(
                OnConflict::columns([CArtifact::Build, CArtifact::Filename])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .context("Failed to insert artifact")?;
    }

    txn.commit().await.context("Failed to commit build notification")?;

    info!(build_id = %build.id, phase = %build.phase, status = %build.status, "Recorded build notification");
    enqueue(state, TaskPayload::ProcessBuild { build: build.id }, None).await?;

    Ok(build)
}
