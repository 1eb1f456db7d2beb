/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use gantry_core::consts::{BUILD_ID_PARAMETER, REQUESTOR_PARAMETER};
use gantry_core::types::*;
use sea_orm::EntityTrait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Remote service that runs jobs and reports their builds back.
#[async_trait]
pub trait BuildServerClient: Send + Sync {
    async fn build_job(
        &self,
        server: &MBuildServer,
        job: &MJob,
        parameters: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Triggers jobs through the `buildWithParameters` endpoint of a Jenkins style server.
#[derive(Debug, Clone)]
pub struct HttpBuildServerClient {
    client: reqwest::Client,
}

impl HttpBuildServerClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    pub fn job_url(server: &MBuildServer, job: &MJob) -> String {
        format!(
            "{}/job/{}/buildWithParameters",
            server.url.trim_end_matches('/'),
            job.name
        )
    }
}

#[async_trait]
impl BuildServerClient for HttpBuildServerClient {
    async fn build_job(
        &self,
        server: &MBuildServer,
        job: &MJob,
        parameters: &BTreeMap<String, String>,
    ) -> Result<()> {
        let url = Self::job_url(server, job);

        self.client
            .post(&url)
            .basic_auth(&server.username, Some(&server.password))
            .form(parameters)
            .send()
            .await
            .with_context(|| format!("Failed to request build of {}", url))?
            .error_for_status()
            .with_context(|| format!("Build server rejected build of {}", url))?;

        Ok(())
    }
}

/// Adds the reserved `BUILD_ID` and `REQUESTOR` parameters when present.
pub fn build_parameters(
    build_id: Option<&str>,
    parameters: BTreeMap<String, String>,
    user: Option<&str>,
) -> BTreeMap<String, String> {
    let mut parameters = parameters;

    if let Some(build_id) = build_id {
        parameters.insert(BUILD_ID_PARAMETER.to_string(), build_id.to_string());
    }

    if let Some(user) = user {
        parameters.insert(REQUESTOR_PARAMETER.to_string(), user.to_string());
    }

    parameters
}

#[instrument(skip(state, client, parameters), fields(job_id = %job_id))]
pub async fn build_job(
    state: &ServerState,
    client: &dyn BuildServerClient,
    job_id: Uuid,
    build_id: Option<&str>,
    parameters: BTreeMap<String, String>,
    user: Option<&str>,
) -> Result<()> {
    let job = EJob::find_by_id(job_id)
        .one(&state.db)
        .await
        .context("Failed to query job")?
        .with_context(|| format!("Job {} does not exist", job_id))?;

    let server = EBuildServer::find_by_id(job.server)
        .one(&state.db)
        .await
        .context("Failed to query build server")?
        .with_context(|| format!("Build server {} does not exist", job.server))?;

    let parameters = build_parameters(build_id, parameters, user);
    client.build_job(&server, &job, &parameters).await?;

    info!(server = %server.name, job = %job.name, build_id = ?build_id, "Requested remote build");
    Ok(())
}
