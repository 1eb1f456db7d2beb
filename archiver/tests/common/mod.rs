/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{NaiveDateTime, Utc};
use clap::Parser;
use entity::archive::{ArchivePolicy, ArchiveTransport};
use gantry_core::database::migrate;
use gantry_core::input::slugify;
use gantry_core::types::*;
use orchestrator::dependencies::process_build_dependencies;
use orchestrator::notifications::{BuildNotification, NotifiedBuild, record_build_notification};
use orchestrator::projects::build_project;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, EntityTrait, Set};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

pub const IMAGE: &[u8] = b"ubuntu touch image contents\n";

/// `gantry:secret`
const AUTHORIZATION: &str = "Basic Z2FudHJ5OnNlY3JldA==";

pub async fn test_state() -> Arc<ServerState> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    migrate(&db).await.unwrap();

    Arc::new(ServerState {
        db,
        cli: Cli::parse_from(["gantry-server"]),
    })
}

type Files = Arc<HashMap<String, Vec<u8>>>;

async fn serve_artifact(
    State(files): State<Files>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == AUTHORIZATION);

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match files.get(&path) {
        Some(content) => (StatusCode::OK, Bytes::from(content.clone())).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serves `files` below `/artifact/` and returns the base url.
pub async fn spawn_artifact_server(files: &[(&str, &[u8])]) -> String {
    let files: Files = Arc::new(
        files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_vec()))
            .collect(),
    );
    let app = Router::new()
        .route("/artifact/{*path}", get(serve_artifact))
        .with_state(files);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", address)
}

pub async fn create_archive(
    state: &ServerState,
    name: &str,
    basedir: &std::path::Path,
    policy: ArchivePolicy,
    is_default: bool,
) -> MArchive {
    AArchive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        host: Set(None),
        port: Set(22),
        basedir: Set(basedir.to_string_lossy().to_string()),
        username: Set(None),
        policy: Set(policy),
        transport: Set(ArchiveTransport::Local),
        ssh_credentials: Set(None),
        is_default: Set(is_default),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

pub struct Fixture {
    pub server: MBuildServer,
    pub job: MJob,
    pub kernel: MDependency,
    pub tools: MDependency,
    pub project: MProject,
}

/// One job feeding two dependencies, one of which is part of a project.
pub async fn create_fixture(state: &ServerState, url: &str) -> Fixture {
    let now = Utc::now().naive_utc();

    let server = ABuildServer {
        id: Set(Uuid::new_v4()),
        name: Set("jenkins".to_string()),
        url: Set(url.to_string()),
        username: Set("gantry".to_string()),
        password: Set("secret".to_string()),
        created_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap();

    let job = AJob {
        id: Set(Uuid::new_v4()),
        server: Set(server.id),
        name: Set("kernel".to_string()),
        created_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap();

    let mut dependencies = vec![];
    for name in ["Linux Kernel", "Kernel Tools"] {
        let dependency = ADependency {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            job: Set(Some(job.id)),
            description: Set(String::new()),
            parameters: Set(None),
            created_at: Set(now),
        }
        .insert(&state.db)
        .await
        .unwrap();

        dependencies.push(dependency);
    }

    let tools = dependencies.pop().unwrap();
    let kernel = dependencies.pop().unwrap();

    let project = AProject {
        id: Set(Uuid::new_v4()),
        name: Set("Ubuntu Touch".to_string()),
        description: Set(String::new()),
        created_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap();

    AProjectDependency {
        id: Set(Uuid::now_v7()),
        project: Set(project.id),
        dependency: Set(kernel.id),
        auto_track: Set(false),
        current_build: Set(None),
    }
    .insert(&state.db)
    .await
    .unwrap();

    Fixture {
        server,
        job,
        kernel,
        tools,
        project,
    }
}

pub fn notification(
    url: &str,
    job: &MJob,
    number: i64,
    build_id: Option<&str>,
    artifacts: &[&str],
) -> BuildNotification {
    let mut parameters = BTreeMap::new();

    if let Some(build_id) = build_id {
        parameters.insert("BUILD_ID".to_string(), build_id.to_string());
    }

    let artifacts = artifacts
        .iter()
        .map(|path| {
            let mut locations = BTreeMap::new();
            locations.insert("archive".to_string(), format!("{}/artifact/{}", url, path));
            (path.to_string(), locations)
        })
        .collect();

    BuildNotification {
        name: job.name.clone(),
        build: NotifiedBuild {
            number,
            phase: "FINALIZED".to_string(),
            status: Some("SUCCESS".to_string()),
            url: Some(format!("job/{}/{}/", job.name, number)),
            duration: None,
            parameters,
            artifacts,
        },
    }
}

/// A requested project build whose only dependency finished with `artifacts`.
pub async fn finished_project_build(
    state: &ServerState,
    url: &str,
    fixture: &Fixture,
    artifacts: &[&str],
) -> (MProjectBuild, MBuild) {
    let project_build = build_project(state, &fixture.project, Some("alice"), &[], false, false)
        .await
        .unwrap();

    let build = record_build_notification(
        state,
        &fixture.server,
        notification(url, &fixture.job, 1, Some(&project_build.build_key), artifacts),
    )
    .await
    .unwrap();

    process_build_dependencies(state, &build).await.unwrap();

    let project_build = EProjectBuild::find_by_id(project_build.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();

    (project_build, build)
}

/// A finished build of the fixture job that no project build asked for.
pub async fn untracked_build(
    state: &ServerState,
    url: &str,
    fixture: &Fixture,
    number: i64,
    artifacts: &[&str],
) -> MBuild {
    record_build_notification(
        state,
        &fixture.server,
        notification(url, &fixture.job, number, None, artifacts),
    )
    .await
    .unwrap()
}

pub async fn set_created_at(state: &ServerState, build: &MBuild, created_at: NaiveDateTime) -> MBuild {
    let mut abuild: ABuild = build.clone().into();
    abuild.created_at = Set(created_at);
    abuild.update(&state.db).await.unwrap()
}

/// Adds a dependency on its own job to the fixture project, with its slot
/// pre-filled by an already finished build.
pub async fn add_prefilled_dependency(
    state: &ServerState,
    url: &str,
    fixture: &Fixture,
    name: &str,
    artifacts: &[&str],
) -> (MDependency, MBuild) {
    let now = Utc::now().naive_utc();

    let job = AJob {
        id: Set(Uuid::new_v4()),
        server: Set(fixture.server.id),
        name: Set(slugify(name)),
        created_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap();

    let dependency = ADependency {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        job: Set(Some(job.id)),
        description: Set(String::new()),
        parameters: Set(None),
        created_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap();

    let build = record_build_notification(
        state,
        &fixture.server,
        notification(url, &job, 1, None, artifacts),
    )
    .await
    .unwrap();

    AProjectDependency {
        id: Set(Uuid::now_v7()),
        project: Set(fixture.project.id),
        dependency: Set(dependency.id),
        auto_track: Set(false),
        current_build: Set(Some(build.id)),
    }
    .insert(&state.db)
    .await
    .unwrap();

    (dependency, build)
}
