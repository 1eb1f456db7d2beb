/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

#![allow(dead_code)]

use chrono::Utc;
use clap::Parser;
use gantry_core::database::migrate;
use gantry_core::types::*;
use orchestrator::notifications::{BuildNotification, NotifiedBuild, record_build_notification};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, EntityTrait, Set};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

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

pub async fn create_server(state: &ServerState, url: &str) -> MBuildServer {
    ABuildServer {
        id: Set(Uuid::new_v4()),
        name: Set("jenkins".to_string()),
        url: Set(url.to_string()),
        username: Set("gantry".to_string()),
        password: Set("secret".to_string()),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

pub async fn create_job(state: &ServerState, server: &MBuildServer, name: &str) -> MJob {
    AJob {
        id: Set(Uuid::new_v4()),
        server: Set(server.id),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

pub async fn create_dependency(
    state: &ServerState,
    name: &str,
    job: Option<&MJob>,
    parameters: Option<&str>,
) -> MDependency {
    ADependency {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        job: Set(job.map(|j| j.id)),
        description: Set(String::new()),
        parameters: Set(parameters.map(str::to_string)),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

pub async fn create_project(
    state: &ServerState,
    name: &str,
    dependencies: &[(&MDependency, bool)],
) -> MProject {
    let project = AProject {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(String::new()),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await
    .unwrap();

    for (dependency, auto_track) in dependencies {
        AProjectDependency {
            id: Set(Uuid::now_v7()),
            project: Set(project.id),
            dependency: Set(dependency.id),
            auto_track: Set(*auto_track),
            current_build: Set(None),
        }
        .insert(&state.db)
        .await
        .unwrap();
    }

    project
}

pub struct Graph {
    pub server: MBuildServer,
    pub job1: MJob,
    pub job2: MJob,
    pub d1: MDependency,
    pub d2: MDependency,
}

/// Two dependencies with one job each on the same server.
pub async fn create_graph(state: &ServerState) -> Graph {
    let server = create_server(state, "http://jenkins.example.com").await;
    let job1 = create_job(state, &server, "job-d1").await;
    let job2 = create_job(state, &server, "job-d2").await;
    let d1 = create_dependency(state, "D1", Some(&job1), Some("ARCH=amd64")).await;
    let d2 = create_dependency(state, "D2", Some(&job2), None).await;

    Graph {
        server,
        job1,
        job2,
        d1,
        d2,
    }
}

pub fn notification(
    job: &MJob,
    number: i64,
    phase: &str,
    status: Option<&str>,
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
            locations.insert(
                "archive".to_string(),
                format!("http://jenkins.example.com/job/{}/{}/artifact/{}", job.name, number, path),
            );
            (path.to_string(), locations)
        })
        .collect();

    BuildNotification {
        name: job.name.clone(),
        build: NotifiedBuild {
            number,
            phase: phase.to_string(),
            status: status.map(str::to_string),
            url: Some(format!("job/{}/{}/", job.name, number)),
            duration: None,
            parameters,
            artifacts,
        },
    }
}

pub async fn notify(state: &ServerState, server: &MBuildServer, notification: BuildNotification) -> MBuild {
    record_build_notification(state, server, notification)
        .await
        .unwrap()
}

pub async fn finalized_build(
    state: &ServerState,
    server: &MBuildServer,
    job: &MJob,
    number: i64,
    build_id: Option<&str>,
) -> MBuild {
    notify(
        state,
        server,
        notification(job, number, "FINALIZED", Some("SUCCESS"), build_id, &["out/image.iso"]),
    )
    .await
}

pub async fn reload_project_build(state: &ServerState, project_build: &MProjectBuild) -> MProjectBuild {
    EProjectBuild::find_by_id(project_build.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap()
}
