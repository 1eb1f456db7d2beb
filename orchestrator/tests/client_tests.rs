/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

mod common;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::Router;
use common::*;
use orchestrator::client::{HttpBuildServerClient, build_job};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Request {
    job: String,
    authorization: Option<String>,
    parameters: BTreeMap<String, String>,
}

type Requests = Arc<Mutex<Vec<Request>>>;

async fn build_with_parameters(
    State(requests): State<Requests>,
    Path(job): Path<String>,
    headers: HeaderMap,
    Form(parameters): Form<BTreeMap<String, String>>,
) -> StatusCode {
    if job == "broken" {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    requests.lock().unwrap().push(Request {
        job,
        authorization,
        parameters,
    });

    StatusCode::CREATED
}

async fn spawn_build_server() -> (String, Requests) {
    let requests: Requests = Arc::new(Mutex::new(vec![]));
    let app = Router::new()
        .route("/job/{job}/buildWithParameters", post(build_with_parameters))
        .with_state(Arc::clone(&requests));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", address), requests)
}

#[tokio::test]
async fn test_build_job_posts_parameters_with_basic_auth() {
    let state = test_state().await;
    let (url, requests) = spawn_build_server().await;
    let server = create_server(&state, &url).await;
    let job = create_job(&state, &server, "kernel").await;
    let client = HttpBuildServerClient::new().unwrap();

    let mut parameters = BTreeMap::new();
    parameters.insert("ARCH".to_string(), "arm64".to_string());

    build_job(&state, &client, job.id, Some("0123abcd"), parameters, Some("alice"))
        .await
        .unwrap();

    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].job, "kernel");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Basic Z2FudHJ5OnNlY3JldA==")
    );
    assert_eq!(requests[0].parameters.get("ARCH").map(String::as_str), Some("arm64"));
    assert_eq!(requests[0].parameters.get("BUILD_ID").map(String::as_str), Some("0123abcd"));
    assert_eq!(requests[0].parameters.get("REQUESTOR").map(String::as_str), Some("alice"));
}

#[tokio::test]
async fn test_build_job_fails_on_server_error() {
    let state = test_state().await;
    let (url, requests) = spawn_build_server().await;
    let server = create_server(&state, &url).await;
    let job = create_job(&state, &server, "broken").await;
    let client = HttpBuildServerClient::new().unwrap();

    let result = build_job(&state, &client, job.id, None, BTreeMap::new(), None).await;

    assert!(result.is_err());
    assert!(requests.lock().unwrap().is_empty());
}
