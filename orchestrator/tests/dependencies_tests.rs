/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

mod common;

use common::*;
use entity::build::BuildPhase;
use gantry_core::types::*;
use orchestrator::dependencies::*;
use orchestrator::projects::{build_project, can_be_archived};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

async fn slots(state: &ServerState, project_build: &MProjectBuild) -> Vec<MProjectBuildDependency> {
    EProjectBuildDependency::find()
        .filter(CProjectBuildDependency::ProjectBuild.eq(project_build.id))
        .all(&state.db)
        .await
        .unwrap()
}

async fn project_builds(state: &ServerState, project: &MProject) -> Vec<MProjectBuild> {
    EProjectBuild::find()
        .filter(CProjectBuild::Project.eq(project.id))
        .all(&state.db)
        .await
        .unwrap()
}

async fn project_dependency(state: &ServerState, project: &MProject, dependency: &MDependency) -> MProjectDependency {
    EProjectDependency::find()
        .filter(CProjectDependency::Project.eq(project.id))
        .filter(CProjectDependency::Dependency.eq(dependency.id))
        .one(&state.db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_project_build_finalizes_once_every_dependency_finished() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "P", &[(&graph.d1, true), (&graph.d2, true)]).await;

    let project_build = build_project(&state, &project, Some("alice"), &[], true, false)
        .await
        .unwrap();
    let key = project_build.build_key.clone();

    assert!(slots(&state, &project_build).await.iter().all(|s| s.build.is_none()));

    let b1 = finalized_build(&state, &graph.server, &graph.job1, 1, Some(&key)).await;
    assert_eq!(process_build_dependencies(&state, &b1).await.unwrap(), b1.id);

    let pb = reload_project_build(&state, &project_build).await;
    assert_eq!(pb.phase, BuildPhase::Unknown);
    assert_eq!(pb.status, "UNKNOWN");
    assert!(pb.ended_at.is_none());
    assert!(!can_be_archived(&state.db, &pb).await.unwrap());

    let attached = slots(&state, &project_build).await;
    let d1_slot = attached.iter().find(|s| s.dependency == graph.d1.id).unwrap();
    let d2_slot = attached.iter().find(|s| s.dependency == graph.d2.id).unwrap();
    assert_eq!(d1_slot.build, Some(b1.id));
    assert_eq!(d2_slot.build, None);

    let b2 = finalized_build(&state, &graph.server, &graph.job2, 1, Some(&key)).await;
    process_build_dependencies(&state, &b2).await.unwrap();

    let pb = reload_project_build(&state, &project_build).await;
    assert_eq!(pb.phase, BuildPhase::Finalized);
    assert_eq!(pb.status, "SUCCESS");
    assert!(pb.ended_at.is_some());
    assert!(can_be_archived(&state.db, &pb).await.unwrap());

    // the requested build satisfied the project, no automated build for it
    assert_eq!(project_builds(&state, &project).await.len(), 1);
}

#[tokio::test]
async fn test_disagreeing_status_blocks_status_transition() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "P", &[(&graph.d1, false), (&graph.d2, false)]).await;

    let project_build = build_project(&state, &project, None, &[], false, false)
        .await
        .unwrap();
    let key = project_build.build_key.clone();

    let b1 = notify(
        &state,
        &graph.server,
        notification(&graph.job1, 1, "FINALIZED", Some("SUCCESS"), Some(&key), &[]),
    )
    .await;
    let b2 = notify(
        &state,
        &graph.server,
        notification(&graph.job2, 1, "FINALIZED", Some("FAILURE"), Some(&key), &[]),
    )
    .await;

    process_build_dependencies(&state, &b1).await.unwrap();
    process_build_dependencies(&state, &b2).await.unwrap();

    let pb = reload_project_build(&state, &project_build).await;
    assert_eq!(pb.phase, BuildPhase::Finalized);
    assert_eq!(pb.status, "UNKNOWN");
}

#[tokio::test]
async fn test_status_change_without_phase_change_is_persisted() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "P", &[(&graph.d1, false), (&graph.d2, false)]).await;

    let project_build = build_project(&state, &project, None, &[], false, false)
        .await
        .unwrap();
    let key = project_build.build_key.clone();

    let b1 = notify(
        &state,
        &graph.server,
        notification(&graph.job1, 1, "COMPLETED", Some("SUCCESS"), Some(&key), &[]),
    )
    .await;
    let b2 = notify(
        &state,
        &graph.server,
        notification(&graph.job2, 1, "STARTED", Some("SUCCESS"), Some(&key), &[]),
    )
    .await;

    process_build_dependencies(&state, &b1).await.unwrap();
    process_build_dependencies(&state, &b2).await.unwrap();

    let pb = reload_project_build(&state, &project_build).await;
    assert_eq!(pb.status, "SUCCESS");
    assert_eq!(pb.phase, BuildPhase::Unknown);
    assert!(pb.ended_at.is_none());
}

#[tokio::test]
async fn test_untagged_build_does_not_touch_requested_project_builds() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "P", &[(&graph.d1, false), (&graph.d2, false)]).await;

    let project_build = build_project(&state, &project, None, &[], false, false)
        .await
        .unwrap();

    let build = finalized_build(&state, &graph.server, &graph.job1, 1, None).await;
    assert!(update_projectbuilds(&state.db, &build).await.unwrap().is_none());

    assert!(slots(&state, &project_build).await.iter().all(|s| s.build.is_none()));
}

#[tokio::test]
async fn test_autotrack_pointer_follows_latest_notification() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let tracking = create_project(&state, "tracking", &[(&graph.d1, true)]).await;
    let pinned = create_project(&state, "pinned", &[(&graph.d1, false)]).await;

    let newer = finalized_build(&state, &graph.server, &graph.job1, 2, None).await;
    let older = finalized_build(&state, &graph.server, &graph.job1, 1, None).await;

    update_autotracked_dependencies(&state.db, &newer).await.unwrap();
    assert_eq!(
        project_dependency(&state, &tracking, &graph.d1).await.current_build,
        Some(newer.id)
    );

    // no ordering guard: an older build delivered late rewinds the pointer
    update_autotracked_dependencies(&state.db, &older).await.unwrap();
    assert_eq!(
        project_dependency(&state, &tracking, &graph.d1).await.current_build,
        Some(older.id)
    );

    assert_eq!(project_dependency(&state, &pinned, &graph.d1).await.current_build, None);
}

#[tokio::test]
async fn test_autotracking_creates_automated_project_builds() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "Q", &[(&graph.d1, true), (&graph.d2, true)]).await;

    let b2 = finalized_build(&state, &graph.server, &graph.job2, 1, None).await;
    process_build_dependencies(&state, &b2).await.unwrap();

    let builds = project_builds(&state, &project).await;
    assert_eq!(builds.len(), 1);
    let first = &builds[0];
    assert!(first.automated);
    assert!(first.requested_by.is_none());
    assert_eq!(first.phase, BuildPhase::Unknown);

    let first_slots = slots(&state, first).await;
    assert_eq!(first_slots.len(), 2);
    assert_eq!(
        first_slots.iter().find(|s| s.dependency == graph.d2.id).unwrap().build,
        Some(b2.id)
    );
    assert_eq!(
        first_slots.iter().find(|s| s.dependency == graph.d1.id).unwrap().build,
        None
    );

    let b1 = finalized_build(&state, &graph.server, &graph.job1, 1, None).await;
    process_build_dependencies(&state, &b1).await.unwrap();

    let builds = project_builds(&state, &project).await;
    assert_eq!(builds.len(), 2);
    let second = builds.iter().find(|pb| pb.id != first.id).unwrap();
    assert!(second.automated);
    assert_eq!(second.phase, BuildPhase::Finalized);
    assert_eq!(second.status, "SUCCESS");
    assert!(second.ended_at.is_some());

    let second_slots = slots(&state, second).await;
    assert!(second_slots.iter().any(|s| s.dependency == graph.d1.id && s.build == Some(b1.id)));
    assert!(second_slots.iter().any(|s| s.dependency == graph.d2.id && s.build == Some(b2.id)));

    // processing the same build again only recomputes
    process_build_dependencies(&state, &b1).await.unwrap();
    assert_eq!(project_builds(&state, &project).await.len(), 2);
}

#[tokio::test]
async fn test_automated_project_build_follows_later_notifications() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "Q", &[(&graph.d1, true)]).await;

    let started = notify(
        &state,
        &graph.server,
        notification(&graph.job1, 1, "STARTED", None, None, &[]),
    )
    .await;
    process_build_dependencies(&state, &started).await.unwrap();

    let builds = project_builds(&state, &project).await;
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].phase, BuildPhase::Started);

    let finished = finalized_build(&state, &graph.server, &graph.job1, 1, None).await;
    assert_eq!(finished.id, started.id);
    process_build_dependencies(&state, &finished).await.unwrap();

    let builds = project_builds(&state, &project).await;
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].phase, BuildPhase::Finalized);
    assert_eq!(builds[0].status, "SUCCESS");
}

#[tokio::test]
async fn test_projects_without_auto_track_get_no_automated_builds() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "pinned", &[(&graph.d1, false)]).await;

    let build = finalized_build(&state, &graph.server, &graph.job1, 1, None).await;
    process_build_dependencies(&state, &build).await.unwrap();

    let count = EProjectBuild::find()
        .filter(CProjectBuild::Project.eq(project.id))
        .count(&state.db)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_aggregate_ignores_project_build_with_empty_slot() {
    let state = test_state().await;
    let graph = create_graph(&state).await;
    let project = create_project(&state, "P", &[(&graph.d1, false), (&graph.d2, false)]).await;

    let project_build = build_project(&state, &project, None, &[], false, false)
        .await
        .unwrap();
    let key = project_build.build_key.clone();

    let b1 = finalized_build(&state, &graph.server, &graph.job1, 1, Some(&key)).await;
    process_build_dependencies(&state, &b1).await.unwrap();

    let pb = update_projectbuild_aggregate(&state.db, reload_project_build(&state, &project_build).await)
        .await
        .unwrap();
    assert_eq!(pb.phase, BuildPhase::Unknown);
    assert_eq!(pb.status, "UNKNOWN");
}
