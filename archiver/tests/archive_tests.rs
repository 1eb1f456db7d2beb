/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

mod common;

use archiver::archive::{
    ArchiveError, add_build, get_archived_artifacts_for_build, get_default_archive,
    set_default_archive,
};
use common::*;
use entity::archive::ArchivePolicy;
use gantry_core::types::*;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn test_add_build_orders_placements() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let url = "http://jenkins.example.com";
    let fixture = create_fixture(&state, url).await;
    let archive = create_archive(&state, "cdimage", dir.path(), ArchivePolicy::Structured, true).await;
    let (project_build, build) =
        finished_project_build(&state, url, &fixture, &["out/image.iso", "out/boot.img"]).await;

    let placements = add_build(&state.db, &archive, &build).await.unwrap();
    let timestamp = build.created_at.and_utc();
    let folder = format!("{}-{}", timestamp.format("%Y-%m-%d"), timestamp.timestamp());

    assert_eq!(placements.len(), 2);
    assert_eq!(placements[0].artifact.filename, "boot.img");
    assert_eq!(placements[1].artifact.filename, "image.iso");

    let paths = placements[1]
        .placements
        .iter()
        .map(|p| p.archived_path.clone())
        .collect::<Vec<String>>();
    assert_eq!(
        paths,
        vec![
            format!("kernel-tools/{}/image.iso", folder),
            format!("linux-kernel/{}/image.iso", folder),
            format!("ubuntu-touch/{}/image.iso", project_build.build_id),
        ]
    );

    let image = &placements[1].placements;
    assert_eq!(image[0].dependency, Some(fixture.tools.id));
    assert_eq!(image[1].dependency, Some(fixture.kernel.id));
    assert!(image[0].project_build_dependency.is_none());
    assert!(image[2].project_build_dependency.is_some());
    assert!(image.iter().all(|p| !p.is_archived() && p.build == Some(build.id)));
}

#[tokio::test]
async fn test_add_build_is_idempotent() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let url = "http://jenkins.example.com";
    let fixture = create_fixture(&state, url).await;
    let archive = create_archive(&state, "cdimage", dir.path(), ArchivePolicy::Structured, true).await;
    let (_, build) = finished_project_build(&state, url, &fixture, &["out/image.iso"]).await;

    let first = add_build(&state.db, &archive, &build).await.unwrap();
    let second = add_build(&state.db, &archive, &build).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(EArchiveArtifact::find().count(&state.db).await.unwrap(), 3);

    let archived = get_archived_artifacts_for_build(&state.db, &archive, &build)
        .await
        .unwrap();
    let mut paths = first[0]
        .placements
        .iter()
        .map(|p| p.archived_path.clone())
        .collect::<Vec<String>>();
    paths.sort();

    assert_eq!(
        archived.into_iter().map(|p| p.archived_path).collect::<Vec<String>>(),
        paths
    );
}

#[tokio::test]
async fn test_default_policy_project_placement_shares_bare_path() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let url = "http://jenkins.example.com";
    let fixture = create_fixture(&state, url).await;
    let archive = create_archive(&state, "plain", dir.path(), ArchivePolicy::Default, true).await;
    let (_, build) = finished_project_build(&state, url, &fixture, &["out/image.iso"]).await;

    let placements = add_build(&state.db, &archive, &build).await.unwrap();
    let image = &placements[0].placements;

    assert_eq!(image.len(), 3);
    assert!(image[..2].iter().all(|p| p.project_build_dependency.is_none()));
    assert!(image[2].project_build_dependency.is_some());
    assert_eq!(image[2].dependency, Some(fixture.kernel.id));
    assert_eq!(image[2].archived_path, image[1].archived_path);

    assert_eq!(add_build(&state.db, &archive, &build).await.unwrap(), placements);
    assert_eq!(EArchiveArtifact::find().count(&state.db).await.unwrap(), 3);
}

#[tokio::test]
async fn test_later_build_never_takes_over_placements() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let url = "http://jenkins.example.com";
    let fixture = create_fixture(&state, url).await;
    let archive = create_archive(&state, "plain", dir.path(), ArchivePolicy::Default, true).await;
    let (_, first) = finished_project_build(&state, url, &fixture, &["out/image.iso"]).await;
    let second = untracked_build(&state, url, &fixture, 2, &["out/image.iso"]).await;
    let second = set_created_at(&state, &second, first.created_at).await;

    let placements = add_build(&state.db, &archive, &first).await.unwrap();
    let error = add_build(&state.db, &archive, &second).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ArchiveError>(),
        Some(ArchiveError::PathTaken { artifact, .. }) if *artifact == placements[0].artifact.id
    ));
    assert_eq!(
        EArchiveArtifact::find()
            .filter(CArchiveArtifact::Build.eq(second.id))
            .count(&state.db)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_each_build_owns_its_placements() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let url = "http://jenkins.example.com";
    let fixture = create_fixture(&state, url).await;
    let archive = create_archive(&state, "plain", dir.path(), ArchivePolicy::Default, true).await;
    let (_, first) = finished_project_build(&state, url, &fixture, &["out/image.iso"]).await;
    let second = untracked_build(&state, url, &fixture, 2, &["out/image.iso"]).await;
    let second = set_created_at(&state, &second, first.created_at + chrono::Duration::seconds(1)).await;

    let first = add_build(&state.db, &archive, &first).await.unwrap();
    let second = add_build(&state.db, &archive, &second).await.unwrap();

    assert_ne!(first[0].artifact.id, second[0].artifact.id);
    assert_eq!(second[0].placements.len(), 2);
    assert!(second[0].placements.iter().all(|p| p.artifact == second[0].artifact.id));
    assert!(
        second[0]
            .placements
            .iter()
            .all(|p| first[0].placements.iter().all(|f| f.archived_path != p.archived_path))
    );
    assert_eq!(EArchiveArtifact::find().count(&state.db).await.unwrap(), 5);
}

#[tokio::test]
async fn test_build_without_artifacts() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let url = "http://jenkins.example.com";
    let fixture = create_fixture(&state, url).await;
    let archive = create_archive(&state, "cdimage", dir.path(), ArchivePolicy::Structured, true).await;
    let (_, build) = finished_project_build(&state, url, &fixture, &[]).await;

    assert!(add_build(&state.db, &archive, &build).await.unwrap().is_empty());
    assert_eq!(EArchiveArtifact::find().count(&state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_set_default_archive_keeps_one_default() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let first = create_archive(&state, "first", dir.path(), ArchivePolicy::Default, true).await;
    let second = create_archive(&state, "second", dir.path(), ArchivePolicy::Structured, false).await;

    assert_eq!(get_default_archive(&state.db).await.unwrap().unwrap().id, first.id);

    let archive = set_default_archive(&state.db, "second").await.unwrap();
    assert_eq!(archive.id, second.id);
    assert!(archive.is_default);

    let defaults = EArchive::find()
        .all(&state.db)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.is_default)
        .collect::<Vec<MArchive>>();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);
}

#[tokio::test]
async fn test_set_unknown_default_archive() {
    let state = test_state().await;
    let dir = tempfile::tempdir().unwrap();
    let first = create_archive(&state, "first", dir.path(), ArchivePolicy::Default, true).await;

    let error = set_default_archive(&state.db, "missing").await.unwrap_err();
    assert!(matches!(
        error.downcast_ref::<ArchiveError>(),
        Some(ArchiveError::UnknownArchive(name)) if name == "missing"
    ));

    assert_eq!(get_default_archive(&state.db).await.unwrap().unwrap().id, first.id);
}
