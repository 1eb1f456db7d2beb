/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for build entity

use chrono::NaiveDate;
use entity::*;
use sea_orm::{DatabaseBackend, MockDatabase, entity::prelude::*};
use uuid::Uuid;

#[tokio::test]
async fn test_build_entity_with_phase() -> Result<(), DbErr> {
    let build_id = Uuid::new_v4();
    let job_id = Uuid::new_v4();
    let naive_date = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![build::Model {
            id: build_id,
            job: job_id,
            number: 42,
            build_id: "0f3c1e6b2a5d4c7e9f8a1b2c3d4e5f60".to_owned(),
            phase: build::BuildPhase::Finalized,
            status: "SUCCESS".to_owned(),
            url: "http://jenkins.example.com/job/kernel/42/".to_owned(),
            duration: Some(1200),
            requested_by: Some("admin".to_owned()),
            created_at: naive_date,
            updated_at: naive_date,
        }]])
        .into_connection();

    let result = build::Entity::find_by_id(build_id).one(&db).await?;

    assert!(result.is_some());
    let build = result.unwrap();
    assert_eq!(build.number, 42);
    assert_eq!(build.phase, build::BuildPhase::Finalized);
    assert_eq!(build.status, "SUCCESS");
    assert_eq!(build.job, job_id);

    Ok(())
}

#[tokio::test]
async fn test_artifacts_of_build() -> Result<(), DbErr> {
    let build_id = Uuid::new_v4();
    let naive_date = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![
            artifact::Model {
                id: Uuid::new_v4(),
                build: build_id,
                filename: "root.img".to_owned(),
                url: "http://jenkins.example.com/job/kernel/42/artifact/root.img".to_owned(),
                created_at: naive_date,
            },
            artifact::Model {
                id: Uuid::new_v4(),
                build: build_id,
                filename: "kernel.tar.gz".to_owned(),
                url: "http://jenkins.example.com/job/kernel/42/artifact/kernel.tar.gz"
                    .to_owned(),
                created_at: naive_date,
            },
        ]])
        .into_connection();

    let artifacts = artifact::Entity::find()
        .filter(artifact::Column::Build.eq(build_id))
        .all(&db)
        .await?;

    assert_eq!(artifacts.len(), 2);
    assert!(artifacts.iter().all(|a| a.build == build_id));

    Ok(())
}
