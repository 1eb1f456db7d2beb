/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum TaskKind {
    #[sea_orm(num_value = 0)]
    ProcessBuild,
    #[sea_orm(num_value = 1)]
    BuildJob,
    #[sea_orm(num_value = 2)]
    ProcessBuildArtifacts,
    #[sea_orm(num_value = 3)]
    TransferArtifact,
    #[sea_orm(num_value = 4)]
    LinkArtifact,
    #[sea_orm(num_value = 5)]
    GenerateChecksums,
    #[sea_orm(num_value = 6)]
    ArchiveProjectBuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum TaskStatus {
    #[sea_orm(num_value = 0)]
    Queued,
    #[sea_orm(num_value = 1)]
    Running,
    #[sea_orm(num_value = 2)]
    Completed,
    #[sea_orm(num_value = 3)]
    Failed,
}

/// A unit of asynchronous work, delivered at least once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "task")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: TaskKind,
    pub payload: Json,
    pub status: TaskStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Task that has to complete before this one may run.
    pub depends_on: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub run_after: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::DependsOn",
        to = "Column::Id"
    )]
    DependsOn,
}

impl ActiveModelBehavior for ActiveModel {}
