/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placement of one artifact at one path of an archive.
///
/// One row per artifact and destination, a bare dependency folder or a
/// project build slot. Several rows may share an artifact; only the first one
/// is transferred, the others are hard links to it and copy its `archived_size`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "archive_artifact")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub archive: Uuid,
    pub artifact: Uuid,
    pub build: Option<Uuid>,
    pub dependency: Option<Uuid>,
    pub project_build_dependency: Option<Uuid>,
    pub archived_path: String,
    pub archived_at: Option<NaiveDateTime>,
    pub archived_size: i64,
    pub checksummed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Model {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::archive::Entity",
        from = "Column::Archive",
        to = "super::archive::Column::Id"
    )]
    Archive,
    #[sea_orm(
        belongs_to = "super::artifact::Entity",
        from = "Column::Artifact",
        to = "super::artifact::Column::Id"
    )]
    Artifact,
    #[sea_orm(
        belongs_to = "super::build::Entity",
        from = "Column::Build",
        to = "super::build::Column::Id"
    )]
    Build,
    #[sea_orm(
        belongs_to = "super::dependency::Entity",
        from = "Column::Dependency",
        to = "super::dependency::Column::Id"
    )]
    Dependency,
    #[sea_orm(
        belongs_to = "super::project_build_dependency::Entity",
        from = "Column::ProjectBuildDependency",
        to = "super::project_build_dependency::Column::Id"
    )]
    ProjectBuildDependency,
}

impl ActiveModelBehavior for ActiveModel {}
