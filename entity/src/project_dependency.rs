/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The build of a dependency a project currently uses.
///
/// Project X can use build 20 of dependency Y while project Z is still on
/// build 23. With `auto_track` set, `current_build` follows the latest build
/// of the dependency and every new build spawns a fresh project build.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "project_dependency")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project: Uuid,
    pub dependency: Uuid,
    pub auto_track: bool,
    pub current_build: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::dependency::Entity",
        from = "Column::Dependency",
        to = "super::dependency::Column::Id"
    )]
    Dependency,
    #[sea_orm(
        belongs_to = "super::build::Entity",
        from = "Column::CurrentBuild",
        to = "super::build::Column::Id"
    )]
    CurrentBuild,
}

impl ActiveModelBehavior for ActiveModel {}
