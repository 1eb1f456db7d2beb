/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::build::BuildPhase;

pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// A requested or automatically triggered build across all dependencies of a project.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "project_build")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project: Uuid,
    pub requested_by: Option<String>,
    pub requested_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub status: String,
    pub phase: BuildPhase,
    /// Daily sequence shown to humans, e.g. `20140312.1`.
    pub build_id: String,
    /// Tag passed to the dependency builds as `BUILD_ID`.
    #[sea_orm(unique)]
    pub build_key: String,
    pub archived: Option<NaiveDateTime>,
    pub automated: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl ActiveModelBehavior for ActiveModel {}
