/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase shared by builds and project builds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter, Deserialize, Serialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum BuildPhase {
    #[sea_orm(num_value = 0)]
    Unknown,
    #[sea_orm(num_value = 1)]
    Started,
    #[sea_orm(num_value = 2)]
    Completed,
    #[sea_orm(num_value = 3)]
    Finalized,
}

impl BuildPhase {
    pub fn is_terminal(&self) -> bool {
        *self == BuildPhase::Finalized
    }
}

impl std::str::FromStr for BuildPhase {
    type Err = String;

    /// Build servers used to report `FINISHED` for what is now `FINALIZED`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(BuildPhase::Unknown),
            "STARTED" => Ok(BuildPhase::Started),
            "COMPLETED" => Ok(BuildPhase::Completed),
            "FINALIZED" | "FINISHED" => Ok(BuildPhase::Finalized),
            _ => Err(format!("Unknown build phase: {}", s)),
        }
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            BuildPhase::Unknown => "UNKNOWN",
            BuildPhase::Started => "STARTED",
            BuildPhase::Completed => "COMPLETED",
            BuildPhase::Finalized => "FINALIZED",
        };

        f.write_str(phase)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "build")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job: Uuid,
    pub number: i64,
    /// Correlation tag of the project build that requested this build, empty when untracked.
    pub build_id: String,
    pub phase: BuildPhase,
    pub status: String,
    pub url: String,
    pub duration: Option<i64>,
    pub requested_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::Job",
        to = "super::job::Column::Id"
    )]
    Job,
}

impl ActiveModelBehavior for ActiveModel {}
