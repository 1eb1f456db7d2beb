/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum ArchivePolicy {
    #[sea_orm(num_value = 0)]
    Default,
    #[sea_orm(num_value = 1)]
    Structured,
}

impl std::str::FromStr for ArchivePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ArchivePolicy::Default),
            "structured" | "cdimage" => Ok(ArchivePolicy::Structured),
            _ => Err(format!("Unknown archive policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum ArchiveTransport {
    #[sea_orm(num_value = 0)]
    Local,
    #[sea_orm(num_value = 1)]
    Ssh,
}

impl std::str::FromStr for ArchiveTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ArchiveTransport::Local),
            "ssh" => Ok(ArchiveTransport::Ssh),
            _ => Err(format!("Unknown archive transport: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "archive")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub host: Option<String>,
    pub port: i32,
    pub basedir: String,
    pub username: Option<String>,
    pub policy: ArchivePolicy,
    pub transport: ArchiveTransport,
    pub ssh_credentials: Option<Uuid>,
    /// At most one archive is the default; the write path keeps it that way.
    pub is_default: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ssh_key_pair::Entity",
        from = "Column::SshCredentials",
        to = "super::ssh_key_pair::Column::Id"
    )]
    SshCredentials,
}

impl ActiveModelBehavior for ActiveModel {}
