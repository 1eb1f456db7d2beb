/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slot a project build reserves for one of its dependencies.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "project_build_dependency")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_build: Uuid,
    pub dependency: Uuid,
    pub build: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    ProjectBuild,
    Dependency,
    Build,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::ProjectBuild => Entity::belongs_to(super::project_build::Entity)
                .from(Column::ProjectBuild)
                .to(super::project_build::Column::Id)
                .into(),
            Self::Dependency => Entity::belongs_to(super::dependency::Entity)
                .from(Column::Dependency)
                .to(super::dependency::Column::Id)
                .into(),
            Self::Build => Entity::belongs_to(super::build::Entity)
                .from(Column::Build)
                .to(super::build::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
