/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Naming of archived artifacts, relative to the archive base directory.

use entity::archive::ArchivePolicy;
use gantry_core::input::slugify;
use gantry_core::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// `{dependency}/{date}-{timestamp}/{filename}`
    Default,
    /// `{project}/{project build id}/{filename}`, like cdimage trees.
    Structured,
}

impl From<ArchivePolicy> for Policy {
    fn from(policy: ArchivePolicy) -> Self {
        match policy {
            ArchivePolicy::Default => Policy::Default,
            ArchivePolicy::Structured => Policy::Structured,
        }
    }
}

impl Policy {
    pub fn get_path(
        &self,
        artifact: &MArtifact,
        build: &MBuild,
        dependency: &MDependency,
        project_build: Option<(&MProjectBuild, &MProject)>,
    ) -> String {
        match (self, project_build) {
            (Policy::Structured, Some((project_build, project))) => format!(
                "{}/{}/{}",
                slugify(&project.name),
                project_build.build_id,
                artifact.filename
            ),
            _ => default_path(artifact, build, dependency),
        }
    }
}

fn default_path(artifact: &MArtifact, build: &MBuild, dependency: &MDependency) -> String {
    let created_at = build.created_at.and_utc();

    format!(
        "{}/{}-{}/{}",
        slugify(&dependency.name),
        created_at.format("%Y-%m-%d"),
        created_at.timestamp(),
        artifact.filename
    )
}
