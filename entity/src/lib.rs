/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod archive;
pub mod archive_artifact;
pub mod artifact;
pub mod build;
pub mod build_server;
pub mod dependency;
pub mod job;
pub mod project;
pub mod project_build;
pub mod project_build_dependency;
pub mod project_dependency;
pub mod ssh_key_pair;
pub mod task;
