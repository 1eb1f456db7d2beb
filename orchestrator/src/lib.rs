/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod client;
pub mod dependencies;
pub mod notifications;
pub mod projects;
pub mod worker;

use anyhow::Result;
use client::{BuildServerClient, HttpBuildServerClient};
use gantry_core::types::ServerState;
use std::sync::Arc;

pub async fn start_orchestrator(state: Arc<ServerState>) -> Result<()> {
    let client: Arc<dyn BuildServerClient> = Arc::new(HttpBuildServerClient::new()?);
    tokio::spawn(worker::orchestrator_loop(Arc::clone(&state), client));
    Ok(())
}
