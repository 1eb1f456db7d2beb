/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod consts;
pub mod database;
pub mod executer;
pub mod input;
pub mod sources;
pub mod state;
pub mod tasks;
pub mod types;

use anyhow::Result;
use database::connect_db;
use state::load_and_apply_state;
use std::sync::Arc;
use tracing::info;
use types::*;

pub async fn init_state(cli: Cli) -> Result<Arc<ServerState>> {
    info!("Starting Gantry Server");

    let db = connect_db(&cli).await?;

    load_and_apply_state(
        &db,
        cli.state_file.as_deref(),
        cli.crypt_secret_file.as_deref(),
    )
    .await?;

    Ok(Arc::new(ServerState { db, cli }))
}
