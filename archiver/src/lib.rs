/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod archive;
pub mod coordinator;
pub mod policy;
pub mod transport;
pub mod worker;

use gantry_core::types::ServerState;
use std::sync::Arc;

pub async fn start_archiver(state: Arc<ServerState>) {
    tokio::spawn(worker::archiver_loop(Arc::clone(&state)));
}
