/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use gantry_core::consts::CHECKSUM_FILE;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{
    TransportError, check_size, fetch, get_relative_filename, http_error, split_archived_path,
};

/// Archive on a filesystem mounted on this host.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    basedir: String,
    client: reqwest::Client,
}

async fn create_parent(path: &Path) -> Result<(), TransportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| TransportError::io(parent, e))?;
    }

    Ok(())
}

impl LocalTransport {
    pub fn new(basedir: &str) -> Self {
        Self {
            basedir: basedir.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn start(&mut self) -> Result<(), TransportError> {
        let basedir = Path::new(&self.basedir);

        fs::create_dir_all(basedir)
            .await
            .map_err(|e| TransportError::io(basedir, e))
    }

    pub async fn end(&mut self) {}

    pub async fn archive_url(
        &mut self,
        url: &str,
        destination: &str,
        username: &str,
        password: &str,
    ) -> Result<u64, TransportError> {
        let path = get_relative_filename(&self.basedir, destination);
        create_parent(&path).await?;

        let mut response = fetch(&self.client, url, username, password).await?;
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| TransportError::io(&path, e))?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(http_error(url))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| TransportError::io(&path, e))?;
            written += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| TransportError::io(&path, e))?;

        let stored = fs::metadata(&path)
            .await
            .map_err(|e| TransportError::io(&path, e))?
            .len();
        check_size(&path, written, stored)?;

        info!(path = %path.display(), size = written, "Archived artifact");
        Ok(written)
    }

    pub async fn link_filename_to_filename(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<(), TransportError> {
        let source = get_relative_filename(&self.basedir, source);
        let destination = get_relative_filename(&self.basedir, destination);

        if fs::try_exists(&destination)
            .await
            .map_err(|e| TransportError::io(&destination, e))?
        {
            debug!(path = %destination.display(), "Link destination exists");
            return Ok(());
        }

        create_parent(&destination).await?;
        fs::hard_link(&source, &destination)
            .await
            .map_err(|e| TransportError::io(&destination, e))?;

        info!(source = %source.display(), destination = %destination.display(), "Linked artifact");
        Ok(())
    }

    pub async fn generate_checksums(&mut self, archived_path: &str) -> Result<(), TransportError> {
        let path = get_relative_filename(&self.basedir, archived_path);
        let (directory, filename) = split_archived_path(&path)?;

        let output = Command::new("sha256sum")
            .arg("--")
            .arg(&filename)
            .current_dir(&directory)
            .output()
            .await
            .map_err(|e| TransportError::io(&directory, e))?;

        if !output.status.success() {
            return Err(TransportError::Command {
                command: format!("sha256sum -- {}", filename),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let manifest = directory.join(CHECKSUM_FILE);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&manifest)
            .await
            .map_err(|e| TransportError::io(&manifest, e))?;
        file.write_all(&output.stdout)
            .await
            .map_err(|e| TransportError::io(&manifest, e))?;
        file.flush()
            .await
            .map_err(|e| TransportError::io(&manifest, e))?;

        debug!(manifest = %manifest.display(), filename = %filename, "Appended checksum");
        Ok(())
    }
}
