/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Moving artifact bytes into an archive.
//!
//! A transport is started before use and ended afterwards, also when an
//! operation in between failed. Relative paths are rooted at the archive
//! base directory, a leading `/` is stripped.

pub mod local;
pub mod ssh;

use entity::archive::ArchiveTransport;
use gantry_core::types::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub use local::LocalTransport;
pub use ssh::SshTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Fetching {url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("SSH error: {0}")]
    Ssh(String),
    #[error("Size mismatch for {path}: streamed {streamed} bytes, stored {stored}")]
    SizeMismatch {
        path: String,
        streamed: u64,
        stored: u64,
    },
    #[error("Command `{command}` exited with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Transport was not started")]
    NotStarted,
    #[error("Archive is misconfigured: {0}")]
    Config(String),
}

impl TransportError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TransportError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub fn get_relative_filename(basedir: &str, filename: &str) -> PathBuf {
    Path::new(basedir).join(filename.trim_start_matches('/'))
}

pub fn check_size(path: &Path, streamed: u64, stored: u64) -> Result<(), TransportError> {
    if streamed != stored {
        return Err(TransportError::SizeMismatch {
            path: path.display().to_string(),
            streamed,
            stored,
        });
    }

    Ok(())
}

/// Starts a download with basic authentication.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    username: &str,
    password: &str,
) -> Result<reqwest::Response, TransportError> {
    info!(url = %url, "Fetching artifact");

    let response = client
        .get(url)
        .basic_auth(username, Some(password))
        .send()
        .await
        .map_err(http_error(url))?;

    if !response.status().is_success() {
        return Err(TransportError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    Ok(response)
}

pub fn http_error(url: &str) -> impl FnOnce(reqwest::Error) -> TransportError + '_ {
    move |source| TransportError::Http {
        url: url.to_string(),
        source,
    }
}

pub enum Transport {
    Local(LocalTransport),
    Ssh(SshTransport),
}

/// Credentials of the key pair an ssh archive logs in with.
#[derive(Clone)]
pub struct SshCredentials {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshCredentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

impl Transport {
    pub fn for_archive(
        archive: &MArchive,
        credentials: Option<SshCredentials>,
    ) -> Result<Self, TransportError> {
        match archive.transport {
            ArchiveTransport::Local => Ok(Transport::Local(LocalTransport::new(&archive.basedir))),
            ArchiveTransport::Ssh => {
                let host = archive
                    .host
                    .clone()
                    .ok_or_else(|| TransportError::Config(format!("{} has no host", archive.name)))?;
                let username = archive.username.clone().ok_or_else(|| {
                    TransportError::Config(format!("{} has no username", archive.name))
                })?;
                let credentials = credentials.ok_or_else(|| {
                    TransportError::Config(format!("{} has no ssh credentials", archive.name))
                })?;

                Ok(Transport::Ssh(SshTransport::new(
                    host,
                    archive.port,
                    username,
                    &archive.basedir,
                    credentials,
                )))
            }
        }
    }

    pub async fn start(&mut self) -> Result<(), TransportError> {
        match self {
            Transport::Local(t) => t.start().await,
            Transport::Ssh(t) => t.start().await,
        }
    }

    pub async fn end(&mut self) {
        match self {
            Transport::Local(t) => t.end().await,
            Transport::Ssh(t) => t.end().await,
        }
    }

    /// Streams `url` to `destination` and returns the number of bytes written.
    pub async fn archive_url(
        &mut self,
        url: &str,
        destination: &str,
        username: &str,
        password: &str,
    ) -> Result<u64, TransportError> {
        match self {
            Transport::Local(t) => t.archive_url(url, destination, username, password).await,
            Transport::Ssh(t) => t.archive_url(url, destination, username, password).await,
        }
    }

    /// Hard links `source` to `destination` unless `destination` already exists.
    pub async fn link_filename_to_filename(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<(), TransportError> {
        match self {
            Transport::Local(t) => t.link_filename_to_filename(source, destination).await,
            Transport::Ssh(t) => t.link_filename_to_filename(source, destination).await,
        }
    }

    /// Appends the checksum of an archived item to the manifest in its directory.
    pub async fn generate_checksums(&mut self, item: &MArchiveArtifact) -> Result<(), TransportError> {
        match self {
            Transport::Local(t) => t.generate_checksums(&item.archived_path).await,
            Transport::Ssh(t) => t.generate_checksums(&item.archived_path).await,
        }
    }
}

/// Directory and file name of an archived path.
pub fn split_archived_path(path: &Path) -> Result<(PathBuf, String), TransportError> {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .ok_or_else(|| TransportError::Config(format!("{} has no file name", path.display())))?;
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((directory, filename))
}
