/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_ssh2_lite::{AsyncSftp, TokioTcpStream};
use futures::io::{AsyncWrite, AsyncWriteExt};
use gantry_core::consts::CHECKSUM_FILE;
use gantry_core::executer::{SshSession, connect, execute};
use shell_quote::{QuoteRefExt, Sh};
use std::path::Path;
use tracing::{debug, info};

use super::{
    SshCredentials, TransportError, check_size, fetch, get_relative_filename, http_error,
    split_archived_path,
};

pub fn quote(s: &str) -> String {
    let quoted: Vec<u8> = s.quoted(Sh);
    String::from_utf8_lossy(&quoted).into_owned()
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

pub fn mkdir_command(directory: &Path) -> String {
    format!("mkdir -p {}", quote_path(directory))
}

pub fn link_command(source: &Path, destination: &Path) -> String {
    let directory = destination.parent().unwrap_or_else(|| Path::new("."));

    format!(
        "{} && if [ ! -e {} ]; then ln {} {}; fi",
        mkdir_command(directory),
        quote_path(destination),
        quote_path(source),
        quote_path(destination)
    )
}

pub fn checksum_command(directory: &Path, filename: &str) -> String {
    format!(
        "cd {} && sha256sum -- {} >> {}",
        quote_path(directory),
        quote(filename),
        CHECKSUM_FILE
    )
}

/// Streams a download into an sftp file and returns the number of bytes written.
pub async fn write_response<W: AsyncWrite + Unpin>(
    response: &mut reqwest::Response,
    url: &str,
    path: &Path,
    file: &mut W,
) -> Result<u64, TransportError> {
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(http_error(url))? {
        file.write_all(&chunk)
            .await
            .map_err(|e| TransportError::io(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| TransportError::io(path, e))?;

    Ok(written)
}

/// Archive on a remote host, written over SFTP.
pub struct SshTransport {
    host: String,
    port: i32,
    username: String,
    basedir: String,
    credentials: SshCredentials,
    client: reqwest::Client,
    session: Option<SshSession>,
    sftp: Option<AsyncSftp<TokioTcpStream>>,
}

impl SshTransport {
    pub fn new(
        host: String,
        port: i32,
        username: String,
        basedir: &str,
        credentials: SshCredentials,
    ) -> Self {
        Self {
            host,
            port,
            username,
            basedir: basedir.to_string(),
            credentials,
            client: reqwest::Client::new(),
            session: None,
            sftp: None,
        }
    }

    pub async fn start(&mut self) -> Result<(), TransportError> {
        let session = connect(
            &self.host,
            self.port,
            &self.username,
            self.credentials.public_key.clone(),
            self.credentials.private_key.clone(),
        )
        .await
        .map_err(|e| TransportError::Ssh(format!("{:#}", e)))?;

        let sftp = session
            .sftp()
            .await
            .map_err(|e| TransportError::Ssh(format!("Failed to open SFTP channel: {}", e)))?;

        debug!(host = %self.host, port = self.port, "Opened SSH session");
        self.session = Some(session);
        self.sftp = Some(sftp);
        Ok(())
    }

    pub async fn end(&mut self) {
        self.sftp = None;

        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "archive finished", None).await {
                debug!(host = %self.host, error = %e, "Failed to disconnect SSH session");
            }
        }
    }

    async fn run_command(&self, command: &str) -> Result<String, TransportError> {
        let session = self.session.as_ref().ok_or(TransportError::NotStarted)?;
        let output = execute(session, command)
            .await
            .map_err(|e| TransportError::Ssh(format!("{:#}", e)))?;

        if !output.success() {
            return Err(TransportError::Command {
                command: command.to_string(),
                status: output.exit_status,
                stderr: output.stderr,
            });
        }

        Ok(output.stdout)
    }

    pub async fn archive_url(
        &mut self,
        url: &str,
        destination: &str,
        username: &str,
        password: &str,
    ) -> Result<u64, TransportError> {
        let path = get_relative_filename(&self.basedir, destination);
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        self.run_command(&mkdir_command(directory)).await?;

        let sftp = self.sftp.as_ref().ok_or(TransportError::NotStarted)?;
        let mut response = fetch(&self.client, url, username, password).await?;
        let mut file = sftp
            .create(&path)
            .await
            .map_err(|e| TransportError::Ssh(format!("Failed to create {}: {}", path.display(), e)))?;
        let written = write_response(&mut response, url, &path, &mut file).await?;
        drop(file);

        let stored = sftp
            .stat(&path)
            .await
            .map_err(|e| TransportError::Ssh(format!("Failed to stat {}: {}", path.display(), e)))?
            .size
            .unwrap_or(0);
        check_size(&path, written, stored)?;

        info!(host = %self.host, path = %path.display(), size = written, "Archived artifact");
        Ok(written)
    }

    pub async fn link_filename_to_filename(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<(), TransportError> {
        let source = get_relative_filename(&self.basedir, source);
        let destination = get_relative_filename(&self.basedir, destination);

        self.run_command(&link_command(&source, &destination)).await?;

        info!(host = %self.host, source = %source.display(), destination = %destination.display(), "Linked artifact");
        Ok(())
    }

    pub async fn generate_checksums(&mut self, archived_path: &str) -> Result<(), TransportError> {
        let path = get_relative_filename(&self.basedir, archived_path);
        let (directory, filename) = split_archived_path(&path)?;

        self.run_command(&checksum_command(&directory, &filename)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_special_characters() {
        assert_ne!(quote("a b"), "a b");
        assert!(quote("a b").contains("a"));
        assert!(!quote("$(rm -rf /)").starts_with('$'));
    }

    #[test]
    fn test_link_command_guards_existing_destination() {
        let source = Path::new("/srv/archive/kernel/2014-03-12-1/a.img");
        let destination = Path::new("/srv/archive/touch/20140312.1/a.img");

        assert_eq!(
            link_command(source, destination),
            format!(
                "mkdir -p {} && if [ ! -e {} ]; then ln {} {}; fi",
                quote("/srv/archive/touch/20140312.1"),
                quote("/srv/archive/touch/20140312.1/a.img"),
                quote("/srv/archive/kernel/2014-03-12-1/a.img"),
                quote("/srv/archive/touch/20140312.1/a.img"),
            )
        );
    }

    #[test]
    fn test_checksum_command_appends_to_manifest() {
        let command = checksum_command(Path::new("/srv/archive/touch/20140312.1"), "a.img");

        assert_eq!(
            command,
            format!(
                "cd {} && sha256sum -- {} >> SHA256SUMS",
                quote("/srv/archive/touch/20140312.1"),
                quote("a.img")
            )
        );
    }

    #[tokio::test]
    async fn test_write_response_into_async_file() {
        let app = axum::Router::new().route("/image.iso", axum::routing::get(|| async { "kernel image" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/image.iso", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let mut response = reqwest::get(&url).await.unwrap();
        let mut file = futures::io::Cursor::new(Vec::new());
        let written = write_response(&mut response, &url, Path::new("a/image.iso"), &mut file)
            .await
            .unwrap();

        assert_eq!(written, 12);
        assert_eq!(file.into_inner(), b"kernel image");
    }

    #[test]
    fn test_commands_quote_spaces() {
        let command = mkdir_command(Path::new("/srv/my archive"));
        assert!(command.starts_with("mkdir -p "));
        assert_ne!(command, "mkdir -p /srv/my archive");
    }
}
