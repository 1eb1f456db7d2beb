/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result, bail};
use async_ssh2_lite::{AsyncSession, TokioTcpStream};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::input;

pub type SshSession = AsyncSession<TokioTcpStream>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

pub async fn connect(
    host: &str,
    port: i32,
    username: &str,
    public_key: String,
    private_key: String,
) -> Result<SshSession> {
    let server_addr = input::url_to_addr(host, port)
        .map_err(|e| anyhow::anyhow!("Failed to resolve {}:{}: {}", host, port, e))?;
    let mut session = AsyncSession::<TokioTcpStream>::connect(server_addr, None)
        .await
        .with_context(|| format!("Failed to connect to {}", server_addr))?;

    init_session(&mut session, username, public_key, private_key).await?;

    Ok(session)
}

pub async fn init_session(
    session: &mut SshSession,
    username: &str,
    public_key: String,
    private_key: String,
) -> Result<()> {
    session.handshake().await.context("SSH handshake failed")?;

    session
        .userauth_pubkey_memory(
            username,
            Some(public_key.as_str()),
            private_key.as_str(),
            None,
        )
        .await
        .with_context(|| format!("SSH authentication failed for {}", username))?;

    if !session.authenticated() {
        bail!("SSH session for {} is not authenticated", username);
    }

    Ok(())
}

/// Runs `command` on the remote host and collects its output and exit status.
pub async fn execute(session: &SshSession, command: &str) -> Result<CommandOutput> {
    debug!(command = %command, "Executing remote command");

    let mut channel = session
        .channel_session()
        .await
        .context("Failed to open SSH channel")?;
    channel
        .exec(command)
        .await
        .with_context(|| format!("Failed to execute `{}`", command))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .await
        .context("Failed to read command output")?;

    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .await
        .context("Failed to read command error output")?;

    channel
        .wait_close()
        .await
        .context("Failed to close SSH channel")?;
    let exit_status = channel
        .exit_status()
        .context("Failed to read command exit status")?;

    Ok(CommandOutput {
        exit_status,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        let output = CommandOutput {
            exit_status: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(output.success());

        let output = CommandOutput {
            exit_status: 1,
            stdout: String::new(),
            stderr: "ln: failed".to_string(),
        };
        assert!(!output.success());
    }
}
