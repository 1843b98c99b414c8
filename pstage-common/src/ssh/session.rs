//! OpenSSH-backed transport.
//!
//! Uses a multiplexed `ssh` master process. File transfer streams through
//! `cat` on the remote side, so the host only needs a POSIX shell (QSH/PASE
//! on IBM i).

use super::{CommandOutput, Connector, KnownHostsPolicy, RemoteTransport};
use crate::errors::{StageError, TimeoutKind};
use crate::types::ConnectionConfig;
use crate::util::mask_sensitive_command;
use openssh::{KnownHosts, Session, SessionBuilder, Stdio};
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::warn;

impl From<KnownHostsPolicy> for KnownHosts {
    fn from(policy: KnownHostsPolicy) -> Self {
        match policy {
            KnownHostsPolicy::Strict => KnownHosts::Strict,
            KnownHostsPolicy::Add => KnownHosts::Add,
        }
    }
}

/// Opens [`SshTransport`] sessions with the system OpenSSH client.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(&self, config: &ConnectionConfig) -> Result<SshTransport, StageError> {
        if config.password.is_some() && config.identity_file.is_none() {
            warn!(
                host = %config.host,
                "password authentication is not available in batch mode; using ssh-agent and default keys"
            );
        }

        let mut builder = SessionBuilder::default();
        builder
            .user(config.user.clone())
            .port(config.port)
            .connect_timeout(config.connect_timeout)
            .known_hosts_check(config.known_hosts.into());
        if let Some(key) = &config.identity_file {
            builder.keyfile(key);
        }

        let session = builder
            .connect(&config.host)
            .await
            .map_err(|e| StageError::connection(&config.host, e))?;

        Ok(SshTransport {
            host: config.host.clone(),
            session: Some(session),
        })
    }
}

/// One authenticated session to the IBM i host.
pub struct SshTransport {
    host: String,
    session: Option<Session>,
}

impl SshTransport {
    fn session(&self) -> Result<&Session, StageError> {
        self.session
            .as_ref()
            .ok_or_else(|| StageError::connection(&self.host, "session closed"))
    }

    async fn output(&self, command: &str) -> Result<std::process::Output, StageError> {
        self.session()?
            .raw_command(command)
            .output()
            .await
            .map_err(|e| StageError::connection(&self.host, e))
    }
}

fn quote(path: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(path))
}

fn stderr_text(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

impl RemoteTransport for SshTransport {
    async fn exec(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, StageError> {
        let output = match tokio::time::timeout(timeout, self.output(command)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(StageError::timeout(
                    TimeoutKind::Command,
                    format!("command `{}`", mask_sensitive_command(command)),
                    timeout,
                ));
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), StageError> {
        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|e| StageError::transfer(local.display().to_string(), e))?;

        let mut child = self
            .session()?
            .raw_command(format!("cat > {}", quote(remote)))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .await
            .map_err(|e| StageError::transfer(remote, e))?;

        let mut stdin = child
            .stdin()
            .take()
            .ok_or_else(|| StageError::transfer(remote, "remote stdin unavailable"))?;
        tokio::io::copy(&mut file, &mut stdin)
            .await
            .map_err(|e| StageError::transfer(remote, e))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| StageError::transfer(remote, e))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| StageError::transfer(remote, e))?;
        if !output.status.success() {
            return Err(StageError::transfer(remote, stderr_text(&output)));
        }
        Ok(())
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<(), StageError> {
        let output = self
            .output(&format!("cat {}", quote(remote)))
            .await
            .map_err(|e| StageError::transfer(remote, e))?;
        if !output.status.success() {
            return Err(StageError::transfer(remote, stderr_text(&output)));
        }
        tokio::fs::write(local, &output.stdout)
            .await
            .map_err(|e| StageError::transfer(local.display().to_string(), e))
    }

    async fn list_dir(&mut self, remote: &str) -> Result<Vec<String>, StageError> {
        let output = self.output(&format!("ls -1 {}", quote(remote))).await?;
        if !output.status.success() {
            return Err(StageError::transfer(remote, stderr_text(&output)));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn is_dir(&mut self, remote: &str) -> Result<bool, StageError> {
        let output = self.output(&format!("test -d {}", quote(remote))).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(StageError::transfer(remote, stderr_text(&output))),
        }
    }

    async fn make_dir(&mut self, remote: &str) -> Result<(), StageError> {
        let output = self.output(&format!("mkdir {}", quote(remote))).await?;
        if !output.status.success() {
            return Err(StageError::transfer(remote, stderr_text(&output)));
        }
        Ok(())
    }

    async fn remove_file(&mut self, remote: &str) -> Result<(), StageError> {
        let output = self.output(&format!("rm -f {}", quote(remote))).await?;
        if !output.status.success() {
            return Err(StageError::transfer(remote, stderr_text(&output)));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StageError> {
        match self.session.take() {
            Some(session) => session
                .close()
                .await
                .map_err(|e| StageError::connection(&self.host, e)),
            None => Ok(()),
        }
    }
}
