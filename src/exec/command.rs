// src/exec/command.rs

//! Shell-command creation backend.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::CreationError;
use crate::source::ResourceDefinition;

use super::backend::{CreateFuture, CreateResource};

/// Creates a resource by running its `cmd` with `sh -c` (`cmd /C` on
/// Windows). Exit status 0 means the resource is created.
///
/// The child sees the resource's `env` plus `KUBEDAG_RESOURCE`,
/// `KUBEDAG_KIND` and `KUBEDAG_NAME`. Resources without a `cmd` are treated
/// as created immediately.
#[derive(Debug, Clone, Default)]
pub struct ShellCreator;

impl ShellCreator {
    pub fn new() -> Self {
        Self
    }
}

impl CreateResource for ShellCreator {
    fn create<'a>(&'a self, resource: &'a ResourceDefinition) -> CreateFuture<'a> {
        Box::pin(async move {
            let key = resource.key();
            let Some(cmd) = resource.payload.cmd.as_deref() else {
                debug!(resource = %key, "no cmd configured; nothing to run");
                return Ok(());
            };

            match run_command(resource, cmd).await {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    Err(CreationError::new(key, format!("`{cmd}` exited unsuccessfully"))
                        .with_exit_code(code))
                }
                Err(err) => Err(CreationError::new(key, format!("{err:#}"))),
            }
        })
    }
}

async fn run_command(resource: &ResourceDefinition, cmd: &str) -> Result<ExitStatus> {
    let key = resource.key();
    info!(resource = %key, cmd = %cmd, "starting creation command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .envs(&resource.payload.env)
        .env("KUBEDAG_RESOURCE", &key)
        .env("KUBEDAG_KIND", &resource.kind)
        .env("KUBEDAG_NAME", &resource.name)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning creation command for '{key}'"))?;

    // Always consume both pipes so buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        let key = key.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(resource = %key, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let key = key.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(resource = %key, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for creation command of '{key}'"))?;

    info!(
        resource = %key,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "creation command exited"
    );
    Ok(status)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_creates() {
        let def = ResourceDefinition::new("pod", "ok").with_cmd("test \"$KUBEDAG_NAME\" = ok");
        assert_eq!(ShellCreator.create(&def).await, Ok(()));
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code() {
        let def = ResourceDefinition::new("pod", "bad").with_cmd("exit 7");
        let err = ShellCreator.create(&def).await.unwrap_err();
        assert_eq!(err.key, "pod/bad");
        assert_eq!(err.exit_code, Some(7));
    }

    #[tokio::test]
    async fn resource_env_is_passed_through() {
        let mut def = ResourceDefinition::new("job", "env").with_cmd("test \"$GREETING\" = hi");
        def.payload.env.insert("GREETING".to_string(), "hi".to_string());
        assert!(ShellCreator.create(&def).await.is_ok());
    }

    #[tokio::test]
    async fn missing_cmd_is_a_no_op() {
        let def = ResourceDefinition::new("cm", "empty");
        assert!(ShellCreator.create(&def).await.is_ok());
    }
}
