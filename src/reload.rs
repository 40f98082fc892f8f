use crate::config::Config;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Hook that makes the DHCP daemon pick up a newly written file.
#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn reload(&self) -> Result<()>;
}

/// Controller driving the daemon through external commands.
///
/// The optional check command validates the daemon configuration first; a
/// failing check stops the reload so a broken file never reaches the daemon.
#[derive(Debug, Clone)]
pub struct CommandController {
    check: Vec<String>,
    reload: Vec<String>,
}

impl CommandController {
    #[must_use]
    pub fn new(check: Vec<String>, reload: Vec<String>) -> Self {
        Self { check, reload }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.check_command.clone(), config.reload_command.clone())
    }
}

#[async_trait]
impl ServiceController for CommandController {
    async fn reload(&self) -> Result<()> {
        if self.check.is_empty() {
            debug!("No configuration check command set, skipping check");
        } else {
            run_command(&self.check).await?;
            debug!("DHCP configuration check passed");
        }

        run_command(&self.reload).await?;
        info!(command = %self.reload.join(" "), "DHCP service reloaded");
        Ok(())
    }
}

/// Run `argv` to completion, turning a spawn failure or non-zero exit into an error.
async fn run_command(argv: &[String]) -> Result<()> {
    let command_line = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(SyncError::Command {
            command: command_line,
            code: None,
            detail: "empty command".to_string(),
        });
    };

    debug!(command = %command_line, "Running service command");
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SyncError::Command {
            command: command_line.clone(),
            code: None,
            detail: e.to_string(),
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(SyncError::Command {
        command: command_line,
        code: output.status.code(),
        detail: if stderr.is_empty() {
            "No error message available".to_string()
        } else {
            stderr
        },
    })
}
