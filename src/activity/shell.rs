//! Shell Command Activity
//!
//! Runs a bash command template once per input. The template may use the
//! `{input}` placeholder, which is replaced with the input's `Display` form.
//! A non-zero exit status is reported as a unit failure carrying the exit
//! code and stderr; stdout (trimmed) is the unit's output.

use std::fmt::Display;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, error};
use tokio::process::Command;

use super::Activity;
use crate::fanout::BoxError;

/// Placeholder substituted with the unit input.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Activity that runs a shell command per input.
#[derive(Debug, Clone)]
pub struct ShellActivity {
    command: String,
    working_dir: Option<PathBuf>,
    dry_run: bool,
}

impl ShellActivity {
    /// Creates an activity for the given command template.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into().trim().to_string(),
            working_dir: None,
            dry_run: false,
        }
    }

    /// Sets the directory commands run in.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// When enabled, commands are rendered and returned but never run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the command template.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Substitutes the placeholder with `input`.
    pub fn render(&self, input: &impl Display) -> String {
        self.command.replace(INPUT_PLACEHOLDER, &input.to_string())
    }
}

#[async_trait]
impl<T> Activity<T, String> for ShellActivity
where
    T: Display + Send + 'static,
{
    fn name(&self) -> &str {
        "shell"
    }

    async fn invoke(&self, input: T) -> Result<String, BoxError> {
        let command_text = self.render(&input);

        if self.dry_run {
            debug!("[DRY RUN] {}", command_text);
            return Ok(command_text);
        }

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(&command_text).kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
            debug!("Executing in directory: {}", dir.display());
        }

        let output = cmd.output().await?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            debug!("Command '{}' completed successfully", command_text);
            Ok(stdout.trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "Command '{}' failed with exit code: {:?}",
                command_text,
                output.status.code()
            );

            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let detail = stderr.trim();
            if detail.is_empty() {
                Err(format!("command exited with status {}", code).into())
            } else {
                Err(format!("command exited with status {}: {}", code, detail).into())
            }
        }
    }
}
