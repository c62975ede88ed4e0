//! Command execution seam for review and judge templates.

use std::path::PathBuf;

use anyhow::Result;

use crate::io::process::{CommandLimits, CommandOutput, run_shell};

/// A rendered command ready to execute.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Command text with placeholders already substituted.
    pub command: String,
    pub workdir: PathBuf,
    /// Program and leading args the command is passed to.
    pub shell: Vec<String>,
    pub limits: CommandLimits,
}

/// Executes guard commands. `Err` means the command could not be run at all;
/// non-zero exits and timeouts are reported through [`CommandOutput`].
pub trait CommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Runs commands through the configured shell.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        run_shell(
            &request.shell,
            &request.command,
            &request.workdir,
            &request.limits,
        )
    }
}
