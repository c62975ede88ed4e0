//! Collaborators shared by the review and judge runners.

use std::path::Path;

use tracing::warn;

use crate::io::commands::{CommandRequest, CommandRunner};
use crate::io::config::GuardConfig;
use crate::io::process::CommandOutput;
use crate::io::route::Route;
use crate::io::store::{ArtifactStore, read_text};
use crate::progress::ProgressSink;

/// Everything a runner needs besides the stone itself.
pub struct GuardContext<'a, R, P> {
    pub route: &'a Route,
    pub config: &'a GuardConfig,
    pub runner: &'a R,
    pub progress: &'a P,
}

impl<'a, R: CommandRunner, P: ProgressSink> GuardContext<'a, R, P> {
    pub fn new(route: &'a Route, config: &'a GuardConfig, runner: &'a R, progress: &'a P) -> Self {
        Self {
            route,
            config,
            runner,
            progress,
        }
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.route)
    }

    /// Route path as substituted for `$route`.
    pub fn route_arg(&self) -> String {
        self.route.root().to_string_lossy().into_owned()
    }

    /// Run a rendered command in the route directory.
    ///
    /// A command that cannot be started is recorded like any other failure.
    pub fn execute(&self, command: String) -> CommandOutput {
        let request = CommandRequest {
            command,
            workdir: self.route.root().to_path_buf(),
            shell: self.config.shell.clone(),
            limits: self.config.limits(),
        };
        match self.runner.run(&request) {
            Ok(output) => output,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(command = %request.command, err = %message, "command failed to start");
                CommandOutput::spawn_failure(message)
            }
        }
    }

    /// Artifact body for a finished command, before the footer is appended.
    ///
    /// Prefers the file the command wrote to `$output`, then stdout, then
    /// stderr. Failures get a trailer naming how the command ended.
    pub fn artifact_body(&self, output_path: &Path, output: &CommandOutput) -> String {
        let written = if output_path.is_file() {
            match read_text(output_path) {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!(
                        path = %output_path.display(),
                        err = %format!("{err:#}"),
                        "ignoring unreadable command output file"
                    );
                    None
                }
            }
        } else {
            None
        };

        let stdout = output.stdout_text();
        let mut used_stderr = false;
        let mut body = match written {
            Some(text) => text,
            None if !stdout.trim().is_empty() => stdout,
            None => {
                used_stderr = true;
                output.stderr_text()
            }
        };
        if output.stdout_truncated > 0 {
            let note = format!("[stdout truncated: {} bytes dropped]", output.stdout_truncated);
            push_line(&mut body, &note);
        }

        if !output.success() {
            push_line(&mut body, "");
            let summary = output.exit_summary(&self.config.limits());
            push_line(&mut body, &format!("command failed: {summary}"));
            let stderr = output.stderr_text();
            if !used_stderr && !stderr.trim().is_empty() {
                push_line(&mut body, "");
                push_line(&mut body, "stderr:");
                push_line(&mut body, "```");
                push_line(&mut body, stderr.trim_end());
                push_line(&mut body, "```");
            }
        }
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        body
    }
}

fn push_line(body: &mut String, line: &str) {
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(line);
    body.push('\n');
}
