//! Test helpers: temporary routes, recording sinks and counting runners.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::types::{GuardProgressEvent, ProgressState};
use crate::io::commands::{CommandRequest, CommandRunner, ShellRunner};
use crate::io::config::{CONFIG_FILE, GuardConfig, write_config};
use crate::io::process::CommandOutput;
use crate::io::route::{Route, STORE_DIR};
use crate::progress::ProgressSink;

/// A route directory in a temp dir, removed on drop.
pub struct TestRoute {
    temp: TempDir,
}

impl TestRoute {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir().context("create temp route")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn route(&self) -> Result<Route> {
        Route::open(self.temp.path())
    }

    /// Declare a stone, with an optional guard in TOML.
    pub fn write_stone(&self, name: &str, guard: Option<&str>) -> Result<()> {
        self.write_file(&format!("{name}.stone"), "")?;
        if let Some(guard) = guard {
            self.write_file(&format!("{name}.guard"), guard)?;
        }
        Ok(())
    }

    /// Write a file relative to the route, creating parent directories.
    pub fn write_file(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.temp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_config(&self, config: &GuardConfig) -> Result<()> {
        write_config(&self.temp.path().join(CONFIG_FILE), config)
    }

    /// Sorted filenames currently in the artifact store.
    pub fn store_files(&self) -> Result<Vec<String>> {
        let dir = self.temp.path().join(STORE_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Progress sink that keeps every event.
#[derive(Default)]
pub struct RecordingProgress {
    events: RefCell<Vec<GuardProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<GuardProgressEvent> {
        self.events.borrow().clone()
    }

    /// `(step, state)` pairs rendered as `"review.r1:cached"` etc.
    pub fn transitions(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .map(|event| {
                let state = match event.state() {
                    ProgressState::Cached => "cached",
                    ProgressState::Active => "active",
                    ProgressState::Done => "done",
                };
                format!("{}:{state}", event.step)
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, event: &GuardProgressEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Shell runner that records every command it executes.
#[derive(Default)]
pub struct CountingRunner {
    commands: RefCell<Vec<String>>,
}

impl CountingRunner {
    pub fn count(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl CommandRunner for CountingRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.commands.borrow_mut().push(request.command.clone());
        ShellRunner.run(request)
    }
}
