//! Route directories and the stones declared in them.
//!
//! A stone `<name>` exists iff `<route>/<name>.stone` exists; its optional gate
//! lives next to it in `<route>/<name>.guard` (TOML).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::keys::validate_stone_name;
use crate::core::types::{Guard, Stone};
use crate::io::config::{CONFIG_FILE, GuardConfig, load_config};

/// Engine-owned artifact directory inside a route.
pub const STORE_DIR: &str = ".route";
const STONE_EXT: &str = "stone";
const GUARD_EXT: &str = "guard";

/// A route directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    root: PathBuf,
}

impl Route {
    /// Open an existing route directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("route directory not found: {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding review, judge, promise and approval artifacts.
    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn load_config(&self) -> Result<GuardConfig> {
        load_config(&self.config_path())
    }

    pub fn stone_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{STONE_EXT}"))
    }

    pub fn guard_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{GUARD_EXT}"))
    }

    /// Load a stone and its guard; a missing stone is an input error.
    pub fn load_stone(&self, name: &str) -> Result<Stone> {
        validate_stone_name(name)?;
        let path = self.stone_path(name);
        if !path.is_file() {
            bail!(
                "stone not found: {name} (expected {})",
                path.display()
            );
        }
        let guard_path = self.guard_path(name);
        let guard = if guard_path.is_file() {
            Some(load_guard(&guard_path)?)
        } else {
            None
        };
        debug!(stone = name, has_guard = guard.is_some(), "loaded stone");
        Ok(Stone {
            name: name.to_string(),
            path,
            guard,
        })
    }

    /// Names of all stones in the route, sorted.
    pub fn stone_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in
            fs::read_dir(&self.root).with_context(|| format!("read {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.is_file()
                && path.extension().is_some_and(|ext| ext == STONE_EXT)
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn load_guard(path: &Path) -> Result<Guard> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse guard {}", path.display()))
}
