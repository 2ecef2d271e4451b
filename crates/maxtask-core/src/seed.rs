use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::catalog::{Project, Tag};
use crate::task::Task;
use crate::user::User;

const BUILTIN_SEED: &str = include_str!("seed.toml");

/// Complete session state: what a session starts from and what `export`
/// writes out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seed {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Seed {
    pub fn builtin() -> anyhow::Result<Self> {
        toml::from_str(BUILTIN_SEED).context("failed to parse built-in seed data")
    }

    /// Reads a seed file; `.toml` files are parsed as TOML, anything else as
    /// JSON.
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let seed: Seed = if is_toml {
            toml::from_str(&text)
                .with_context(|| format!("failed parsing {} as TOML", path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("failed parsing {} as JSON", path.display()))?
        };

        debug!(
            projects = seed.projects.len(),
            tags = seed.tags.len(),
            tasks = seed.tasks.len(),
            "loaded seed file"
        );
        Ok(seed)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize session")
    }

    /// Writes the JSON form next to `path` and renames it into place.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub fn write_json_atomic(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        writeln!(temp, "{json}")?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

        info!(tasks = self.tasks.len(), "exported session");
        Ok(())
    }
}
