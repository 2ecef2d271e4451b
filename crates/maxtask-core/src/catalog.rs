use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::palette::Color;
use crate::store::allocate_id;

/// Name shown for a reference whose project or tag no longer exists.
pub const MISSING_NAME: &str = "(unknown)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub color: Color,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<Color>,
}

/// Projects and tags of a session.
///
/// Names are unique by convention only; lookups by name return the first
/// match.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    projects: Vec<Project>,
    tags: Vec<Tag>,
}

impl Catalog {
    pub fn new(projects: Vec<Project>, tags: Vec<Tag>) -> anyhow::Result<Self> {
        ensure_unique_ids(projects.iter().map(|p| p.id), "project")?;
        ensure_unique_ids(tags.iter().map(|t| t.id), "tag")?;
        Ok(Self { projects, tags })
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn project(&self, id: u64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn tag(&self, id: u64) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }

    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn project_color(&self, id: Option<u64>) -> Color {
        id.and_then(|id| self.project(id))
            .map(|p| p.color)
            .unwrap_or_default()
    }

    pub fn tag_color(&self, id: u64) -> Color {
        self.tag(id).map(|t| t.color).unwrap_or_default()
    }

    pub fn project_name(&self, id: Option<u64>) -> Option<&str> {
        let id = id?;
        Some(
            self.project(id)
                .map(|p| p.name.as_str())
                .unwrap_or(MISSING_NAME),
        )
    }

    pub fn tag_name(&self, id: u64) -> &str {
        self.tag(id).map(|t| t.name.as_str()).unwrap_or(MISSING_NAME)
    }

    #[tracing::instrument(skip(self, description))]
    pub fn add_project(
        &mut self,
        name: &str,
        description: Option<String>,
        color: Color,
    ) -> anyhow::Result<u64> {
        validate_name(name)?;
        let id = allocate_id(self.projects.iter().map(|p| p.id), "project")?;
        self.projects.push(Project {
            id,
            name: name.trim().to_string(),
            description,
            color,
        });
        info!(id, "added project");
        Ok(id)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_project(&mut self, id: u64, patch: ProjectPatch) -> anyhow::Result<bool> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        let Some(project) = self.projects.iter_mut().find(|p| p.id == id) else {
            debug!(id, "update for unknown project ignored");
            return Ok(false);
        };

        if let Some(name) = patch.name {
            project.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(color) = patch.color {
            project.color = color;
        }
        info!(id, "updated project");
        Ok(true)
    }

    /// Tasks that reference the project keep the dangling id.
    #[tracing::instrument(skip(self))]
    pub fn delete_project(&mut self, id: u64) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        let removed = before != self.projects.len();
        debug!(id, removed, "delete project");
        removed
    }

    #[tracing::instrument(skip(self))]
    pub fn add_tag(&mut self, name: &str, color: Color) -> anyhow::Result<u64> {
        validate_name(name)?;
        let id = allocate_id(self.tags.iter().map(|t| t.id), "tag")?;
        self.tags.push(Tag {
            id,
            name: name.trim().to_string(),
            color,
        });
        info!(id, "added tag");
        Ok(id)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_tag(&mut self, id: u64, patch: TagPatch) -> anyhow::Result<bool> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        let Some(tag) = self.tags.iter_mut().find(|t| t.id == id) else {
            debug!(id, "update for unknown tag ignored");
            return Ok(false);
        };

        if let Some(name) = patch.name {
            tag.name = name.trim().to_string();
        }
        if let Some(color) = patch.color {
            tag.color = color;
        }
        info!(id, "updated tag");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_tag(&mut self, id: u64) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.id != id);
        let removed = before != self.tags.len();
        debug!(id, removed, "delete tag");
        removed
    }

    /// Resolves a project name to its id, failing on unknown names.
    pub fn require_project(&self, name: &str) -> anyhow::Result<u64> {
        self.project_by_name(name)
            .map(|p| p.id)
            .ok_or_else(|| anyhow!("unknown project: {name}"))
    }

    pub fn require_tag(&self, name: &str) -> anyhow::Result<u64> {
        self.tag_by_name(name)
            .map(|t| t.id)
            .ok_or_else(|| anyhow!("unknown tag: {name}"))
    }
}

fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() {
        bail!("name cannot be empty");
    }
    Ok(())
}

fn ensure_unique_ids(ids: impl Iterator<Item = u64>, kind: &str) -> anyhow::Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            bail!("duplicate {kind} id in seed data: {id}");
        }
    }
    Ok(())
}
