use std::collections::BTreeSet;

use anyhow::anyhow;
use tracing::trace;

use crate::catalog::Catalog;
use crate::task::{
  Status,
  Task
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
  StatusEq(Status),
  ProjectEq(u64),
  /// Matches when the task carries at
  /// least one of the tags.
  TagAny(BTreeSet<u64>)
}

/// Conjunction of status, project and
/// tag predicates. An empty filter
/// matches every task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
  preds: Vec<Pred>
}

impl TaskFilter {
  pub fn new(
    status: Option<Status>,
    project: Option<u64>,
    tags: impl IntoIterator<Item = u64>
  ) -> Self {
    let mut filter = Self::default();
    if let Some(status) = status {
      filter
        .preds
        .push(Pred::StatusEq(status));
    }
    if let Some(project) = project {
      filter
        .preds
        .push(Pred::ProjectEq(project));
    }
    let tags: BTreeSet<u64> =
      tags.into_iter().collect();
    if !tags.is_empty() {
      filter
        .preds
        .push(Pred::TagAny(tags));
    }
    filter
  }

  /// Builds a filter from display
  /// names. `"all"` (any case) disables
  /// the status or project criterion.
  #[tracing::instrument(skip(
    catalog, tags
  ))]
  pub fn from_names(
    status: Option<&str>,
    project: Option<&str>,
    tags: &[String],
    catalog: &Catalog
  ) -> anyhow::Result<Self> {
    let status = match status {
      | Some(raw) if !is_all(raw) => {
        Some(raw.parse::<Status>()?)
      }
      | _ => None
    };
    let project = match project {
      | Some(raw) if !is_all(raw) => {
        Some(
          catalog.require_project(raw)?
        )
      }
      | _ => None
    };
    let tags = tags
      .iter()
      .map(|name| {
        catalog.require_tag(name)
      })
      .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Self::new(status, project, tags))
  }

  /// Parses shell-style terms:
  /// `status:<s>`, `project:<name>` and
  /// `+<tag>`. Repeated tag terms widen
  /// the tag match.
  #[tracing::instrument(skip(
    terms, catalog
  ))]
  pub fn parse(
    terms: &[String],
    catalog: &Catalog
  ) -> anyhow::Result<Self> {
    let mut status = None;
    let mut project = None;
    let mut tags = Vec::new();

    for term in terms {
      if let Some(value) =
        term.strip_prefix("status:")
      {
        status = Some(value.to_string());
      } else if let Some(value) =
        term.strip_prefix("project:")
      {
        project =
          Some(value.to_string());
      } else if let Some(tag) =
        term.strip_prefix('+')
      {
        tags.push(tag.to_string());
      } else {
        return Err(anyhow!(
          "unrecognized filter term: \
           {term}"
        ));
      }
    }

    Self::from_names(
      status.as_deref(),
      project.as_deref(),
      &tags,
      catalog
    )
  }

  pub fn is_empty(&self) -> bool {
    self.preds.is_empty()
  }

  pub fn preds(&self) -> &[Pred] {
    &self.preds
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    self
      .preds
      .iter()
      .all(|pred| eval_pred(pred, task))
  }

  /// Matching tasks in their original
  /// order.
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    tasks
      .iter()
      .filter(|task| self.matches(task))
      .collect()
  }
}

fn is_all(raw: &str) -> bool {
  raw.trim().eq_ignore_ascii_case("all")
}

fn eval_pred(
  pred: &Pred,
  task: &Task
) -> bool {
  let ok = match pred {
    | Pred::StatusEq(status) => {
      task.status == *status
    }
    | Pred::ProjectEq(project) => {
      task.project_id == Some(*project)
    }
    | Pred::TagAny(tags) => {
      task
        .tag_ids
        .iter()
        .any(|id| tags.contains(id))
    }
  };

  trace!(pred = ?pred, id = task.id, ok, "filter predicate evaluation");
  ok
}
