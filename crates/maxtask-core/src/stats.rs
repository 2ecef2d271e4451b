use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::task::{
  Status,
  Task
};

/// `round(completed / total * 100)`,
/// or 0 when there is nothing to
/// complete.
#[must_use]
pub fn completion_rate(
  completed: usize,
  total: usize
) -> u32 {
  if total == 0 {
    return 0;
  }
  let ratio =
    completed as f64 / total as f64;
  (ratio * 100.0).round() as u32
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize
)]
pub struct StatusCounts {
  pub total:       usize,
  pub todo:        usize,
  pub in_progress: usize,
  pub done:        usize
}

impl StatusCounts {
  pub fn tally<'a>(
    tasks: impl IntoIterator<
      Item = &'a Task
    >
  ) -> Self {
    let mut counts = Self::default();
    for task in tasks {
      counts.total += 1;
      match task.status {
        | Status::ToDo => {
          counts.todo += 1
        }
        | Status::InProgress => {
          counts.in_progress += 1
        }
        | Status::Done => {
          counts.done += 1
        }
      }
    }
    counts
  }

  pub fn get(
    &self,
    status: Status
  ) -> usize {
    match status {
      | Status::ToDo => self.todo,
      | Status::InProgress => {
        self.in_progress
      }
      | Status::Done => self.done
    }
  }

  pub fn completion_rate(&self) -> u32 {
    completion_rate(
      self.done, self.total
    )
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize
)]
pub struct AggregateCounts {
  pub status:  StatusCounts,
  /// Deadline strictly before today
  /// and not done.
  pub overdue: usize
}

pub fn aggregate_counts(
  tasks: &[Task],
  today: NaiveDate
) -> AggregateCounts {
  AggregateCounts {
    status:  StatusCounts::tally(tasks),
    overdue: tasks
      .iter()
      .filter(|t| t.is_overdue(today))
      .count()
  }
}

pub fn project_stats(
  tasks: &[Task],
  project_id: u64
) -> StatusCounts {
  StatusCounts::tally(
    tasks.iter().filter(|t| {
      t.project_id == Some(project_id)
    })
  )
}

/// Task count keyed by project
/// reference; `None` collects tasks
/// without a project.
pub fn tasks_per_project(
  tasks: &[Task]
) -> BTreeMap<Option<u64>, usize> {
  let mut out = BTreeMap::new();
  for task in tasks {
    *out
      .entry(task.project_id)
      .or_insert(0) += 1;
  }
  out
}

pub fn tag_usage(
  tasks: &[Task],
  tag_id: u64
) -> usize {
  tasks
    .iter()
    .filter(|t| t.has_tag(tag_id))
    .count()
}

/// Newest first by creation time.
pub fn recent(
  tasks: &[Task],
  limit: usize
) -> Vec<&Task> {
  let mut sorted: Vec<&Task> =
    tasks.iter().collect();
  sorted.sort_by(|a, b| {
    b.created_at.cmp(&a.created_at)
  });
  sorted.truncate(limit);
  sorted
}

/// Open tasks, nearest deadline
/// first.
pub fn upcoming(
  tasks: &[Task],
  limit: usize
) -> Vec<&Task> {
  let mut open: Vec<&Task> = tasks
    .iter()
    .filter(|t| t.status != Status::Done)
    .collect();
  open.sort_by_key(|t| t.deadline);
  open.truncate(limit);
  open
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    aggregate_counts,
    completion_rate,
    project_stats,
    recent,
    tag_usage,
    tasks_per_project,
    upcoming
  };
  use crate::task::{
    NewTask,
    Status,
    Task
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 16)
      .unwrap()
  }

  fn task(
    id: u64,
    status: Status,
    deadline_offset: i64,
    created_day: u32
  ) -> Task {
    let mut new = NewTask::new(
      format!("task {id}"),
      today()
        + Duration::days(
          deadline_offset
        ),
      Utc
        .with_ymd_and_hms(
          2026,
          2,
          created_day,
          0,
          0,
          0
        )
        .unwrap()
    );
    new.status = status;
    new.into_task(id)
  }

  #[test]
  fn completion_rate_rounds_and_guards_zero()
   {
    assert_eq!(completion_rate(0, 0), 0);
    assert_eq!(completion_rate(3, 4), 75);
    assert_eq!(completion_rate(1, 3), 33);
    assert_eq!(completion_rate(2, 3), 67);
    assert_eq!(completion_rate(1, 8), 13);
    assert_eq!(
      completion_rate(5, 5),
      100
    );
  }

  #[test]
  fn aggregate_counts_by_status_and_overdue()
   {
    let tasks = vec![
      task(1, Status::ToDo, -1, 1),
      task(2, Status::InProgress, 0, 2),
      task(3, Status::Done, -5, 3),
      task(4, Status::ToDo, 3, 4),
    ];
    let counts =
      aggregate_counts(&tasks, today());

    assert_eq!(counts.status.total, 4);
    assert_eq!(counts.status.todo, 2);
    assert_eq!(
      counts.status.in_progress,
      1
    );
    assert_eq!(counts.status.done, 1);
    assert_eq!(counts.overdue, 1);
  }

  #[test]
  fn per_project_and_per_tag() {
    let mut tasks = vec![
      task(1, Status::ToDo, 1, 1),
      task(2, Status::Done, 1, 2),
      task(3, Status::InProgress, 1, 3),
    ];
    tasks[0].project_id = Some(7);
    tasks[1].project_id = Some(7);
    tasks[0].tag_ids = vec![1, 2];
    tasks[2].tag_ids = vec![2];

    let stats = project_stats(&tasks, 7);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.todo, 1);
    assert_eq!(stats.done, 1);
    assert_eq!(stats.completion_rate(), 50);
    assert_eq!(
      project_stats(&tasks, 8).total,
      0
    );

    let per_project =
      tasks_per_project(&tasks);
    assert_eq!(per_project[&Some(7)], 2);
    assert_eq!(per_project[&None], 1);

    assert_eq!(tag_usage(&tasks, 2), 2);
    assert_eq!(tag_usage(&tasks, 1), 1);
    assert_eq!(tag_usage(&tasks, 9), 0);
  }

  #[test]
  fn recent_and_upcoming_orderings() {
    let tasks = vec![
      task(1, Status::ToDo, 5, 3),
      task(2, Status::Done, -9, 9),
      task(3, Status::InProgress, 1, 5),
      task(4, Status::ToDo, 2, 1),
    ];

    let newest: Vec<u64> =
      recent(&tasks, 2)
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(newest, [2, 3]);

    let soonest: Vec<u64> =
      upcoming(&tasks, 5)
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(soonest, [3, 4, 1]);
  }
}
