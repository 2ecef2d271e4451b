use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::flexible_timestamp;
use crate::stats::completion_rate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::ToDo, Status::InProgress, Status::Done];

    pub fn label(self) -> &'static str {
        match self {
            Status::ToDo => "To Do",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "todo" => Ok(Status::ToDo),
            "inprogress" | "progress" | "doing" => Ok(Status::InProgress),
            "done" | "completed" => Ok(Status::Done),
            _ => Err(anyhow!("unknown status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Completed/total counter shown next to a task in list views. Always
/// derived from the subtask list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubtaskProgress {
    pub completed: usize,
    pub total: usize,
}

impl SubtaskProgress {
    pub fn percent(&self) -> u32 {
        completion_rate(self.completed, self.total)
    }
}

impl fmt::Display for SubtaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Pdf,
    Image,
    Document,
    Other,
}

impl AttachmentKind {
    pub fn from_file_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => AttachmentKind::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => AttachmentKind::Image,
            "doc" | "docx" | "odt" | "txt" | "md" | "rtf" => AttachmentKind::Document,
            _ => AttachmentKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub name: String,
    pub size_bytes: u64,
    pub kind: AttachmentKind,
}

impl Attachment {
    pub fn new(id: u64, name: impl Into<String>, size_bytes: u64) -> Self {
        let name = name.into();
        let kind = AttachmentKind::from_file_name(&name);
        Self {
            id,
            name,
            size_bytes,
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub status: Status,

    #[serde(default)]
    pub project_id: Option<u64>,

    #[serde(default)]
    pub tag_ids: Vec<u64>,

    pub deadline: NaiveDate,

    #[serde(with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub subtasks: Vec<Subtask>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Task {
    pub fn progress(&self) -> SubtaskProgress {
        SubtaskProgress {
            completed: self.subtasks.iter().filter(|s| s.completed).count(),
            total: self.subtasks.len(),
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.deadline < today && self.status != Status::Done
    }

    /// Negative once the deadline has passed.
    pub fn days_until_deadline(&self, today: NaiveDate) -> i64 {
        (self.deadline - today).num_days()
    }

    pub fn has_tag(&self, tag_id: u64) -> bool {
        self.tag_ids.contains(&tag_id)
    }

    pub(crate) fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(tag_ids) = patch.tag_ids {
            self.tag_ids = tag_ids;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(subtasks) = patch.subtasks {
            self.subtasks = subtasks;
        }
        if let Some(attachments) = patch.attachments {
            self.attachments = attachments;
        }
    }
}

/// A task that has not been assigned an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub tag_ids: Vec<u64>,
    pub deadline: NaiveDate,
    #[serde(with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, deadline: NaiveDate, created_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: Status::ToDo,
            project_id: None,
            tag_ids: vec![],
            deadline,
            created_at,
            subtasks: vec![],
            attachments: vec![],
        }
    }

    /// Adds subtasks by title, numbering them from 1.
    pub fn with_subtasks<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = self.subtasks.iter().map(|s| s.id).max().unwrap_or(0);
        self.subtasks
            .extend(titles.into_iter().enumerate().map(|(idx, title)| Subtask {
                id: start + idx as u64 + 1,
                title: title.into(),
                completed: false,
            }));
        self
    }

    pub(crate) fn into_task(self, id: u64) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            project_id: self.project_id,
            tag_ids: self.tag_ids,
            deadline: self.deadline,
            created_at: self.created_at,
            subtasks: self.subtasks,
            attachments: self.attachments,
        }
    }
}

/// Partial update for a task. `None` leaves a field untouched; nested
/// options (`Some(None)`) clear an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub project_id: Option<Option<u64>>,
    pub tag_ids: Option<Vec<u64>>,
    pub deadline: Option<NaiveDate>,
    pub subtasks: Option<Vec<Subtask>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{AttachmentKind, NewTask, Status, TaskPatch};

    fn sample() -> super::Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let deadline = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut task = NewTask::new("Homepage wireframes", deadline, created)
            .with_subtasks(["Sketch", "Review", "Hand off"])
            .into_task(1);
        task.subtasks[0].completed = true;
        task
    }

    #[test]
    fn status_parses_loose_spellings() {
        assert_eq!("to do".parse::<Status>().unwrap(), Status::ToDo);
        assert_eq!("In-Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("DONE".parse::<Status>().unwrap(), Status::Done);
        assert!("blocked".parse::<Status>().is_err());
    }

    #[test]
    fn status_serializes_with_display_labels() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn progress_is_derived_from_subtasks() {
        let task = sample();
        let progress = task.progress();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.to_string(), "1/3");
        assert_eq!(progress.percent(), 33);
    }

    #[test]
    fn overdue_requires_past_deadline_and_open_status() {
        let mut task = sample();
        let after = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let on_deadline = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        assert!(task.is_overdue(after));
        assert!(!task.is_overdue(on_deadline));
        assert_eq!(task.days_until_deadline(after), -1);

        task.status = Status::Done;
        assert!(!task.is_overdue(after));
    }

    #[test]
    fn patch_replaces_only_supplied_fields() {
        let mut task = sample();
        let before = task.clone();

        task.apply(TaskPatch {
            description: Some(Some("detail".to_string())),
            project_id: Some(Some(2)),
            ..TaskPatch::default()
        });

        assert_eq!(task.title, before.title);
        assert_eq!(task.status, before.status);
        assert_eq!(task.description.as_deref(), Some("detail"));
        assert_eq!(task.project_id, Some(2));

        task.apply(TaskPatch {
            project_id: Some(None),
            ..TaskPatch::default()
        });
        assert_eq!(task.project_id, None);
    }

    #[test]
    fn attachment_kind_follows_extension() {
        assert_eq!(AttachmentKind::from_file_name("spec.PDF"), AttachmentKind::Pdf);
        assert_eq!(AttachmentKind::from_file_name("flow.png"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_file_name("api.docx"), AttachmentKind::Document);
        assert_eq!(AttachmentKind::from_file_name("archive"), AttachmentKind::Other);
    }
}
