use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use tracing::{debug, info, trace};

use crate::task::{NewTask, Status, Task, TaskPatch};

/// Immutable view of a collection at one revision.
///
/// Cloning is cheap. Two snapshots are the same state exactly when they
/// share an allocation, so views compare with [`Snapshot::same_as`].
#[derive(Debug)]
pub struct Snapshot<T> {
    revision: u64,
    items: Arc<[T]>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Snapshot<T> {
    pub(crate) fn new(revision: u64, items: Vec<T>) -> Self {
        Self {
            revision,
            items: items.into(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn same_as(&self, other: &Snapshot<T>) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&Snapshot<Task>)>;

/// Authoritative, ordered task collection for one session.
pub struct TaskStore {
    current: Snapshot<Task>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("revision", &self.current.revision)
            .field("tasks", &self.current.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self {
            current: Snapshot::new(0, vec![]),
            listeners: vec![],
            next_subscription: 1,
        }
    }
}

impl TaskStore {
    /// Builds a store from seed tasks, keeping their ids and order.
    #[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
    pub fn from_tasks(tasks: Vec<Task>) -> anyhow::Result<Self> {
        let mut seen = BTreeSet::new();
        for task in &tasks {
            if !seen.insert(task.id) {
                bail!("duplicate task id in seed data: {}", task.id);
            }
            validate_title(&task.title)
                .map_err(|err| anyhow!("seed task {}: {err}", task.id))?;
        }

        debug!(count = tasks.len(), "seeded task store");
        Ok(Self {
            current: Snapshot::new(0, tasks),
            ..Self::default()
        })
    }

    pub fn snapshot(&self) -> Snapshot<Task> {
        self.current.clone()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.current
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.current.iter().find(|t| t.id == id)
    }

    /// One past the largest id in use, or 1 for an empty store.
    pub fn next_id(&self) -> anyhow::Result<u64> {
        allocate_id(self.current.iter().map(|t| t.id), "task")
    }

    /// Registers a listener that is called with every new snapshot.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Snapshot<Task>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        trace!(subscription = id.0, "listener subscribed");
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        before != self.listeners.len()
    }

    #[tracing::instrument(skip(self, task), fields(title = %task.title))]
    pub fn add_task(&mut self, task: NewTask) -> anyhow::Result<u64> {
        validate_title(&task.title)?;

        let id = self.next_id()?;
        let mut tasks = self.current.to_vec();
        tasks.push(task.into_task(id));
        self.publish(tasks);

        info!(id, "added task");
        Ok(id)
    }

    /// Returns `false` when no task has `id`.
    #[tracing::instrument(skip(self, patch))]
    pub fn update_task(&mut self, id: u64, patch: TaskPatch) -> anyhow::Result<bool> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let Some(idx) = self.position(id) else {
            debug!(id, "update for unknown task ignored");
            return Ok(false);
        };

        let mut tasks = self.current.to_vec();
        tasks[idx].apply(patch);
        self.publish(tasks);

        info!(id, "updated task");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, id: u64) -> bool {
        let Some(idx) = self.position(id) else {
            debug!(id, "delete for unknown task ignored");
            return false;
        };

        let mut tasks = self.current.to_vec();
        tasks.remove(idx);
        self.publish(tasks);

        info!(id, "deleted task");
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_subtask(&mut self, task_id: u64, subtask_id: u64) -> bool {
        let Some(idx) = self.position(task_id) else {
            debug!(task_id, "toggle for unknown task ignored");
            return false;
        };
        let Some(sub_idx) = self.current[idx]
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
        else {
            debug!(task_id, subtask_id, "toggle for unknown subtask ignored");
            return false;
        };

        let mut tasks = self.current.to_vec();
        let subtask = &mut tasks[idx].subtasks[sub_idx];
        subtask.completed = !subtask.completed;
        let completed = subtask.completed;
        self.publish(tasks);

        info!(task_id, subtask_id, completed, "toggled subtask");
        true
    }

    pub fn complete_task(&mut self, id: u64) -> bool {
        let Some(idx) = self.position(id) else {
            debug!(id, "complete for unknown task ignored");
            return false;
        };

        let mut tasks = self.current.to_vec();
        tasks[idx].status = Status::Done;
        self.publish(tasks);

        info!(id, "completed task");
        true
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.current.iter().position(|t| t.id == id)
    }

    fn publish(&mut self, tasks: Vec<Task>) {
        let next = Snapshot::new(self.current.revision + 1, tasks);
        self.current = next;
        trace!(
            revision = self.current.revision,
            listeners = self.listeners.len(),
            "publishing task snapshot"
        );
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.current);
        }
    }
}

pub(crate) fn allocate_id(
    ids: impl Iterator<Item = u64>,
    kind: &str,
) -> anyhow::Result<u64> {
    ids.max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| anyhow!("{kind} id space exhausted"))
}

pub(crate) fn validate_title(title: &str) -> anyhow::Result<()> {
    if title.trim().is_empty() {
        Err(anyhow!("title cannot be empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::{NaiveDate, TimeZone, Utc};

    use super::TaskStore;
    use crate::task::{NewTask, Status, TaskPatch};

    fn new_task(title: &str) -> NewTask {
        NewTask::new(
            title,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn ids_start_at_one_and_follow_the_maximum() {
        let mut store = TaskStore::default();
        assert_eq!(store.add_task(new_task("a")).unwrap(), 1);
        assert_eq!(store.add_task(new_task("b")).unwrap(), 2);
        assert!(store.delete_task(1));
        assert_eq!(store.add_task(new_task("c")).unwrap(), 3);

        let titles: Vec<_> = store.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["b", "c"]);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let mut store = TaskStore::default();
        assert!(store.add_task(new_task("  ")).is_err());
        let id = store.add_task(new_task("real")).unwrap();
        let patch = TaskPatch {
            title: Some(String::new()),
            ..TaskPatch::default()
        };
        assert!(store.update_task(id, patch).is_err());
        assert_eq!(store.get(id).unwrap().title, "real");
    }

    #[test]
    fn unknown_ids_are_silent_noops() {
        let mut store = TaskStore::default();
        store.add_task(new_task("a")).unwrap();
        let before = store.snapshot();

        assert!(!store.update_task(42, TaskPatch::status(Status::Done)).unwrap());
        assert!(!store.delete_task(42));
        assert!(!store.toggle_subtask(42, 1));
        assert!(!store.toggle_subtask(1, 9));
        assert!(!store.complete_task(42));

        assert!(store.snapshot().same_as(&before));
    }

    #[test]
    fn mutations_publish_new_snapshots_to_listeners() {
        let mut store = TaskStore::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(move |snap| sink.borrow_mut().push((snap.revision(), snap.len())));

        let first = store.snapshot();
        let id = store.add_task(new_task("a")).unwrap();
        assert!(!store.snapshot().same_as(&first));
        assert_eq!(first.len(), 0);

        store.update_task(id, TaskPatch::status(Status::InProgress)).unwrap();
        store.delete_task(id);

        assert_eq!(*seen.borrow(), vec![(1, 1), (2, 1), (3, 0)]);

        assert!(store.unsubscribe(sub));
        store.add_task(new_task("b")).unwrap();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn toggling_a_subtask_updates_progress() {
        let mut store = TaskStore::default();
        let id = store
            .add_task(new_task("a").with_subtasks(["one", "two"]))
            .unwrap();

        assert!(store.toggle_subtask(id, 2));
        assert_eq!(store.get(id).unwrap().progress().completed, 1);
        assert!(store.toggle_subtask(id, 2));
        assert_eq!(store.get(id).unwrap().progress().completed, 0);
    }

    #[test]
    fn add_fails_once_ids_are_exhausted() {
        let last = new_task("last").into_task(u64::MAX);
        let mut store = TaskStore::from_tasks(vec![last]).unwrap();
        let before = store.snapshot();

        let err = store.add_task(new_task("overflow")).unwrap_err();
        assert!(err.to_string().contains("id space exhausted"));
        assert!(store.snapshot().same_as(&before));
    }

    #[test]
    fn seed_rejects_duplicate_ids() {
        let a = new_task("a").into_task(1);
        let b = new_task("b").into_task(1);
        assert!(TaskStore::from_tasks(vec![a, b]).is_err());
    }
}
