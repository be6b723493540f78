use crate::{
    domain::{List, ListId, Priority, Subtask, Task, TaskId, TaskStatus},
    error::{Result, TamiError},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

#[cfg(feature = "file-store")]
pub mod file;

#[cfg(feature = "sqlite-store")]
pub mod sqlite;

/// Partial update for a list row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ListPatch {
    pub name: Option<String>,
    pub emoji: Option<String>,
    pub color: Option<Option<String>>,
    pub rank: Option<u32>,
}

impl ListPatch {
    /// Applies the patch to an in-memory row
    pub fn apply(self, list: &mut List) {
        if let Some(name) = self.name {
            list.name = name;
        }
        if let Some(emoji) = self.emoji {
            list.emoji = emoji;
        }
        if let Some(color) = self.color {
            list.color = color;
        }
        if let Some(rank) = self.rank {
            list.rank = rank;
        }
    }
}

/// Partial update for a task row. `None` fields are left untouched; the
/// doubly-wrapped options distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub status: Option<TaskStatus>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub due: Option<Option<String>>,
    pub list_id: Option<ListId>,
    pub rank: Option<u32>,
    pub subtasks: Option<Vec<Subtask>>,
}

impl TaskPatch {
    /// Applies the patch to an in-memory row
    pub fn apply(self, task: &mut Task) {
        if let Some(content) = self.content {
            task.content = content;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = self.due {
            task.due = due;
        }
        if let Some(list_id) = self.list_id {
            task.list_id = list_id;
        }
        if let Some(rank) = self.rank {
            task.rank = rank;
        }
        if let Some(subtasks) = self.subtasks {
            task.subtasks = subtasks;
        }
    }
}

/// Pending rank write for a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRankChange {
    pub id: ListId,
    pub rank: u32,
}

/// Pending rank write for a task. `list_id` is set when the write also
/// re-parents the task (the leading write of a cross-list move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRankChange {
    pub id: TaskId,
    pub rank: u32,
    pub list_id: Option<ListId>,
}

/// Ordered-record store backing the board.
///
/// Reads return sequences in ascending rank order, ties broken by creation
/// time then id, so a reader refetching mid-move still observes a total
/// order. The store is the source of truth; callers treat their own copies
/// as a cache to be invalidated after every mutation.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks whether the backend has been initialized
    async fn is_initialized(&self) -> bool;

    /// All lists, ascending by rank
    async fn list_lists(&self) -> Result<Vec<List>>;

    /// Tasks belonging to one list, ascending by rank
    async fn list_tasks(&self, list_id: &ListId) -> Result<Vec<Task>>;

    /// Every task in the workspace, grouped by list and ascending by rank
    async fn all_tasks(&self) -> Result<Vec<Task>>;

    /// Inserts a list; fails with `ConstraintViolation` on malformed rows
    async fn insert_list(&self, list: &List) -> Result<()>;

    /// Inserts a task; fails with `ConstraintViolation` on malformed rows or
    /// an unknown `list_id`
    async fn insert_task(&self, task: &Task) -> Result<()>;

    /// Partial update; fails with `ListNotFound` if the row vanished
    async fn update_list(&self, id: &ListId, patch: ListPatch) -> Result<()>;

    /// Partial update; fails with `TaskNotFound` if the row vanished
    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<()>;

    /// Deletes a list; fails with `ListNotFound` if the row vanished
    async fn delete_list(&self, id: &ListId) -> Result<()>;

    /// Deletes a task; fails with `TaskNotFound` if the row vanished
    async fn delete_task(&self, id: &TaskId) -> Result<()>;

    /// Applies a batch of list rank writes in slice order, one awaited write
    /// at a time. Writes for vanished rows are skipped; transient failures
    /// are logged, the sequence continues, and a `TransientWrite` summary is
    /// returned at the end so a partially applied batch is never reported as
    /// success. Transactional backends may override this to apply the batch
    /// atomically.
    async fn apply_list_ranks(&self, changes: &[ListRankChange]) -> Result<()> {
        let mut failed = 0usize;
        for change in changes {
            let patch = ListPatch {
                rank: Some(change.rank),
                ..ListPatch::default()
            };
            match self.update_list(&change.id, patch).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    tracing::warn!(list = %change.id, "skipping rank write for vanished list");
                }
                Err(TamiError::TransientWrite(reason)) => {
                    tracing::warn!(list = %change.id, %reason, "list rank write failed, continuing");
                    failed += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if failed > 0 {
            return Err(TamiError::TransientWrite(format!(
                "{} of {} list rank writes failed",
                failed,
                changes.len()
            )));
        }
        Ok(())
    }

    /// Task counterpart of [`apply_list_ranks`](ItemStore::apply_list_ranks),
    /// with the same serial best-effort semantics.
    async fn apply_task_ranks(&self, changes: &[TaskRankChange]) -> Result<()> {
        let mut failed = 0usize;
        for change in changes {
            let patch = TaskPatch {
                rank: Some(change.rank),
                list_id: change.list_id,
                ..TaskPatch::default()
            };
            match self.update_task(&change.id, patch).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    tracing::warn!(task = %change.id, "skipping rank write for vanished task");
                }
                Err(TamiError::TransientWrite(reason)) => {
                    tracing::warn!(task = %change.id, %reason, "task rank write failed, continuing");
                    failed += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if failed > 0 {
            return Err(TamiError::TransientWrite(format!(
                "{} of {} task rank writes failed",
                failed,
                changes.len()
            )));
        }
        Ok(())
    }
}

/// Row checks shared by the backends.
pub(crate) fn validate_list(list: &List) -> Result<()> {
    if list.name.trim().is_empty() {
        return Err(TamiError::ConstraintViolation(
            "list name must not be empty".to_string(),
        ));
    }
    if list.rank == 0 {
        return Err(TamiError::ConstraintViolation(
            "list rank must be positive".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_task(task: &Task) -> Result<()> {
    if task.content.trim().is_empty() {
        return Err(TamiError::ConstraintViolation(
            "task content must not be empty".to_string(),
        ));
    }
    if task.rank == 0 {
        return Err(TamiError::ConstraintViolation(
            "task rank must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Sort key shared by the backends: rank first, then creation time, then id,
/// so duplicate ranks inside a mid-move window still read back in one
/// deterministic order.
pub(crate) fn sort_lists(lists: &mut [List]) {
    lists.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub(crate) fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.list_id
            .cmp(&b.list_id)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub(crate) fn sort_tasks_within_list(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}
