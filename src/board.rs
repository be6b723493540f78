//! The ordered-collection manager.
//!
//! [`Board`] owns the in-memory view of lists and tasks and turns drop events
//! into the minimal set of rank writes against the backing [`ItemStore`]. The
//! store is the source of truth; the board's snapshot is a cache that is
//! rebuilt from the store after every structural mutation, never patched in
//! place from multiple call sites.
//!
//! Mutating operations take `&mut self`, so two moves cannot interleave on
//! one board; within a move, writes are issued and awaited one at a time so
//! a reader refetching mid-move sees a steadily progressing rank assignment
//! rather than a scrambled batch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    domain::{
        ordering, List, ListId, Priority, Ranked, Subtask, SubtaskId, Task, TaskId, TaskStatus,
    },
    error::{Result, TamiError},
    extract::{Extraction, Intent, TaskDraft},
    store::{ItemStore, ListPatch, ListRankChange, TaskPatch, TaskRankChange},
};

/// Seed lists for a fresh workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub lists: Vec<SeedList>,
}

#[derive(Debug, Clone)]
pub struct SeedList {
    pub name: String,
    pub emoji: String,
    pub is_default: bool,
}

impl SeedList {
    fn new(name: &str, emoji: &str) -> Self {
        Self {
            name: name.to_string(),
            emoji: emoji.to_string(),
            is_default: false,
        }
    }

    fn default_target(mut self) -> Self {
        self.is_default = true;
        self
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            lists: vec![
                SeedList::new("Work & Projects", "💼"),
                SeedList::new("Personal & Home", "🏠"),
                SeedList::new("Shopping List", "🛒"),
                SeedList::new("Quick Ideas", "💡").default_target(),
            ],
        }
    }
}

impl WorkspaceConfig {
    /// A config that seeds nothing; lists are created explicitly.
    pub fn empty() -> Self {
        Self { lists: Vec::new() }
    }
}

/// Cached view of the store, rebuilt wholesale on every refetch.
#[derive(Debug, Default)]
struct Snapshot {
    /// Ascending by rank
    lists: Vec<List>,
    tasks: HashMap<TaskId, Task>,
    /// Per-list task ids, ascending by rank
    by_list: HashMap<ListId, Vec<TaskId>>,
}

/// The ordered-collection manager.
pub struct Board {
    store: Arc<dyn ItemStore>,
    snapshot: Snapshot,
}

impl Board {
    /// Opens a board over the given store, seeding the default lists on
    /// first run.
    pub async fn open(store: Arc<dyn ItemStore>) -> Result<Self> {
        Self::open_with_config(store, WorkspaceConfig::default()).await
    }

    /// Opens a board, seeding `config.lists` if the store holds no lists yet.
    pub async fn open_with_config(
        store: Arc<dyn ItemStore>,
        config: WorkspaceConfig,
    ) -> Result<Self> {
        store.initialize().await?;
        let mut board = Self {
            store,
            snapshot: Snapshot::default(),
        };
        board.refresh().await?;

        if board.snapshot.lists.is_empty() && !config.lists.is_empty() {
            for (i, seed) in config.lists.iter().enumerate() {
                let mut list = List::new(seed.name.clone(), seed.emoji.clone(), (i + 1) as u32);
                list.is_default = seed.is_default;
                board.store.insert_list(&list).await?;
            }
            board.refresh().await?;
        }

        Ok(board)
    }

    /// Drops the cached view and rebuilds it from the store.
    pub async fn refresh(&mut self) -> Result<()> {
        let lists = self.store.list_lists().await?;
        let all = self.store.all_tasks().await?;

        let mut tasks = HashMap::with_capacity(all.len());
        let mut by_list: HashMap<ListId, Vec<TaskId>> = HashMap::new();
        for list in &lists {
            by_list.entry(list.id).or_default();
        }
        for task in all {
            by_list.entry(task.list_id).or_default().push(task.id);
            tasks.insert(task.id, task);
        }

        self.snapshot = Snapshot {
            lists,
            tasks,
            by_list,
        };
        Ok(())
    }

    /// Lists in display order
    pub fn lists(&self) -> &[List] {
        &self.snapshot.lists
    }

    pub fn list(&self, id: &ListId) -> Option<&List> {
        self.snapshot.lists.iter().find(|l| &l.id == id)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.snapshot.tasks.get(id)
    }

    /// Tasks of one list in display order
    pub fn tasks_in(&self, list_id: &ListId) -> Vec<&Task> {
        self.snapshot
            .by_list
            .get(list_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.snapshot.tasks.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The fallback list for reassigned tasks: the one flagged as default,
    /// or the first list when none is flagged.
    pub fn default_list(&self) -> Option<&List> {
        self.snapshot
            .lists
            .iter()
            .find(|l| l.is_default)
            .or_else(|| self.snapshot.lists.first())
    }

    fn ranked_lists(&self) -> Vec<Ranked<ListId>> {
        self.snapshot
            .lists
            .iter()
            .map(|l| Ranked {
                id: l.id,
                rank: l.rank,
            })
            .collect()
    }

    fn ranked_tasks(&self, list_id: &ListId) -> Vec<Ranked<TaskId>> {
        self.tasks_in(list_id)
            .iter()
            .map(|t| Ranked {
                id: t.id,
                rank: t.rank,
            })
            .collect()
    }

    // --- list operations ---

    /// Creates a list at the end of the board
    pub async fn create_list(
        &mut self,
        name: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Result<List> {
        let rank = ordering::next_rank(&self.ranked_lists());
        let list = List::new(name.into(), emoji.into(), rank);
        self.store.insert_list(&list).await?;
        self.refresh().await?;
        Ok(list)
    }

    /// Renames a list
    pub async fn edit_list(
        &mut self,
        id: ListId,
        name: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Result<()> {
        let patch = ListPatch {
            name: Some(name.into()),
            emoji: Some(emoji.into()),
            ..ListPatch::default()
        };
        self.store.update_list(&id, patch).await?;
        self.refresh().await
    }

    /// Deletes a list after reassigning its tasks to the default list.
    /// Reassigned tasks are appended past the fallback's current maximum in
    /// their original relative order, so ranks stay collision-free. The
    /// default list itself cannot be deleted.
    pub async fn delete_list(&mut self, id: ListId) -> Result<()> {
        let Some(list) = self.list(&id) else {
            return Err(TamiError::ListNotFound(id.to_string()));
        };
        if list.is_default {
            return Err(TamiError::ConstraintViolation(
                "the default list cannot be deleted".to_string(),
            ));
        }
        let fallback = self
            .default_list()
            .filter(|l| l.id != id)
            .map(|l| l.id)
            .ok_or_else(|| {
                TamiError::ConstraintViolation(
                    "no fallback list to reassign tasks to".to_string(),
                )
            })?;

        let orphans: Vec<TaskId> = self
            .snapshot
            .by_list
            .get(&id)
            .cloned()
            .unwrap_or_default();
        let mut rank = ordering::next_rank(&self.ranked_tasks(&fallback));
        let changes: Vec<TaskRankChange> = orphans
            .iter()
            .map(|task_id| {
                let change = TaskRankChange {
                    id: *task_id,
                    rank,
                    list_id: Some(fallback),
                };
                rank += 1;
                change
            })
            .collect();

        self.store.apply_task_ranks(&changes).await?;
        self.store.delete_list(&id).await?;
        self.refresh().await
    }

    /// Reorders a list among its siblings with array-move semantics.
    /// Reordering a list onto its current position issues no writes.
    pub async fn reorder_list(&mut self, moved: ListId, anchor: ListId) -> Result<()> {
        let plan = ordering::reorder(&self.ranked_lists(), moved, anchor);
        if plan.is_empty() {
            return Ok(());
        }

        debug!(list = %moved, writes = plan.len(), "reordering lists");
        let changes: Vec<ListRankChange> = plan
            .into_iter()
            .map(|c| ListRankChange {
                id: c.id,
                rank: c.rank,
            })
            .collect();

        let outcome = self.store.apply_list_ranks(&changes).await;
        self.finish_move(outcome).await
    }

    // --- task operations ---

    /// Creates a task at the end of a list
    pub async fn create_task(
        &mut self,
        list_id: ListId,
        content: impl Into<String>,
    ) -> Result<Task> {
        if self.list(&list_id).is_none() {
            return Err(TamiError::ListNotFound(list_id.to_string()));
        }
        let rank = ordering::next_rank(&self.ranked_tasks(&list_id));
        let task = Task::new(list_id, content.into(), rank);
        self.store.insert_task(&task).await?;
        self.refresh().await?;
        Ok(task)
    }

    /// Inserts a batch of unranked drafts from the language extractor.
    ///
    /// Each draft lands one past the current maximum rank of its resolved
    /// list; resolution prefers an explicit list id, then the category hint,
    /// then the default list. Returns the inserted tasks in input order.
    /// Extractions whose intent is not task creation insert nothing.
    pub async fn ingest(&mut self, extraction: &Extraction) -> Result<Vec<Task>> {
        if extraction.intent != Intent::CreateTask {
            return Ok(Vec::new());
        }

        let mut inserted = Vec::new();
        let mut next: HashMap<ListId, u32> = HashMap::new();
        for draft in &extraction.tasks {
            let list_id = self.resolve_list(draft)?;
            let slot = next
                .entry(list_id)
                .or_insert_with(|| ordering::next_rank(&self.ranked_tasks(&list_id)));
            let task = draft.to_task(list_id, *slot);
            *slot += 1;

            self.store.insert_task(&task).await?;
            inserted.push(task);
        }

        if !inserted.is_empty() {
            self.refresh().await?;
        }
        Ok(inserted)
    }

    fn resolve_list(&self, draft: &TaskDraft) -> Result<ListId> {
        if let Some(id) = draft.list_id {
            if self.list(&id).is_some() {
                return Ok(id);
            }
        }
        if let Some(category) = draft.category {
            if let Some(list) = self
                .snapshot
                .lists
                .iter()
                .find(|l| category.matches(&l.name))
            {
                return Ok(list.id);
            }
        }
        self.default_list()
            .map(|l| l.id)
            .ok_or(TamiError::WorkspaceNotInitialized)
    }

    /// Applies a drop event for a task.
    ///
    /// Dispatches between a same-list reorder, a cross-list move onto an
    /// anchor task, and a drop into an empty list (`anchor == None`). A
    /// moved or anchor id missing from the current snapshot means the drag
    /// state went stale; the whole event is ignored without a write.
    pub async fn move_task(
        &mut self,
        moved: TaskId,
        target_list: ListId,
        anchor: Option<TaskId>,
    ) -> Result<()> {
        let Some(task) = self.snapshot.tasks.get(&moved) else {
            debug!(task = %moved, "ignoring move for task missing from snapshot");
            return Ok(());
        };
        if self.list(&target_list).is_none() {
            debug!(list = %target_list, "ignoring move onto unknown list");
            return Ok(());
        }
        let source_list = task.list_id;

        let anchor = match anchor {
            Some(anchor_id) => {
                match self.snapshot.tasks.get(&anchor_id) {
                    Some(anchor_task) if anchor_task.list_id == target_list => Some(anchor_id),
                    _ => {
                        debug!(anchor = %anchor_id, "ignoring move with stale anchor");
                        return Ok(());
                    }
                }
            }
            // An empty-drop event against a list that turns out to hold
            // tasks is anchored on its head instead, so rank 1 is never
            // duplicated by a racy drop.
            None => self.ranked_tasks(&target_list).first().map(|r| r.id),
        };

        let outcome = match anchor {
            None => {
                debug!(task = %moved, target = %target_list, "moving task into empty list");
                self.store
                    .apply_task_ranks(&[TaskRankChange {
                        id: moved,
                        rank: 1,
                        list_id: Some(target_list),
                    }])
                    .await
            }
            Some(anchor_id) if source_list == target_list => {
                let plan = ordering::reorder(&self.ranked_tasks(&source_list), moved, anchor_id);
                if plan.is_empty() {
                    return Ok(());
                }
                debug!(
                    task = %moved,
                    list = %source_list,
                    writes = plan.len(),
                    "reordering task within list"
                );
                let changes: Vec<TaskRankChange> = plan
                    .into_iter()
                    .map(|c| TaskRankChange {
                        id: c.id,
                        rank: c.rank,
                        list_id: None,
                    })
                    .collect();
                self.store.apply_task_ranks(&changes).await
            }
            Some(anchor_id) => {
                let target_seq = self.ranked_tasks(&target_list);
                let Some((target_rank, shifts)) = ordering::open_slot(&target_seq, anchor_id)
                else {
                    return Ok(());
                };
                debug!(
                    task = %moved,
                    target = %target_list,
                    rank = target_rank,
                    shifts = shifts.len(),
                    "moving task across lists"
                );
                // The moved item is re-parented first, then the slot opens
                // beneath it in ascending rank order.
                let mut changes = Vec::with_capacity(shifts.len() + 1);
                changes.push(TaskRankChange {
                    id: moved,
                    rank: target_rank,
                    list_id: Some(target_list),
                });
                changes.extend(shifts.into_iter().map(|c| TaskRankChange {
                    id: c.id,
                    rank: c.rank,
                    list_id: None,
                }));
                self.store.apply_task_ranks(&changes).await
            }
        };

        self.finish_move(outcome).await
    }

    /// Refetches after a move and reports the move's outcome. The refetch
    /// happens whether or not the writes succeeded, so the snapshot always
    /// reflects what actually landed.
    async fn finish_move(&mut self, outcome: Result<()>) -> Result<()> {
        let refreshed = self.refresh().await;
        match outcome {
            Ok(()) => refreshed,
            Err(err) => {
                if let Err(refresh_err) = refreshed {
                    warn!(%refresh_err, "refetch after failed move also failed");
                }
                Err(err)
            }
        }
    }

    /// Replaces a task's text
    pub async fn edit_task_content(
        &mut self,
        id: TaskId,
        content: impl Into<String>,
    ) -> Result<()> {
        let patch = TaskPatch {
            content: Some(content.into()),
            ..TaskPatch::default()
        };
        self.store.update_task(&id, patch).await?;
        self.refresh().await
    }

    /// Changes a task's completion state, stamping or clearing `completed_at`
    pub async fn set_task_status(&mut self, id: TaskId, status: TaskStatus) -> Result<()> {
        let completed_at = match status {
            TaskStatus::Completed => Some(Utc::now()),
            TaskStatus::Pending => None,
        };
        let patch = TaskPatch {
            status: Some(status),
            completed_at: Some(completed_at),
            ..TaskPatch::default()
        };
        self.store.update_task(&id, patch).await?;
        self.refresh().await
    }

    pub async fn set_task_priority(&mut self, id: TaskId, priority: Priority) -> Result<()> {
        let patch = TaskPatch {
            priority: Some(priority),
            ..TaskPatch::default()
        };
        self.store.update_task(&id, patch).await?;
        self.refresh().await
    }

    pub async fn delete_task(&mut self, id: TaskId) -> Result<()> {
        self.store.delete_task(&id).await?;
        self.refresh().await
    }

    // --- subtask operations (field mutations on the parent task) ---

    /// Appends a subtask to a task
    pub async fn add_subtask(
        &mut self,
        task_id: TaskId,
        content: impl Into<String>,
    ) -> Result<Subtask> {
        let mut task = self
            .snapshot
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| TamiError::TaskNotFound(task_id.to_string()))?;
        let subtask = task.add_subtask(content.into());

        self.save_subtasks(task_id, task.subtasks).await?;
        Ok(subtask)
    }

    /// Changes one subtask's completion state
    pub async fn set_subtask_status(
        &mut self,
        task_id: TaskId,
        subtask_id: SubtaskId,
        status: TaskStatus,
    ) -> Result<()> {
        let mut task = self
            .snapshot
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| TamiError::TaskNotFound(task_id.to_string()))?;
        let subtask = task
            .subtask_mut(&subtask_id)
            .ok_or(TamiError::SubtaskNotFound)?;
        subtask.status = status;

        self.save_subtasks(task_id, task.subtasks).await
    }

    /// Removes a subtask from a task
    pub async fn remove_subtask(&mut self, task_id: TaskId, subtask_id: SubtaskId) -> Result<()> {
        let mut task = self
            .snapshot
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| TamiError::TaskNotFound(task_id.to_string()))?;
        task.remove_subtask(&subtask_id)?;

        self.save_subtasks(task_id, task.subtasks).await
    }

    async fn save_subtasks(&mut self, task_id: TaskId, subtasks: Vec<Subtask>) -> Result<()> {
        let patch = TaskPatch {
            subtasks: Some(subtasks),
            ..TaskPatch::default()
        };
        self.store.update_task(&task_id, patch).await?;
        self.refresh().await
    }
}
