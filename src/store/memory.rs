use crate::{
    domain::{List, ListId, Task, TaskId},
    error::{Result, TamiError},
    store::{self, ItemStore, ListPatch, TaskPatch},
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// In-memory store, the default backend for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    initialized: bool,
    lists: HashMap<ListId, List>,
    tasks: HashMap<TaskId, Task>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn initialize(&self) -> Result<()> {
        self.lock().initialized = true;
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    async fn list_lists(&self) -> Result<Vec<List>> {
        let mut lists: Vec<List> = self.lock().lists.values().cloned().collect();
        store::sort_lists(&mut lists);
        Ok(lists)
    }

    async fn list_tasks(&self, list_id: &ListId) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .lock()
            .tasks
            .values()
            .filter(|t| &t.list_id == list_id)
            .cloned()
            .collect();
        store::sort_tasks_within_list(&mut tasks);
        Ok(tasks)
    }

    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.lock().tasks.values().cloned().collect();
        store::sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn insert_list(&self, list: &List) -> Result<()> {
        store::validate_list(list)?;
        let mut inner = self.lock();
        if inner.lists.contains_key(&list.id) {
            return Err(TamiError::ConstraintViolation(format!(
                "duplicate list id {}",
                list.id
            )));
        }
        inner.lists.insert(list.id, list.clone());
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        store::validate_task(task)?;
        let mut inner = self.lock();
        if !inner.lists.contains_key(&task.list_id) {
            return Err(TamiError::ConstraintViolation(format!(
                "task references unknown list {}",
                task.list_id
            )));
        }
        if inner.tasks.contains_key(&task.id) {
            return Err(TamiError::ConstraintViolation(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        inner.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_list(&self, id: &ListId, patch: ListPatch) -> Result<()> {
        let mut inner = self.lock();
        match inner.lists.get_mut(id) {
            Some(list) => {
                patch.apply(list);
                Ok(())
            }
            None => Err(TamiError::ListNotFound(id.to_string())),
        }
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<()> {
        let mut inner = self.lock();
        match inner.tasks.get_mut(id) {
            Some(task) => {
                patch.apply(task);
                Ok(())
            }
            None => Err(TamiError::TaskNotFound(id.to_string())),
        }
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        match self.lock().lists.remove(id) {
            Some(_) => Ok(()),
            None => Err(TamiError::ListNotFound(id.to_string())),
        }
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        match self.lock().tasks.remove(id) {
            Some(_) => Ok(()),
            None => Err(TamiError::TaskNotFound(id.to_string())),
        }
    }
}
