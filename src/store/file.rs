use crate::{
    domain::{List, ListId, Task, TaskId},
    error::{Result, TamiError},
    store::{self, ItemStore, ListPatch, TaskPatch},
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based store: one pretty-printed JSON document per record under a
/// `.tami` directory.
pub struct FileStore {
    root_path: PathBuf,
}

impl FileStore {
    const TAMI_DIR: &'static str = ".tami";
    const LISTS_DIR: &'static str = "lists";
    const TASKS_DIR: &'static str = "tasks";

    /// Creates a new FileStore rooted at the given workspace directory
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: workspace_root.as_ref().join(Self::TAMI_DIR),
        }
    }

    fn lists_dir(&self) -> PathBuf {
        self.root_path.join(Self::LISTS_DIR)
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root_path.join(Self::TASKS_DIR)
    }

    fn list_file(&self, id: &ListId) -> PathBuf {
        self.lists_dir().join(format!("{}.json", id))
    }

    fn task_file(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn write_record<T: Serialize>(&self, path: PathBuf, record: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn read_records<T: DeserializeOwned>(&self, dir: PathBuf) -> Result<Vec<T>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                let contents = fs::read_to_string(&path).await?;
                records.push(serde_json::from_str(&contents)?);
            }
        }

        Ok(records)
    }

    async fn load_list(&self, id: &ListId) -> Result<List> {
        let path = self.list_file(id);
        if !path.exists() {
            return Err(TamiError::ListNotFound(id.to_string()));
        }
        let contents = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn load_task(&self, id: &TaskId) -> Result<Task> {
        let path = self.task_file(id);
        if !path.exists() {
            return Err(TamiError::TaskNotFound(id.to_string()));
        }
        let contents = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl ItemStore for FileStore {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.lists_dir()).await?;
        self.ensure_directory_exists(&self.tasks_dir()).await?;

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Local caches\n*.db\n*.db-*\n").await?;
        }

        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.lists_dir().exists() && self.tasks_dir().exists()
    }

    async fn list_lists(&self) -> Result<Vec<List>> {
        let mut lists: Vec<List> = self.read_records(self.lists_dir()).await?;
        store::sort_lists(&mut lists);
        Ok(lists)
    }

    async fn list_tasks(&self, list_id: &ListId) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.read_records(self.tasks_dir()).await?;
        tasks.retain(|t| &t.list_id == list_id);
        store::sort_tasks_within_list(&mut tasks);
        Ok(tasks)
    }

    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.read_records(self.tasks_dir()).await?;
        store::sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn insert_list(&self, list: &List) -> Result<()> {
        store::validate_list(list)?;
        self.ensure_directory_exists(&self.lists_dir()).await?;
        self.write_record(self.list_file(&list.id), list).await
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        store::validate_task(task)?;
        if !self.list_file(&task.list_id).exists() {
            return Err(TamiError::ConstraintViolation(format!(
                "task references unknown list {}",
                task.list_id
            )));
        }
        self.ensure_directory_exists(&self.tasks_dir()).await?;
        self.write_record(self.task_file(&task.id), task).await
    }

    async fn update_list(&self, id: &ListId, patch: ListPatch) -> Result<()> {
        let mut list = self.load_list(id).await?;
        patch.apply(&mut list);
        self.write_record(self.list_file(id), &list).await
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<()> {
        let mut task = self.load_task(id).await?;
        patch.apply(&mut task);
        self.write_record(self.task_file(id), &task).await
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        let path = self.list_file(id);
        if !path.exists() {
            return Err(TamiError::ListNotFound(id.to_string()));
        }
        fs::remove_file(path).await?;
        Ok(())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let path = self.task_file(id);
        if !path.exists() {
            return Err(TamiError::TaskNotFound(id.to_string()));
        }
        fs::remove_file(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskRankChange;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        assert!(!store.is_initialized().await);

        store.initialize().await.unwrap();

        assert!(store.is_initialized().await);
        assert!(store.lists_dir().exists());
        assert!(store.tasks_dir().exists());
    }

    #[tokio::test]
    async fn test_list_save_and_load_ordered() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        let second = List::new("Second".to_string(), "🏠".to_string(), 2);
        let first = List::new("First".to_string(), "💼".to_string(), 1);
        store.insert_list(&second).await.unwrap();
        store.insert_list(&first).await.unwrap();

        let lists = store.list_lists().await.unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].id, first.id);
        assert_eq!(lists[1].id, second.id);
    }

    #[tokio::test]
    async fn test_task_roundtrip_preserves_subtasks() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        let list = List::new("Work".to_string(), "💼".to_string(), 1);
        store.insert_list(&list).await.unwrap();

        let mut task = Task::new(list.id, "Plan launch".to_string(), 1);
        task.add_subtask("Draft announcement".to_string());
        task.add_subtask("Book venue".to_string());
        store.insert_task(&task).await.unwrap();

        let loaded = store.list_tasks(&list.id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].subtasks.len(), 2);
        assert_eq!(loaded[0].subtasks[0].content, "Draft announcement");
    }

    #[tokio::test]
    async fn test_insert_task_requires_known_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        let orphan = Task::new(ListId::new(), "Orphan".to_string(), 1);
        assert!(matches!(
            store.insert_task(&orphan).await,
            Err(TamiError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_task_patch() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        let list = List::new("Work".to_string(), "💼".to_string(), 1);
        store.insert_list(&list).await.unwrap();
        let task = Task::new(list.id, "Draft".to_string(), 1);
        store.insert_task(&task).await.unwrap();

        store
            .update_task(
                &task.id,
                TaskPatch {
                    rank: Some(4),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();

        let tasks = store.list_tasks(&list.id).await.unwrap();
        assert_eq!(tasks[0].rank, 4);
        assert_eq!(tasks[0].content, "Draft");
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        assert!(matches!(
            store.update_task(&TaskId::new(), TaskPatch::default()).await,
            Err(TamiError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_task_ranks_moves_across_lists() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        let work = List::new("Work".to_string(), "💼".to_string(), 1);
        let home = List::new("Home".to_string(), "🏠".to_string(), 2);
        store.insert_list(&work).await.unwrap();
        store.insert_list(&home).await.unwrap();

        let task = Task::new(work.id, "Errand".to_string(), 1);
        let anchor = Task::new(home.id, "Laundry".to_string(), 1);
        store.insert_task(&task).await.unwrap();
        store.insert_task(&anchor).await.unwrap();

        store
            .apply_task_ranks(&[
                TaskRankChange {
                    id: task.id,
                    rank: 1,
                    list_id: Some(home.id),
                },
                TaskRankChange {
                    id: anchor.id,
                    rank: 2,
                    list_id: None,
                },
            ])
            .await
            .unwrap();

        let home_tasks = store.list_tasks(&home.id).await.unwrap();
        let ids: Vec<TaskId> = home_tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![task.id, anchor.id]);
        assert!(store.list_tasks(&work.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_list_and_task() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        store.initialize().await.unwrap();

        let list = List::new("Scratch".to_string(), "📝".to_string(), 1);
        store.insert_list(&list).await.unwrap();
        let task = Task::new(list.id, "Note".to_string(), 1);
        store.insert_task(&task).await.unwrap();

        store.delete_task(&task.id).await.unwrap();
        store.delete_list(&list.id).await.unwrap();

        assert!(store.list_lists().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_list(&list.id).await,
            Err(TamiError::ListNotFound(_))
        ));
    }
}
