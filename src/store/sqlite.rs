use crate::{
    domain::{List, ListId, Priority, Subtask, Task, TaskId, TaskStatus},
    error::{Result, TamiError},
    store::{self, ItemStore, ListPatch, ListRankChange, TaskPatch, TaskRankChange},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

/// SQLite-backed store. Rank batches are applied inside a transaction, so a
/// move either lands whole or not at all and the partial-shift window of the
/// best-effort backends does not exist here.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS lists (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    emoji       TEXT NOT NULL,
    color       TEXT,
    rank        INTEGER NOT NULL,
    is_default  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tasks (
    id           TEXT PRIMARY KEY,
    list_id      TEXT NOT NULL REFERENCES lists(id),
    content      TEXT NOT NULL,
    status       TEXT NOT NULL,
    priority     TEXT NOT NULL,
    due          TEXT,
    raw_input    TEXT,
    rank         INTEGER NOT NULL,
    subtasks     TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_tasks_list ON tasks(list_id, rank);
";

fn sql_err(err: rusqlite::Error) -> TamiError {
    TamiError::StorageError(err.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TamiError::StorageError(format!("bad timestamp {}: {}", raw, e)))
}

struct ListRow {
    id: String,
    name: String,
    emoji: String,
    color: Option<String>,
    rank: u32,
    is_default: bool,
    created_at: String,
}

impl ListRow {
    fn into_list(self) -> Result<List> {
        Ok(List {
            id: ListId::from_str(&self.id)?,
            name: self.name,
            emoji: self.emoji,
            color: self.color,
            rank: self.rank,
            is_default: self.is_default,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct TaskRow {
    id: String,
    list_id: String,
    content: String,
    status: String,
    priority: String,
    due: Option<String>,
    raw_input: Option<String>,
    rank: u32,
    subtasks: String,
    created_at: String,
    completed_at: Option<String>,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        let subtasks: Vec<Subtask> = serde_json::from_str(&self.subtasks)?;
        Ok(Task {
            id: TaskId::from_str(&self.id)?,
            list_id: ListId::from_str(&self.list_id)?,
            content: self.content,
            status: TaskStatus::from_str(&self.status)?,
            priority: Priority::from_str(&self.priority)?,
            due: self.due,
            raw_input: self.raw_input,
            rank: self.rank,
            subtasks,
            created_at: parse_timestamp(&self.created_at)?,
            completed_at: match self.completed_at {
                Some(raw) => Some(parse_timestamp(&raw)?),
                None => None,
            },
        })
    }
}

fn read_list_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListRow> {
    Ok(ListRow {
        id: row.get(0)?,
        name: row.get(1)?,
        emoji: row.get(2)?,
        color: row.get(3)?,
        rank: row.get(4)?,
        is_default: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn read_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        list_id: row.get(1)?,
        content: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        due: row.get(5)?,
        raw_input: row.get(6)?,
        rank: row.get(7)?,
        subtasks: row.get(8)?,
        created_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

const TASK_COLUMNS: &str =
    "id, list_id, content, status, priority, due, raw_input, rank, subtasks, created_at, completed_at";

impl SqliteStore {
    /// Opens (creating if needed) a database at the given path
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(database_path).map_err(sql_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn write_task(conn: &Connection, task: &Task) -> Result<()> {
        let subtasks = serde_json::to_string(&task.subtasks)?;
        conn.execute(
            "INSERT OR REPLACE INTO tasks (id, list_id, content, status, priority, due, raw_input, rank, subtasks, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id.to_string(),
                task.list_id.to_string(),
                task.content,
                task.status.as_str(),
                task.priority.as_str(),
                task.due,
                task.raw_input,
                task.rank,
                subtasks,
                task.created_at.to_rfc3339(),
                task.completed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    fn write_list(conn: &Connection, list: &List) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO lists (id, name, emoji, color, rank, is_default, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                list.id.to_string(),
                list.name,
                list.emoji,
                list.color,
                list.rank,
                list.is_default,
                list.created_at.to_rfc3339(),
            ],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    fn load_list(conn: &Connection, id: &ListId) -> Result<List> {
        let row = conn
            .query_row(
                "SELECT id, name, emoji, color, rank, is_default, created_at FROM lists WHERE id = ?1",
                params![id.to_string()],
                read_list_row,
            )
            .optional()
            .map_err(sql_err)?;
        match row {
            Some(row) => row.into_list(),
            None => Err(TamiError::ListNotFound(id.to_string())),
        }
    }

    fn load_task(conn: &Connection, id: &TaskId) -> Result<Task> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id.to_string()],
                read_task_row,
            )
            .optional()
            .map_err(sql_err)?;
        match row {
            Some(row) => row.into_task(),
            None => Err(TamiError::TaskNotFound(id.to_string())),
        }
    }

    fn list_exists(conn: &Connection, id: &ListId) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM lists WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(SCHEMA).map_err(sql_err)
    }

    async fn is_initialized(&self) -> bool {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'lists'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|found| found.is_some())
        .unwrap_or(false)
    }

    async fn list_lists(&self) -> Result<Vec<List>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT id, name, emoji, color, rank, is_default, created_at FROM lists")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], read_list_row)
            .map_err(sql_err)?
            .collect::<rusqlite::Result<Vec<ListRow>>>()
            .map_err(sql_err)?;

        let mut lists = rows
            .into_iter()
            .map(ListRow::into_list)
            .collect::<Result<Vec<List>>>()?;
        store::sort_lists(&mut lists);
        Ok(lists)
    }

    async fn list_tasks(&self, list_id: &ListId) -> Result<Vec<Task>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tasks WHERE list_id = ?1",
                TASK_COLUMNS
            ))
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![list_id.to_string()], read_task_row)
            .map_err(sql_err)?
            .collect::<rusqlite::Result<Vec<TaskRow>>>()
            .map_err(sql_err)?;

        let mut tasks = rows
            .into_iter()
            .map(TaskRow::into_task)
            .collect::<Result<Vec<Task>>>()?;
        store::sort_tasks_within_list(&mut tasks);
        Ok(tasks)
    }

    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM tasks", TASK_COLUMNS))
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], read_task_row)
            .map_err(sql_err)?
            .collect::<rusqlite::Result<Vec<TaskRow>>>()
            .map_err(sql_err)?;

        let mut tasks = rows
            .into_iter()
            .map(TaskRow::into_task)
            .collect::<Result<Vec<Task>>>()?;
        store::sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn insert_list(&self, list: &List) -> Result<()> {
        store::validate_list(list)?;
        let conn = self.conn.lock().await;
        Self::write_list(&conn, list)
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        store::validate_task(task)?;
        let conn = self.conn.lock().await;
        if !Self::list_exists(&conn, &task.list_id)? {
            return Err(TamiError::ConstraintViolation(format!(
                "task references unknown list {}",
                task.list_id
            )));
        }
        Self::write_task(&conn, task)
    }

    async fn update_list(&self, id: &ListId, patch: ListPatch) -> Result<()> {
        let conn = self.conn.lock().await;
        let mut list = Self::load_list(&conn, id)?;
        patch.apply(&mut list);
        Self::write_list(&conn, &list)
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<()> {
        let conn = self.conn.lock().await;
        let mut task = Self::load_task(&conn, id)?;
        patch.apply(&mut task);
        Self::write_task(&conn, &task)
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute("DELETE FROM lists WHERE id = ?1", params![id.to_string()])
            .map_err(sql_err)?;
        if affected == 0 {
            return Err(TamiError::ListNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])
            .map_err(sql_err)?;
        if affected == 0 {
            return Err(TamiError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn apply_list_ranks(&self, changes: &[ListRankChange]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(sql_err)?;
        for change in changes {
            let affected = tx
                .execute(
                    "UPDATE lists SET rank = ?1 WHERE id = ?2",
                    params![change.rank, change.id.to_string()],
                )
                .map_err(sql_err)?;
            if affected == 0 {
                tracing::warn!(list = %change.id, "skipping rank write for vanished list");
            }
        }
        tx.commit().map_err(sql_err)
    }

    async fn apply_task_ranks(&self, changes: &[TaskRankChange]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(sql_err)?;
        for change in changes {
            let affected = match change.list_id {
                Some(list_id) => tx.execute(
                    "UPDATE tasks SET rank = ?1, list_id = ?2 WHERE id = ?3",
                    params![change.rank, list_id.to_string(), change.id.to_string()],
                ),
                None => tx.execute(
                    "UPDATE tasks SET rank = ?1 WHERE id = ?2",
                    params![change.rank, change.id.to_string()],
                ),
            }
            .map_err(sql_err)?;
            if affected == 0 {
                tracing::warn!(task = %change.id, "skipping rank write for vanished task");
            }
        }
        tx.commit().map_err(sql_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (SqliteStore, List) {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();
        let list = List::new("Work".to_string(), "💼".to_string(), 1);
        store.insert_list(&list).await.unwrap();
        (store, list)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.is_initialized().await);
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert!(store.is_initialized().await);
    }

    #[tokio::test]
    async fn test_task_roundtrip() {
        let (store, list) = seeded().await;

        let mut task = Task::new(list.id, "Ship release".to_string(), 1);
        task.set_priority(Priority::High);
        task.due = Some("next friday".to_string());
        task.add_subtask("Tag version".to_string());
        store.insert_task(&task).await.unwrap();

        let loaded = store.list_tasks(&list.id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].priority, Priority::High);
        assert_eq!(loaded[0].due.as_deref(), Some("next friday"));
        assert_eq!(loaded[0].subtasks.len(), 1);
        assert_eq!(loaded[0].created_at, task.created_at);
    }

    #[tokio::test]
    async fn test_insert_task_requires_known_list() {
        let (store, _list) = seeded().await;
        let orphan = Task::new(ListId::new(), "Orphan".to_string(), 1);
        assert!(matches!(
            store.insert_task(&orphan).await,
            Err(TamiError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_task_patch() {
        let (store, list) = seeded().await;
        let task = Task::new(list.id, "Draft".to_string(), 1);
        store.insert_task(&task).await.unwrap();

        store
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    completed_at: Some(Some(Utc::now())),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.list_tasks(&list.id).await.unwrap();
        assert_eq!(loaded[0].status, TaskStatus::Completed);
        assert!(loaded[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let (store, _list) = seeded().await;
        assert!(matches!(
            store.update_task(&TaskId::new(), TaskPatch::default()).await,
            Err(TamiError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_task_ranks_batch() {
        let (store, work) = seeded().await;
        let home = List::new("Home".to_string(), "🏠".to_string(), 2);
        store.insert_list(&home).await.unwrap();

        let moved = Task::new(work.id, "Errand".to_string(), 1);
        let anchor = Task::new(home.id, "Laundry".to_string(), 1);
        store.insert_task(&moved).await.unwrap();
        store.insert_task(&anchor).await.unwrap();

        store
            .apply_task_ranks(&[
                TaskRankChange {
                    id: moved.id,
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
        assert_eq!(ids, vec![moved.id, anchor.id]);
        assert!(store.list_tasks(&work.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_ranks_tolerates_vanished_rows() {
        let (store, work) = seeded().await;
        let task = Task::new(work.id, "Survivor".to_string(), 2);
        store.insert_task(&task).await.unwrap();

        store
            .apply_task_ranks(&[
                TaskRankChange {
                    id: TaskId::new(),
                    rank: 9,
                    list_id: None,
                },
                TaskRankChange {
                    id: task.id,
                    rank: 1,
                    list_id: None,
                },
            ])
            .await
            .unwrap();

        let tasks = store.list_tasks(&work.id).await.unwrap();
        assert_eq!(tasks[0].rank, 1);
    }
}
