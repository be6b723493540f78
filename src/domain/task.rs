use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::domain::list::ListId;

/// Unique identifier for a task
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = crate::error::TamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| crate::error::TamiError::Other(format!("Invalid task id: {}", s)))
    }
}

/// Unique identifier for a subtask
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SubtaskId(Uuid);

impl SubtaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubtaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion state of a task or subtask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    /// Wire/storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = crate::error::TamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(crate::error::TamiError::Other(format!(
                "Invalid task status: {}",
                s
            ))),
        }
    }
}

/// Urgency assigned by the user or the language extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Wire/storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

impl FromStr for Priority {
    type Err = crate::error::TamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(crate::error::TamiError::Other(format!(
                "Invalid priority: {}",
                s
            ))),
        }
    }
}

/// A step carried inside its parent task record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub content: String,
    pub status: TaskStatus,
    /// Position among sibling subtasks, 1-based
    pub rank: u32,
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(content: String, rank: u32) -> Self {
        Self {
            id: SubtaskId::new(),
            content,
            status: TaskStatus::Pending,
            rank,
            created_at: Utc::now(),
        }
    }

    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
    }

    pub fn mark_pending(&mut self) {
        self.status = TaskStatus::Pending;
    }

    pub fn toggle(&mut self) {
        match self.status {
            TaskStatus::Pending => self.mark_completed(),
            TaskStatus::Completed => self.mark_pending(),
        }
    }
}

/// A task on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub list_id: ListId,
    pub content: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// Free-form due phrase from the extractor ("tomorrow", "next friday", ISO date)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<String>,
    /// Position among siblings in the owning list, 1-based
    pub rank: u32,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a new pending task at the given rank
    pub fn new(list_id: ListId, content: String, rank: u32) -> Self {
        Self {
            id: TaskId::new(),
            list_id,
            content,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            due: None,
            raw_input: None,
            rank,
            subtasks: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Replaces the task text
    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    /// Changes the completion state, stamping or clearing `completed_at`
    pub fn set_status(&mut self, status: TaskStatus) {
        self.completed_at = match status {
            TaskStatus::Completed => Some(Utc::now()),
            TaskStatus::Pending => None,
        };
        self.status = status;
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Appends a subtask one past the current maximum subtask rank
    pub fn add_subtask(&mut self, content: String) -> Subtask {
        let rank = self.subtasks.iter().map(|s| s.rank).max().unwrap_or(0) + 1;
        let subtask = Subtask::new(content, rank);
        self.subtasks.push(subtask.clone());
        subtask
    }

    pub fn subtask_mut(&mut self, id: &SubtaskId) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| &s.id == id)
    }

    /// Removes a subtask by id
    pub fn remove_subtask(&mut self, id: &SubtaskId) -> Result<(), crate::error::TamiError> {
        match self.subtasks.iter().position(|s| &s.id == id) {
            Some(pos) => {
                self.subtasks.remove(pos);
                Ok(())
            }
            None => Err(crate::error::TamiError::SubtaskNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task::new(ListId::new(), "Buy milk".to_string(), 1)
    }

    #[test]
    fn test_task_id_roundtrip() {
        let id = TaskId::new();
        let parsed = TaskId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        assert!(TaskId::from_str("garbage").is_err());
    }

    #[test]
    fn test_new_task_defaults() {
        let task = sample_task();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.rank, 1);
        assert!(task.subtasks.is_empty());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_set_status_stamps_completed_at() {
        let mut task = sample_task();

        task.set_status(TaskStatus::Completed);
        assert!(task.is_completed());
        assert!(task.completed_at.is_some());

        task.set_status(TaskStatus::Pending);
        assert!(!task.is_completed());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_add_subtask_ranks() {
        let mut task = sample_task();

        let first = task.add_subtask("Find keys".to_string());
        let second = task.add_subtask("Drive to store".to_string());

        assert_eq!(first.rank, 1);
        assert_eq!(second.rank, 2);
        assert_eq!(task.subtasks.len(), 2);
    }

    #[test]
    fn test_add_subtask_after_removal_keeps_ranks_unique() {
        let mut task = sample_task();

        let first = task.add_subtask("One".to_string());
        let second = task.add_subtask("Two".to_string());
        task.remove_subtask(&first.id).unwrap();

        let third = task.add_subtask("Three".to_string());
        assert_eq!(third.rank, second.rank + 1);
    }

    #[test]
    fn test_remove_subtask_missing() {
        let mut task = sample_task();
        assert!(matches!(
            task.remove_subtask(&SubtaskId::new()),
            Err(crate::error::TamiError::SubtaskNotFound)
        ));
    }

    #[test]
    fn test_subtask_toggle() {
        let mut subtask = Subtask::new("Step".to_string(), 1);
        assert_eq!(subtask.status, TaskStatus::Pending);

        subtask.toggle();
        assert_eq!(subtask.status, TaskStatus::Completed);

        subtask.toggle();
        assert_eq!(subtask.status, TaskStatus::Pending);
    }

    #[test]
    fn test_status_and_priority_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        assert!("critical".parse::<Priority>().is_err());
    }

    #[test]
    fn test_task_serialization_skips_absent_options() {
        let task = sample_task();
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("due"));
        assert!(!json.contains("completed_at"));
        assert!(!json.contains("raw_input"));
    }

    #[test]
    fn test_backwards_compatibility_deserialization() {
        let old_json = format!(
            r#"{{
            "id": "{}",
            "list_id": "{}",
            "content": "Old task",
            "status": "pending",
            "priority": "medium",
            "rank": 3,
            "created_at": "2024-01-01T00:00:00Z"
        }}"#,
            TaskId::new(),
            ListId::new()
        );

        let task: Task = serde_json::from_str(&old_json).unwrap();
        assert_eq!(task.rank, 3);
        assert!(task.subtasks.is_empty());
        assert!(task.due.is_none());
    }
}
