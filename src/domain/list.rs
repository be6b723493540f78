use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Unique identifier for a list (a board column)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ListId(Uuid);

impl ListId {
    /// Creates a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ListId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListId {
    type Err = crate::error::TamiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| crate::error::TamiError::Other(format!("Invalid list id: {}", s)))
    }
}

/// A board column owning an ordered run of tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub name: String,
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Position among sibling lists, 1-based, ascending = display order
    pub rank: u32,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl List {
    /// Creates a new list at the given rank
    pub fn new(name: String, emoji: String, rank: u32) -> Self {
        Self {
            id: ListId::new(),
            name,
            emoji,
            color: None,
            rank,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    /// Marks this list as the fallback target for reassigned tasks
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Updates the display name and emoji
    pub fn rename(&mut self, name: String, emoji: String) {
        self.name = name;
        self.emoji = emoji;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_id_roundtrip() {
        let id = ListId::new();
        let parsed = ListId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        assert!(ListId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_list_creation() {
        let list = List::new("Work & Projects".to_string(), "💼".to_string(), 1);
        assert_eq!(list.rank, 1);
        assert!(!list.is_default);
        assert!(list.color.is_none());
    }

    #[test]
    fn test_as_default() {
        let list = List::new("Quick Ideas".to_string(), "💡".to_string(), 4).as_default();
        assert!(list.is_default);
    }

    #[test]
    fn test_rename() {
        let mut list = List::new("Shopping".to_string(), "🛒".to_string(), 2);
        list.rename("Groceries".to_string(), "🥕".to_string());
        assert_eq!(list.name, "Groceries");
        assert_eq!(list.emoji, "🥕");
    }

    #[test]
    fn test_list_serialization_skips_missing_color() {
        let list = List::new("Work".to_string(), "💼".to_string(), 1);
        let json = serde_json::to_string(&list).unwrap();
        assert!(!json.contains("color"));

        let deserialized: List = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, list.id);
        assert_eq!(deserialized.rank, 1);
    }
}
