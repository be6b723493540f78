//! Wire contract with the language-extraction collaborator.
//!
//! The language model is asked to answer with a JSON document matching
//! [`Extraction`]; this module owns that contract, the response parser, and
//! the offline keyword classifier used when no model response is available.
//! The request cycle and prompt text live with the caller.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ListId, Priority, Task, TaskStatus},
    error::{Result, TamiError},
};

/// What the user asked for, as classified by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateTask,
    ModifyTask,
    QueryList,
}

/// Legacy list hint used when the extractor cannot name a concrete list id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    WorkProjects,
    PersonalHome,
    Shopping,
    QuickIdeas,
}

impl Category {
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::WorkProjects => &["work", "project"],
            Self::PersonalHome => &["personal", "home"],
            Self::Shopping => &["shop"],
            Self::QuickIdeas => &["idea", "quick"],
        }
    }

    /// Pairs the hint with a list by name
    pub fn matches(&self, list_name: &str) -> bool {
        let name = list_name.to_lowercase();
        self.keywords().iter().any(|k| name.contains(k))
    }
}

/// An unranked subtask as supplied by the extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskDraft {
    pub content: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Zero-based position within the draft, per the wire contract
    #[serde(default)]
    pub order_index: Option<u32>,
}

/// An unranked task as supplied by the extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub content: String,
    #[serde(default)]
    pub list_id: Option<ListId>,
    #[serde(default, rename = "list_category")]
    pub category: Option<Category>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, rename = "suggested_due_date")]
    pub due: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskDraft>,
}

impl TaskDraft {
    fn new(content: String) -> Self {
        Self {
            content,
            list_id: None,
            category: None,
            status: None,
            due: None,
            priority: None,
            subtasks: Vec::new(),
        }
    }

    /// Materializes the draft as a pending task at the given rank. Subtask
    /// drafts are ordered by their wire `order_index` and re-ranked 1..N.
    pub fn to_task(&self, list_id: ListId, rank: u32) -> Task {
        let mut task = Task::new(list_id, self.content.clone(), rank);
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        task.due = self.due.clone();

        let mut drafts = self.subtasks.clone();
        drafts.sort_by_key(|d| d.order_index.unwrap_or(u32::MAX));
        for draft in drafts {
            task.add_subtask(draft.content);
        }
        task
    }
}

/// A full extractor response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub intent: Intent,
    #[serde(default)]
    pub tasks: Vec<TaskDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Parses the raw model response into an [`Extraction`].
///
/// Model output frequently arrives wrapped in a fenced markdown block; the
/// fence is stripped before parsing.
pub fn parse_extraction(raw: &str) -> Result<Extraction> {
    let text = strip_code_fence(raw);
    serde_json::from_str(text)
        .map_err(|e| TamiError::InvalidExtraction(format!("malformed extraction JSON: {}", e)))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

const CONNECTORS: [&str; 5] = [" y ", " también ", " ademas ", " and ", " also "];

const HIGH_PRIORITY_WORDS: [&str; 7] =
    ["urgente", "asap", "hoy", "today", "crítico", "importante", "ya"];
const LOW_PRIORITY_WORDS: [&str; 6] =
    ["idea", "pensar", "quizás", "maybe", "futuro", "algún día"];

const CATEGORY_KEYWORDS: [(Category, &[&str]); 4] = [
    (
        Category::Shopping,
        &["comprar", "leche", "pan", "supermercado", "tienda", "café", "buy", "shop"],
    ),
    (
        Category::WorkProjects,
        &["proyecto", "revisar", "informe", "cliente", "reunión", "presupuesto", "email", "project", "work"],
    ),
    (
        Category::PersonalHome,
        &["mamá", "casa", "limpiar", "llamar", "cita", "médico", "gimnasio", "call", "mom", "home"],
    ),
    (
        Category::QuickIdeas,
        &["idea", "pensar", "investigar", "recordar", "remind", "note"],
    ),
];

/// Offline keyword classifier. Splits compound requests on connector words
/// and derives a category, priority and due hint for each segment. Used as
/// the fallback engine when no model response is available.
pub fn classify(input: &str) -> Extraction {
    let mut lowered = input.to_lowercase();
    for connector in CONNECTORS {
        lowered = lowered.replace(connector, "\u{1}");
    }

    let mut tasks = Vec::new();
    for segment in lowered.split('\u{1}') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let category = CATEGORY_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| segment.contains(w)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::QuickIdeas);

        let priority = if HIGH_PRIORITY_WORDS.iter().any(|w| segment.contains(w)) {
            Priority::High
        } else if LOW_PRIORITY_WORDS.iter().any(|w| segment.contains(w)) {
            Priority::Low
        } else {
            Priority::Medium
        };

        let due = (segment.contains("mañana") || segment.contains("tomorrow"))
            .then(|| "Tomorrow".to_string());

        let mut draft = TaskDraft::new(capitalize(segment));
        draft.category = Some(category);
        draft.priority = Some(priority);
        draft.due = due;
        tasks.push(draft);
    }

    Extraction {
        intent: Intent::CreateTask,
        tasks,
        message: None,
    }
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
