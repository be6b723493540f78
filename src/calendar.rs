//! Google Calendar export for tasks.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::domain::{List, Priority, Task};

const BASE_URL: &str = "https://calendar.google.com/calendar/render";

/// Builds a prefilled Google Calendar event URL for a task: the task text as
/// the title, list and priority (and any subtasks) in the description, and a
/// 9:00–10:00 slot resolved from the task's due phrase when one is present.
pub fn google_calendar_url(task: &Task, list: &List, now: DateTime<Utc>) -> String {
    let mut details = vec![
        format!("List: {} {}", list.emoji, list.name),
        format!("Priority: {}", priority_label(task.priority)),
    ];

    if !task.subtasks.is_empty() {
        details.push(String::new());
        details.push("Subtasks:".to_string());
        for (i, subtask) in task.subtasks.iter().enumerate() {
            details.push(format!("{}. {}", i + 1, subtask.content));
        }
    }

    let mut url = format!(
        "{}?action=TEMPLATE&text={}&details={}",
        BASE_URL,
        encode(&task.content),
        encode(&details.join("\n")),
    );

    if let Some(due) = task.due.as_deref() {
        let (start, end) = resolve_due_date(due, now);
        url.push_str(&format!(
            "&dates={}/{}",
            start.format("%Y%m%dT%H%M%S"),
            end.format("%Y%m%dT%H%M%S"),
        ));
    }

    url
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "🔴 High Priority",
        Priority::Medium => "🟡 Medium Priority",
        Priority::Low => "🟢 Low Priority",
    }
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

/// Resolves a free-form due phrase to a concrete 9:00–10:00 event slot.
///
/// Recognizes the phrases the extractor emits ("today", "tomorrow", "next
/// week", "next month" and their Spanish counterparts) plus ISO dates;
/// anything unrecognized falls back to tomorrow.
pub fn resolve_due_date(due: &str, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let lowered = due.to_lowercase();
    let today = now.date_naive();

    let day = if lowered.contains("today") || lowered.contains("hoy") {
        today
    } else if lowered.contains("tomorrow") || lowered.contains("mañana") {
        today + Duration::days(1)
    } else if lowered.contains("next week") || lowered.contains("próxima semana") {
        today + Duration::days(7)
    } else if lowered.contains("next month") || lowered.contains("próximo mes") {
        (now + Months::new(1)).date_naive()
    } else if let Ok(parsed) = due.parse::<NaiveDate>() {
        parsed
    } else {
        today + Duration::days(1)
    };

    let start = day.and_hms_opt(9, 0, 0).unwrap_or_default().and_utc();
    (start, start + Duration::hours(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_resolve_today() {
        let (start, end) = resolve_due_date("today", fixed_now());
        assert_eq!(start.format("%Y%m%dT%H%M%S").to_string(), "20240614T090000");
        assert_eq!(end - start, Duration::hours(1));
    }

    #[test]
    fn test_resolve_tomorrow_spanish() {
        let (start, _) = resolve_due_date("mañana", fixed_now());
        assert_eq!(start.format("%Y%m%d").to_string(), "20240615");
    }

    #[test]
    fn test_resolve_next_week() {
        let (start, _) = resolve_due_date("next week", fixed_now());
        assert_eq!(start.format("%Y%m%d").to_string(), "20240621");
    }

    #[test]
    fn test_resolve_next_month() {
        let (start, _) = resolve_due_date("next month", fixed_now());
        assert_eq!(start.format("%Y%m%d").to_string(), "20240714");
    }

    #[test]
    fn test_resolve_iso_date() {
        let (start, _) = resolve_due_date("2024-12-25", fixed_now());
        assert_eq!(start.format("%Y%m%d").to_string(), "20241225");
    }

    #[test]
    fn test_resolve_unparseable_defaults_to_tomorrow() {
        let (start, _) = resolve_due_date("whenever you get to it", fixed_now());
        assert_eq!(start.format("%Y%m%d").to_string(), "20240615");
    }

    #[test]
    fn test_url_contains_template_and_dates() {
        let list = List::new("Work & Projects".to_string(), "💼".to_string(), 1);
        let mut task = Task::new(list.id, "Quarterly review".to_string(), 1);
        task.due = Some("tomorrow".to_string());
        task.add_subtask("Collect metrics".to_string());

        let url = google_calendar_url(&task, &list, fixed_now());

        assert!(url.starts_with(BASE_URL));
        assert!(url.contains("action=TEMPLATE"));
        assert!(url.contains("text=Quarterly%20review"));
        assert!(url.contains("&dates=20240615T090000/20240615T100000"));
        // Subtasks land in the description.
        assert!(url.contains("Subtasks"));
    }

    #[test]
    fn test_url_without_due_has_no_dates_param() {
        let list = List::new("Home".to_string(), "🏠".to_string(), 1);
        let task = Task::new(list.id, "Water plants".to_string(), 1);

        let url = google_calendar_url(&task, &list, fixed_now());
        assert!(!url.contains("&dates="));
    }

    #[test]
    fn test_ids_are_not_leaked_into_url() {
        let list = List::new("Home".to_string(), "🏠".to_string(), 1);
        let task = Task::new(list.id, "Water plants".to_string(), 1);

        let url = google_calendar_url(&task, &list, fixed_now());
        assert!(!url.contains(&list.id.to_string()));
    }
}
