use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use thiserror::Error;

pub type TaskId = i64;
pub type CategoryId = i64;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub const DEFAULT_ICON: &str = "Default";
pub const DEFAULT_COLOR: &str = "#4CAF50";

#[derive(Error, Debug)]
pub enum Error {
    #[error("task title cannot be empty")]
    EmptyTitle,
    #[error("category name cannot be empty")]
    EmptyCategoryName,
    #[error("invalid color `{0}`, expected #RRGGBB")]
    InvalidColor(String),
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time `{0}`, expected HH:MM")]
    InvalidTime(String),
    #[error("unknown priority `{0}`, expected low, medium or high")]
    InvalidPriority(String),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl TaskFilter {
    /// Next filter in the cycle used by the list view.
    pub fn next(self) -> Self {
        match self {
            TaskFilter::All => TaskFilter::Pending,
            TaskFilter::Pending => TaskFilter::Completed,
            TaskFilter::Completed => TaskFilter::All,
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => !task.done,
            TaskFilter::Completed => task.done,
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskFilter::All => "all",
            TaskFilter::Pending => "pending",
            TaskFilter::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(Error::InvalidPriority(s.to_string())),
        }
    }
}

/// A task's due date with an optional time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl Deadline {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Deadline { date, time }
    }

    /// The moment the deadline falls due. A deadline without a time is due
    /// at the start of its day.
    pub fn instant(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or_default())
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format(DATE_FORMAT))?;
        if let Some(time) = self.time {
            write!(f, " {}", time.format(TIME_FORMAT))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub done: bool,
    pub created_on: NaiveDate,
    pub completed_on: Option<NaiveDate>,
    pub category_id: Option<CategoryId>,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub deadline: Option<Deadline>,
    pub priority: Option<Priority>,
}

impl Task {
    pub fn new(id: Option<TaskId>, title: &str, created_on: NaiveDate) -> Self {
        Task {
            id: id.unwrap_or(0_i64),
            title: title.trim().to_string(),
            done: false,
            created_on,
            completed_on: None,
            category_id: None,
            category: None,
            tags: BTreeSet::new(),
            deadline: None,
            priority: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub color: String,
}

/// Validated input for creating or editing a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    pub color: String,
}

impl NewCategory {
    pub fn new(name: &str, icon: Option<&str>, color: Option<&str>) -> Result<Self, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyCategoryName);
        }
        let icon = icon.map(str::trim).filter(|i| !i.is_empty()).unwrap_or(DEFAULT_ICON);
        let color = validate_color(color.unwrap_or(DEFAULT_COLOR))?;
        Ok(NewCategory {
            name: name.to_string(),
            icon: icon.to_string(),
            color,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
}

impl TaskSummary {
    pub fn new(total: i64, completed: i64) -> Self {
        TaskSummary {
            total,
            completed,
            pending: total - completed,
        }
    }
}

/// Trims a task title, rejecting titles that are blank.
pub fn normalize_title(title: &str) -> Result<&str, Error> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::EmptyTitle);
    }
    Ok(title)
}

/// Canonical form of a tag: trimmed, without a leading `#`, lowercase.
/// Returns `None` for tags that end up empty or contain a comma.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    let tag = tag.strip_prefix('#').unwrap_or(tag).trim();
    if tag.is_empty() || tag.contains(',') {
        None
    } else {
        Some(tag.to_lowercase())
    }
}

/// Accepts `#RRGGBB` colors, returned uppercase.
pub fn validate_color(color: &str) -> Result<String, Error> {
    let trimmed = color.trim();
    match trimmed.strip_prefix('#') {
        Some(hex) if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(trimmed.to_ascii_uppercase())
        }
        _ => Err(Error::InvalidColor(color.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_are_rejected() {
        assert!(matches!(normalize_title("   \t "), Err(Error::EmptyTitle)));
        assert_eq!(normalize_title("  Buy milk ").unwrap(), "Buy milk");
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(normalize_tag(" #Errand "), Some("errand".to_string()));
        assert_eq!(normalize_tag("#"), None);
        assert_eq!(normalize_tag("   "), None);
        assert_eq!(normalize_tag("#red,blue"), None);
    }

    #[test]
    fn filter_matches_done_state() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let mut task = Task::new(Some(1), "Buy milk", today);
        assert!(TaskFilter::All.matches(&task));
        assert!(TaskFilter::Pending.matches(&task));
        assert!(!TaskFilter::Completed.matches(&task));

        task.done = true;
        assert!(TaskFilter::All.matches(&task));
        assert!(!TaskFilter::Pending.matches(&task));
        assert!(TaskFilter::Completed.matches(&task));
    }

    #[test]
    fn colors_must_be_hex() {
        assert_eq!(validate_color("#2196f3").unwrap(), "#2196F3");
        assert!(validate_color("2196F3").is_err());
        assert!(validate_color("#21963").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }

    #[test]
    fn new_category_defaults() {
        let category = NewCategory::new(" Garden ", None, None).unwrap();
        assert_eq!(category.name, "Garden");
        assert_eq!(category.icon, DEFAULT_ICON);
        assert_eq!(category.color, DEFAULT_COLOR);
        assert!(matches!(
            NewCategory::new("  ", None, None),
            Err(Error::EmptyCategoryName)
        ));
    }

    #[test]
    fn priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn deadline_without_time_is_due_at_midnight() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let deadline = Deadline::new(date, None);
        assert_eq!(deadline.instant(), date.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(deadline.to_string(), "2025-03-31");

        let timed = Deadline::new(date, NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(timed.to_string(), "2025-03-31 14:30");
    }

    #[test]
    fn summary_pending_is_derived() {
        assert_eq!(TaskSummary::new(0, 0), TaskSummary::default());
        assert_eq!(TaskSummary::new(5, 2).pending, 3);
    }
}
