/*!
    The task store used by the CLI and the list view.

    Storage errors never reach the caller: each operation logs the
    failure and hands back a neutral value (`false`, an empty list,
    a zeroed summary).
!*/
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, error, warn};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::content_parser::{QuickTask, parse_tag_list};
use crate::database;
use crate::tasklet::{
    Category, CategoryId, CategoryStats, Deadline, NewCategory, Priority, Task, TaskFilter,
    TaskId, TaskSummary, normalize_tag, normalize_title,
};

pub struct TaskStore {
    pool: SqlitePool,
}

/// Logs a storage error and substitutes `fallback`.
fn or_log<T>(operation: &str, res: Result<T, sqlx::Error>, fallback: T) -> T {
    match res {
        Ok(value) => value,
        Err(e) => {
            error!("Error {operation}: {e}");
            fallback
        }
    }
}

fn succeeded<T>(operation: &str, res: Result<T, sqlx::Error>) -> bool {
    or_log(operation, res.map(|_| true), false)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl TaskStore {
    /// Opens (creating if missing) the database file and applies migrations.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        debug!("Opened task store at {}", path.display());
        Ok(TaskStore { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Adds an incomplete task stamped with today's date.
    pub async fn add_task(&self, title: &str) -> bool {
        self.create_task(title).await.is_some()
    }

    /// Like `add_task`, but returns the new task's id.
    pub async fn create_task(&self, title: &str) -> Option<TaskId> {
        let title = match normalize_title(title) {
            Ok(title) => title,
            Err(e) => {
                warn!("Error adding task: {e}");
                return None;
            }
        };
        or_log(
            "adding task",
            database::insert_task(&self.pool, title, today()).await.map(Some),
            None,
        )
    }

    /// Adds a parsed quick-add line: the task, its deadline, tags and
    /// priority are written together or not at all.
    pub async fn add_quick_task(&self, quick: &QuickTask) -> Option<TaskId> {
        let title = match normalize_title(&quick.title) {
            Ok(title) => title,
            Err(e) => {
                warn!("Error adding task: {e}");
                return None;
            }
        };
        let tags: BTreeSet<String> = quick.tags.iter().flat_map(|t| parse_tag_list(t)).collect();
        let res = database::insert_task_with_details(
            &self.pool,
            title,
            today(),
            quick.deadline,
            &tags,
            quick.priority,
        )
        .await;
        or_log("adding task", res.map(Some), None)
    }

    pub async fn get_task(&self, id: TaskId) -> Option<Task> {
        or_log("getting task", database::get_task(&self.pool, id).await, None)
    }

    pub async fn get_tasks(&self, filter: TaskFilter) -> Vec<Task> {
        or_log(
            "getting tasks",
            database::list_tasks(&self.pool, filter).await,
            vec![],
        )
    }

    /// Marks a task completed or pending. Unknown ids are a successful no-op.
    pub async fn mark_done(&self, id: TaskId, done: bool) -> bool {
        succeeded(
            "marking task",
            database::set_done(&self.pool, id, done, today()).await,
        )
    }

    pub async fn rename_task(&self, id: TaskId, title: &str) -> bool {
        match normalize_title(title) {
            Ok(title) => succeeded(
                "renaming task",
                database::rename_task(&self.pool, id, title).await,
            ),
            Err(e) => {
                warn!("Error renaming task: {e}");
                false
            }
        }
    }

    pub async fn delete_task(&self, id: TaskId) -> bool {
        succeeded(
            "deleting task",
            database::delete_task(&self.pool, id).await,
        )
    }

    pub async fn get_task_summary(&self) -> TaskSummary {
        or_log(
            "getting summary",
            database::task_summary(&self.pool).await,
            TaskSummary::default(),
        )
    }

    /// Completed tasks per creation date. A task finished days after it was
    /// created is still counted under the day it was created.
    pub async fn get_stats(&self) -> BTreeMap<NaiveDate, i64> {
        or_log(
            "getting stats",
            database::completed_by_creation_date(&self.pool).await,
            BTreeMap::new(),
        )
    }

    /// Completed tasks per completion date.
    pub async fn get_completion_stats(&self) -> BTreeMap<NaiveDate, i64> {
        or_log(
            "getting completion stats",
            database::completed_by_completion_date(&self.pool).await,
            BTreeMap::new(),
        )
    }

    pub async fn add_category(&self, category: &NewCategory) -> bool {
        succeeded(
            "adding category",
            database::insert_category(&self.pool, category).await,
        )
    }

    pub async fn get_categories(&self) -> Vec<Category> {
        or_log(
            "getting categories",
            database::list_categories(&self.pool).await,
            vec![],
        )
    }

    pub async fn update_category(&self, id: CategoryId, category: &NewCategory) -> bool {
        succeeded(
            "updating category",
            database::update_category(&self.pool, id, category).await,
        )
    }

    /// Removes a category. Its tasks are kept, uncategorized.
    pub async fn delete_category(&self, id: CategoryId) -> bool {
        succeeded(
            "deleting category",
            database::delete_category(&self.pool, id).await,
        )
    }

    pub async fn set_task_category(&self, task_id: TaskId, category_id: Option<CategoryId>) -> bool {
        succeeded(
            "setting task category",
            database::set_task_category(&self.pool, task_id, category_id).await,
        )
    }

    pub async fn get_tasks_by_category(&self, category_id: Option<CategoryId>) -> Vec<Task> {
        or_log(
            "getting tasks by category",
            database::tasks_by_category(&self.pool, category_id).await,
            vec![],
        )
    }

    /// Tasks matching `filter`, optionally narrowed to one category.
    pub async fn get_filtered_tasks(
        &self,
        filter: TaskFilter,
        category_id: Option<CategoryId>,
    ) -> Vec<Task> {
        match category_id {
            Some(id) => {
                let mut tasks = self.get_tasks_by_category(Some(id)).await;
                tasks.retain(|task| filter.matches(task));
                tasks
            }
            None => self.get_tasks(filter).await,
        }
    }

    pub async fn get_category_stats(&self) -> Vec<CategoryStats> {
        or_log(
            "getting category stats",
            database::category_stats(&self.pool).await,
            vec![],
        )
    }

    /// Replaces a task's tags with the comma-joined list in `tags`.
    pub async fn set_task_tags(&self, task_id: TaskId, tags: &str) -> bool {
        self.replace_task_tags(task_id, &parse_tag_list(tags)).await
    }

    pub async fn replace_task_tags(&self, task_id: TaskId, tags: &BTreeSet<String>) -> bool {
        let tags: BTreeSet<String> = tags.iter().flat_map(|t| parse_tag_list(t)).collect();
        succeeded(
            "adding tags",
            database::replace_tags(&self.pool, task_id, &tags).await,
        )
    }

    pub async fn get_all_tags(&self) -> Vec<String> {
        or_log("getting tags", database::list_tags(&self.pool).await, vec![])
    }

    /// Tasks carrying exactly `tag` (after normalization).
    pub async fn search_tasks_by_tag(&self, tag: &str) -> Vec<Task> {
        let Some(tag) = normalize_tag(tag) else {
            return vec![];
        };
        or_log(
            "searching tasks by tag",
            database::tasks_with_tag(&self.pool, &tag).await,
            vec![],
        )
    }

    pub async fn set_task_deadline(&self, task_id: TaskId, date: NaiveDate, time: Option<NaiveTime>) -> bool {
        succeeded(
            "setting deadline",
            database::set_deadline(&self.pool, task_id, Some(Deadline::new(date, time))).await,
        )
    }

    pub async fn clear_task_deadline(&self, task_id: TaskId) -> bool {
        succeeded(
            "clearing deadline",
            database::set_deadline(&self.pool, task_id, None).await,
        )
    }

    pub async fn get_tasks_with_deadlines(&self) -> Vec<Task> {
        or_log(
            "getting tasks with deadlines",
            database::tasks_with_deadlines(&self.pool).await,
            vec![],
        )
    }

    pub async fn get_overdue_tasks(&self, now: NaiveDateTime) -> Vec<Task> {
        or_log(
            "getting overdue tasks",
            database::overdue_tasks(&self.pool, now).await,
            vec![],
        )
    }

    pub async fn get_upcoming_tasks(&self, today: NaiveDate, days_ahead: u64) -> Vec<Task> {
        or_log(
            "getting upcoming tasks",
            database::upcoming_tasks(&self.pool, today, days_ahead, false).await,
            vec![],
        )
    }

    /// Pending, not yet reminded tasks falling due within `window` of `now`.
    pub async fn get_due_reminders(&self, now: NaiveDateTime, window: Duration) -> Vec<Task> {
        let upcoming = or_log(
            "getting reminders",
            database::upcoming_tasks(&self.pool, now.date(), 1, true).await,
            vec![],
        );
        upcoming
            .into_iter()
            .filter(|task| {
                task.deadline.is_some_and(|deadline| {
                    let left = deadline.instant() - now;
                    left >= Duration::zero() && left <= window
                })
            })
            .collect()
    }

    pub async fn mark_reminded(&self, task_id: TaskId) -> bool {
        succeeded(
            "marking reminder",
            database::mark_reminded(&self.pool, task_id).await,
        )
    }

    pub async fn set_task_priority(&self, task_id: TaskId, priority: Option<Priority>) -> bool {
        succeeded(
            "setting priority",
            database::set_priority(&self.pool, task_id, priority).await,
        )
    }
}
