/*!
    Provides functionality to manage tasks, categories, tags
    and deadlines in the database.

    Every function here surfaces the raw `sqlx::Error`; see
    `store::TaskStore` for the logging facade used by the app.
!*/
use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Error, Row, SqlitePool};

use crate::tasklet::{
    Category, CategoryId, CategoryStats, DATE_FORMAT, Deadline, NewCategory, Priority,
    TIME_FORMAT, Task, TaskFilter, TaskId, TaskSummary,
};

const TASK_COLUMNS: &str = r#"
    t.id, t.title, t.done, t.created_on, t.completed_on,
    t.category_id, c.name as category_name,
    t.deadline_date, t.deadline_time, t.priority,
    (select json_group_array(tag) from task_tags where task_id = t.id) as tags
    from tasks t
    left join categories c on c.id = t.category_id
"#;

fn select_tasks(tail: &str) -> String {
    format!("select {TASK_COLUMNS} {tail}")
}

fn decode_error(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn date_column(row: &SqliteRow, column: &str) -> Result<Option<NaiveDate>, Error> {
    match row.try_get::<Option<String>, _>(column)? {
        Some(text) => NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map(Some)
            .map_err(|e| decode_error(column, e)),
        None => Ok(None),
    }
}

fn task_from_row(row: &SqliteRow) -> Result<Task, Error> {
    let created_on: &str = row.try_get("created_on")?;
    let created_on = NaiveDate::parse_from_str(created_on, DATE_FORMAT)
        .map_err(|e| decode_error("created_on", e))?;
    let mut task = Task::new(Some(row.try_get("id")?), row.try_get("title")?, created_on);
    task.done = row.try_get("done")?;
    task.completed_on = date_column(row, "completed_on")?;
    task.category_id = row.try_get("category_id")?;
    task.category = row.try_get("category_name")?;

    if let Some(date) = date_column(row, "deadline_date")? {
        let time = match row.try_get::<Option<String>, _>("deadline_time")? {
            Some(text) => Some(
                NaiveTime::parse_from_str(&text, TIME_FORMAT)
                    .map_err(|e| decode_error("deadline_time", e))?,
            ),
            None => None,
        };
        task.deadline = Some(Deadline::new(date, time));
    }

    task.priority = match row.try_get::<Option<String>, _>("priority")? {
        Some(text) => Some(
            text.parse::<Priority>()
                .map_err(|e| decode_error("priority", e))?,
        ),
        None => None,
    };

    let tags: &str = row.try_get("tags")?;
    task.tags = serde_json::from_str(tags).map_err(|e| decode_error("tags", e))?;
    Ok(task)
}

fn tasks_from_rows(rows: Vec<SqliteRow>) -> Result<Vec<Task>, Error> {
    rows.iter().map(task_from_row).collect()
}

/// Inserts a task into the DB and returns the generated Id or
/// error if the insert fails. The title must already be validated.
pub async fn insert_task(pool: &SqlitePool, title: &str, created_on: NaiveDate) -> Result<TaskId, Error> {
    let insert_stmt = r#"
            insert into tasks(title, done, created_on) values($1, 0, $2)
        "#;
    let res = sqlx::query(insert_stmt)
        .bind(title)
        .bind(created_on.format(DATE_FORMAT).to_string())
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

/// Inserts a task together with its deadline, tags and priority in one
/// transaction. Nothing is written if any part fails.
pub async fn insert_task_with_details(
    pool: &SqlitePool,
    title: &str,
    created_on: NaiveDate,
    deadline: Option<Deadline>,
    tags: &BTreeSet<String>,
    priority: Option<Priority>,
) -> Result<TaskId, Error> {
    let insert_stmt = r#"
            insert into tasks(title, done, created_on, deadline_date, deadline_time, priority)
            values($1, 0, $2, $3, $4, $5)
        "#;
    let mut tx = pool.begin().await?;
    let res = sqlx::query(insert_stmt)
        .bind(title)
        .bind(created_on.format(DATE_FORMAT).to_string())
        .bind(deadline.map(|d| d.date.format(DATE_FORMAT).to_string()))
        .bind(
            deadline
                .and_then(|d| d.time)
                .map(|t| t.format(TIME_FORMAT).to_string()),
        )
        .bind(priority.map(|p| p.as_str()))
        .execute(&mut *tx)
        .await?;
    let id = res.last_insert_rowid();
    for tag in tags {
        sqlx::query("insert into task_tags(task_id, tag) values($1, $2)")
            .bind(id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(id)
}

pub async fn get_task(pool: &SqlitePool, id: TaskId) -> Result<Option<Task>, Error> {
    let stmt = select_tasks("where t.id = $1");
    let row = sqlx::query(&stmt).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(task_from_row).transpose()
}

pub async fn list_tasks(pool: &SqlitePool, filter: TaskFilter) -> Result<Vec<Task>, Error> {
    let tail = match filter {
        TaskFilter::All => "order by t.done asc, t.id desc",
        TaskFilter::Pending => "where t.done = 0 order by t.id desc",
        TaskFilter::Completed => "where t.done = 1 order by t.id desc",
    };
    let rows = sqlx::query(&select_tasks(tail)).fetch_all(pool).await?;
    tasks_from_rows(rows)
}

/// Sets the done flag. `completed_on` is the completion date to record when
/// `done` is true; it is cleared otherwise.
pub async fn set_done(
    pool: &SqlitePool,
    id: TaskId,
    done: bool,
    completed_on: NaiveDate,
) -> Result<u64, Error> {
    let completed_on = done.then(|| completed_on.format(DATE_FORMAT).to_string());
    let res = sqlx::query("update tasks set done = $1, completed_on = $2 where id = $3")
        .bind(done)
        .bind(completed_on)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn rename_task(pool: &SqlitePool, id: TaskId, title: &str) -> Result<u64, Error> {
    let res = sqlx::query("update tasks set title = $1 where id = $2")
        .bind(title)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_task(pool: &SqlitePool, id: TaskId) -> Result<u64, Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("delete from task_tags where task_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let res = sqlx::query("delete from tasks where id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(res.rows_affected())
}

pub async fn task_summary(pool: &SqlitePool) -> Result<TaskSummary, Error> {
    let row = sqlx::query("select count(*) as total, coalesce(sum(done), 0) as completed from tasks")
        .fetch_one(pool)
        .await?;
    Ok(TaskSummary::new(row.try_get("total")?, row.try_get("completed")?))
}

async fn count_by_date(pool: &SqlitePool, column: &str) -> Result<BTreeMap<NaiveDate, i64>, Error> {
    let stmt = format!(
        "select {column} as day, count(*) as n from tasks \
         where done = 1 and {column} is not null group by {column} order by {column}"
    );
    let rows = sqlx::query(&stmt).fetch_all(pool).await?;
    let mut stats = BTreeMap::new();
    for row in rows.iter() {
        if let Some(day) = date_column(row, "day")? {
            stats.insert(day, row.try_get("n")?);
        }
    }
    Ok(stats)
}

/// Completed tasks counted per creation date.
pub async fn completed_by_creation_date(pool: &SqlitePool) -> Result<BTreeMap<NaiveDate, i64>, Error> {
    count_by_date(pool, "created_on").await
}

/// Completed tasks counted per completion date.
pub async fn completed_by_completion_date(pool: &SqlitePool) -> Result<BTreeMap<NaiveDate, i64>, Error> {
    count_by_date(pool, "completed_on").await
}

fn category_from_row(row: &SqliteRow) -> Result<Category, Error> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        icon: row.try_get("icon")?,
        color: row.try_get("color")?,
    })
}

pub async fn insert_category(pool: &SqlitePool, category: &NewCategory) -> Result<CategoryId, Error> {
    let res = sqlx::query("insert into categories(name, icon, color) values($1, $2, $3)")
        .bind(&category.name)
        .bind(&category.icon)
        .bind(&category.color)
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>, Error> {
    let rows = sqlx::query("select id, name, icon, color from categories order by name")
        .fetch_all(pool)
        .await?;
    rows.iter().map(category_from_row).collect()
}

pub async fn update_category(
    pool: &SqlitePool,
    id: CategoryId,
    category: &NewCategory,
) -> Result<u64, Error> {
    let res = sqlx::query("update categories set name = $1, icon = $2, color = $3 where id = $4")
        .bind(&category.name)
        .bind(&category.icon)
        .bind(&category.color)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// Detaches the category from its tasks, then removes it.
pub async fn delete_category(pool: &SqlitePool, id: CategoryId) -> Result<u64, Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("update tasks set category_id = null where category_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let res = sqlx::query("delete from categories where id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(res.rows_affected())
}

pub async fn set_task_category(
    pool: &SqlitePool,
    task_id: TaskId,
    category_id: Option<CategoryId>,
) -> Result<u64, Error> {
    let res = sqlx::query("update tasks set category_id = $1 where id = $2")
        .bind(category_id)
        .bind(task_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn tasks_by_category(
    pool: &SqlitePool,
    category_id: Option<CategoryId>,
) -> Result<Vec<Task>, Error> {
    let rows = match category_id {
        Some(id) => {
            let stmt = select_tasks("where t.category_id = $1 order by t.done asc, t.id desc");
            sqlx::query(&stmt).bind(id).fetch_all(pool).await?
        }
        None => {
            let stmt = select_tasks("order by c.name, t.done asc, t.id desc");
            sqlx::query(&stmt).fetch_all(pool).await?
        }
    };
    tasks_from_rows(rows)
}

pub async fn category_stats(pool: &SqlitePool) -> Result<Vec<CategoryStats>, Error> {
    let stmt = r#"
        select c.id, c.name, c.icon,
               count(t.id) as total,
               coalesce(sum(case when t.done = 1 then 1 else 0 end), 0) as completed
        from categories c
        left join tasks t on c.id = t.category_id
        group by c.id, c.name, c.icon
        order by total desc, c.name
    "#;
    let rows = sqlx::query(stmt).fetch_all(pool).await?;
    rows.iter()
        .map(|row| -> Result<CategoryStats, Error> {
            Ok(CategoryStats {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                icon: row.try_get("icon")?,
                total: row.try_get("total")?,
                completed: row.try_get("completed")?,
            })
        })
        .collect()
}

/// Replaces the tag set of a task. Tags must already be normalized.
pub async fn replace_tags(pool: &SqlitePool, task_id: TaskId, tags: &BTreeSet<String>) -> Result<(), Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("delete from task_tags where task_id = $1")
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
    for tag in tags {
        sqlx::query("insert into task_tags(task_id, tag) values($1, $2)")
            .bind(task_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

pub async fn list_tags(pool: &SqlitePool) -> Result<Vec<String>, Error> {
    let rows = sqlx::query("select distinct tag from task_tags order by tag")
        .fetch_all(pool)
        .await?;
    rows.iter().map(|row| row.try_get("tag")).collect()
}

pub async fn tasks_with_tag(pool: &SqlitePool, tag: &str) -> Result<Vec<Task>, Error> {
    let stmt = select_tasks(
        "where t.id in (select task_id from task_tags where tag = $1) \
         order by t.done asc, t.id desc",
    );
    let rows = sqlx::query(&stmt).bind(tag).fetch_all(pool).await?;
    tasks_from_rows(rows)
}

/// Sets or clears a deadline; either way the reminder is re-armed.
pub async fn set_deadline(
    pool: &SqlitePool,
    task_id: TaskId,
    deadline: Option<Deadline>,
) -> Result<u64, Error> {
    let date = deadline.map(|d| d.date.format(DATE_FORMAT).to_string());
    let time = deadline
        .and_then(|d| d.time)
        .map(|t| t.format(TIME_FORMAT).to_string());
    let res = sqlx::query(
        "update tasks set deadline_date = $1, deadline_time = $2, reminder_sent = 0 where id = $3",
    )
    .bind(date)
    .bind(time)
    .bind(task_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn tasks_with_deadlines(pool: &SqlitePool) -> Result<Vec<Task>, Error> {
    let stmt = select_tasks(
        "where t.deadline_date is not null order by t.deadline_date asc, t.deadline_time asc",
    );
    let rows = sqlx::query(&stmt).fetch_all(pool).await?;
    tasks_from_rows(rows)
}

/// Pending tasks whose deadline has passed at `now`. A task due today
/// without a time is not overdue yet.
pub async fn overdue_tasks(pool: &SqlitePool, now: NaiveDateTime) -> Result<Vec<Task>, Error> {
    let stmt = select_tasks(
        "where t.done = 0 and t.deadline_date is not null \
         and (t.deadline_date < $1 or (t.deadline_date = $1 and t.deadline_time < $2)) \
         order by t.deadline_date asc, t.deadline_time asc",
    );
    let rows = sqlx::query(&stmt)
        .bind(now.date().format(DATE_FORMAT).to_string())
        .bind(now.time().format(TIME_FORMAT).to_string())
        .fetch_all(pool)
        .await?;
    tasks_from_rows(rows)
}

/// Pending tasks due between `today` and `today + days_ahead`, inclusive.
pub async fn upcoming_tasks(
    pool: &SqlitePool,
    today: NaiveDate,
    days_ahead: u64,
    unreminded_only: bool,
) -> Result<Vec<Task>, Error> {
    let until = today.checked_add_days(Days::new(days_ahead)).unwrap_or(NaiveDate::MAX);
    let reminder_clause = if unreminded_only { "and t.reminder_sent = 0" } else { "" };
    let stmt = select_tasks(&format!(
        "where t.done = 0 and t.deadline_date is not null \
         and t.deadline_date between $1 and $2 {reminder_clause} \
         order by t.deadline_date asc, t.deadline_time asc"
    ));
    let rows = sqlx::query(&stmt)
        .bind(today.format(DATE_FORMAT).to_string())
        .bind(until.format(DATE_FORMAT).to_string())
        .fetch_all(pool)
        .await?;
    tasks_from_rows(rows)
}

pub async fn mark_reminded(pool: &SqlitePool, task_id: TaskId) -> Result<u64, Error> {
    let res = sqlx::query("update tasks set reminder_sent = 1 where id = $1")
        .bind(task_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn set_priority(
    pool: &SqlitePool,
    task_id: TaskId,
    priority: Option<Priority>,
) -> Result<u64, Error> {
    let res = sqlx::query("update tasks set priority = $1 where id = $2")
        .bind(priority.map(|p| p.as_str()))
        .bind(task_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
