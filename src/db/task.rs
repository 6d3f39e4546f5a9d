//! Task storage.

use sqlx::QueryBuilder;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub uuid: String,
    /// Owner subject. NULL for legacy ownerless rows, which any
    /// authenticated user may act on.
    pub user_uuid: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub due_date: Option<String>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub priority: &'a str,
    pub due_date: Option<&'a str>,
}

/// Partial update: only provided fields are written.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub due_date: Option<&'a str>,
    pub completed: Option<bool>,
}

/// Sort order for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    /// Newest first
    #[default]
    CreatedAt,
    /// High > medium > low, then newest first
    Priority,
    /// Earliest due date first
    DueDate,
}

/// Filters and sort for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub priority: Option<String>,
    pub completed: Option<bool>,
    /// Case-insensitive substring match over title and description
    pub search: Option<String>,
    pub sort: TaskSort,
}

const TASK_COLUMNS: &str = "id, uuid, user_uuid, title, description, priority, \
                            due_date, completed, created_at, updated_at";

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new task owned by `user_uuid`. Returns the task UUID.
    pub async fn create(&self, user_uuid: &str, task: NewTask<'_>) -> Result<String, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO tasks (uuid, user_uuid, title, description, priority, due_date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_uuid)
        .bind(task.title)
        .bind(task.description)
        .bind(task.priority)
        .bind(task.due_date)
        .execute(&self.pool)
        .await?;

        Ok(uuid)
    }

    /// Get a task by UUID regardless of owner.
    /// Ownership is checked by the caller after lookup, so a missing task and
    /// a foreign task produce distinct outcomes.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {} FROM tasks WHERE uuid = ?",
            TASK_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
    }

    /// List tasks owned by `user_uuid`, applying the query's filters and sort.
    pub async fn list(&self, user_uuid: &str, query: &TaskQuery) -> Result<Vec<Task>, sqlx::Error> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM tasks WHERE user_uuid = ",
            TASK_COLUMNS
        ));
        qb.push_bind(user_uuid);

        if let Some(priority) = &query.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }
        if let Some(completed) = query.completed {
            qb.push(" AND completed = ").push_bind(completed);
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR description LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        match query.sort {
            TaskSort::Priority => {
                qb.push(
                    " ORDER BY CASE priority \
                       WHEN 'high' THEN 3 WHEN 'medium' THEN 2 WHEN 'low' THEN 1 \
                       ELSE 0 END DESC, created_at DESC, id DESC",
                );
            }
            TaskSort::DueDate => {
                qb.push(" ORDER BY due_date ASC");
            }
            TaskSort::CreatedAt => {
                qb.push(" ORDER BY created_at DESC, id DESC");
            }
        }

        qb.build_query_as().fetch_all(&self.pool).await
    }

    /// Apply a partial update to a task. Returns the updated task, or None if
    /// the UUID does not resolve.
    pub async fn update(
        &self,
        uuid: &str,
        update: UpdateTask<'_>,
    ) -> Result<Option<Task>, sqlx::Error> {
        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE tasks SET updated_at = datetime('now')");

        if let Some(title) = update.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = update.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(priority) = update.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = update.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(completed) = update.completed {
            qb.push(", completed = ").push_bind(completed);
        }

        qb.push(" WHERE uuid = ").push_bind(uuid);
        qb.build().execute(&self.pool).await?;

        self.get_by_uuid(uuid).await
    }

    /// Delete a task by UUID. Returns true if a row was removed.
    pub async fn delete(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
