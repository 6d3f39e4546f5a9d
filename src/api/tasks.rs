//! Task CRUD endpoints.
//!
//! All endpoints require bearer authentication. Resource-scoped operations
//! look the task up first (so a missing task is 404) and then run the
//! ownership check (403 for someone else's task).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{Access, Auth, HasAuthState, authorize};
use crate::db::{Database, NewTask, Task, TaskQuery, TaskSort, UpdateTask};
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TasksState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl HasAuthState for TasksState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }
}

pub fn router(state: TasksState) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/{uuid}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CreateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    #[serde(rename = "dueDate")]
    due_date: Option<String>,
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    #[serde(rename = "dueDate")]
    due_date: Option<String>,
    completed: Option<bool>,
}

#[derive(Deserialize)]
struct ListQuery {
    priority: Option<String>,
    completed: Option<bool>,
    search: Option<String>,
    sort: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    id: String,
    title: String,
    description: Option<String>,
    priority: String,
    due_date: Option<String>,
    completed: bool,
    user_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.uuid,
            title: task.title,
            description: task.description,
            priority: task.priority,
            due_date: task.due_date,
            completed: task.completed,
            user_id: task.user_uuid,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

// --- Helpers ---

/// Normalize a client-supplied priority. Unknown values fall back to medium.
fn sanitize_priority(priority: Option<&str>) -> String {
    match priority.map(|p| p.trim().to_lowercase()) {
        Some(p) if p == "low" || p == "medium" || p == "high" => p,
        _ => "medium".to_string(),
    }
}

/// Look up a task and verify the subject may act on it.
/// NotFound is checked before ownership.
async fn find_authorized_task(
    db: &Database,
    uuid: &str,
    subject: &str,
) -> Result<Task, ApiError> {
    let task = db
        .tasks()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    if authorize(task.user_uuid.as_deref(), subject) == Access::Deny {
        return Err(ApiError::forbidden("User not authorized"));
    }

    Ok(task)
}

// --- Handlers ---

async fn list_tasks(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = match params.sort.as_deref() {
        Some("priority") => TaskSort::Priority,
        Some("dueDate") => TaskSort::DueDate,
        _ => TaskSort::CreatedAt,
    };

    let query = TaskQuery {
        priority: params.priority,
        completed: params.completed,
        search: params.search,
        sort,
    };

    let tasks = state
        .db
        .tasks()
        .list(user.subject(), &query)
        .await
        .db_err("Failed to list tasks")?;

    let response: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();
    Ok(Json(response))
}

async fn create_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;

    let priority = sanitize_priority(payload.priority.as_deref());

    let uuid = state
        .db
        .tasks()
        .create(
            user.subject(),
            NewTask {
                title,
                description: payload.description.as_deref(),
                priority: &priority,
                due_date: payload.due_date.as_deref(),
            },
        )
        .await
        .db_err("Failed to create task")?;

    let task = state
        .db
        .tasks()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get created task")?
        .ok_or_else(|| ApiError::internal("Created task not found"))?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

async fn get_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = find_authorized_task(&state.db, &uuid, user.subject()).await?;
    Ok(Json(TaskResponse::from(task)))
}

async fn update_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    find_authorized_task(&state.db, &uuid, user.subject()).await?;

    let priority = payload
        .priority
        .as_deref()
        .map(|p| sanitize_priority(Some(p)));

    let task = state
        .db
        .tasks()
        .update(
            &uuid,
            UpdateTask {
                title: payload.title.as_deref(),
                description: payload.description.as_deref(),
                priority: priority.as_deref(),
                due_date: payload.due_date.as_deref(),
                completed: payload.completed,
            },
        )
        .await
        .db_err("Failed to update task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskResponse::from(task)))
}

async fn delete_task(
    State(state): State<TasksState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    find_authorized_task(&state.db, &uuid, user.subject()).await?;

    state
        .db
        .tasks()
        .delete(&uuid)
        .await
        .db_err("Failed to delete task")?;

    Ok(Json(serde_json::json!({ "message": "Task deleted successfully" })))
}
