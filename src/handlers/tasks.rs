use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;

use crate::{
    db::Db,
    error::AppError,
    middleware::CurrentAccount,
    models::{
        CreateTask, StatusCounts, TaskPatch, TaskQuery, TaskStatus, TaskView, UpcomingQuery,
        UpdateStatus,
    },
    store::{parse_object_id, tasks},
};

fn task_id_or_not_found(raw: &str) -> Result<mongodb::bson::oid::ObjectId, AppError> {
    parse_object_id(raw).ok_or_else(|| AppError::NotFound("Tarea no encontrada".to_string()))
}

#[utoipa::path(
    post,
    path = "/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created"),
        (status = 400, description = "Invalid task data"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn create_task(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Json(payload): Json<CreateTask>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("El título es obligatorio".to_string()));
    }

    // El rango solo se comprueba cuando vienen ambas fechas.
    if let (Some(start), Some(end)) = (
        payload.start_date.as_deref().filter(|s| !s.is_empty()),
        payload.end_date.as_deref().filter(|s| !s.is_empty()),
    ) {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .map_err(|_| AppError::Validation("Formato de fecha inválido".to_string()))?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
            .map_err(|_| AppError::Validation("Formato de fecha inválido".to_string()))?;
        if start > end {
            return Err(AppError::Validation(
                "La fecha de inicio no puede ser posterior a la fecha de fin".to_string(),
            ));
        }
    }

    let task_id = tasks::create(&db, account.id, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": task_id.to_hex() })),
    ))
}

#[utoipa::path(
    get,
    path = "/tasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "Tasks for the current account", body = Vec<TaskView>),
        (status = 400, description = "Invalid status filter"),
        (status = 404, description = "Malformed category filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_tasks(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Query(params): Query<TaskQuery>,
) -> Result<Json<Vec<TaskView>>, AppError> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            TaskStatus::parse(raw)
                .ok_or_else(|| AppError::Validation("Estado inválido".to_string()))?,
        ),
        None => None,
    };
    // Ids mal formados se tratan como categoría inexistente, igual que en
    // los parámetros de ruta.
    let category = match params.category.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            parse_object_id(raw)
                .ok_or_else(|| AppError::NotFound("Categoría no encontrada".to_string()))?,
        ),
        None => None,
    };

    Ok(Json(tasks::list(&db, account.id, status, category).await))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task id")),
    request_body = TaskPatch,
    responses(
        (status = 200, description = "Task updated"),
        (status = 404, description = "Task not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn update_task(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<String>,
    Json(payload): Json<TaskPatch>,
) -> Result<Json<serde_json::Value>, AppError> {
    let task_id = task_id_or_not_found(&id)?;

    if !tasks::update_fields(&db, task_id, account.id, &payload).await? {
        return Err(AppError::NotFound("Tarea no encontrada".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[utoipa::path(
    patch,
    path = "/tasks/{id}/status",
    params(("id" = String, Path, description = "Task id")),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Status updated"),
        (status = 404, description = "Task not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn update_task_status(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatus>,
) -> Result<Json<serde_json::Value>, AppError> {
    let task_id = task_id_or_not_found(&id)?;

    if !tasks::update_status(&db, task_id, account.id, payload.status).await? {
        return Err(AppError::NotFound("Tarea no encontrada".to_string()));
    }
    Ok(Json(
        serde_json::json!({ "success": true, "message": "Estado actualizado" }),
    ))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 404, description = "Task not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn delete_task(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let task_id = task_id_or_not_found(&id)?;

    if !tasks::delete(&db, task_id, account.id).await? {
        return Err(AppError::NotFound("Tarea no encontrada".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[utoipa::path(
    get,
    path = "/tasks/stats",
    responses(
        (status = 200, description = "Task counts by status", body = StatusCounts),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_statistics(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
) -> Json<StatusCounts> {
    Json(tasks::statistics(&db, account.id).await)
}

#[utoipa::path(
    get,
    path = "/tasks/upcoming",
    params(UpcomingQuery),
    responses(
        (status = 200, description = "Unfinished tasks due within the window", body = Vec<TaskView>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_upcoming(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Query(params): Query<UpcomingQuery>,
) -> Json<Vec<TaskView>> {
    // El filtro acota el rango; aquí solo se aplica el valor por defecto.
    let days = params.days.unwrap_or(7);
    Json(tasks::upcoming(&db, account.id, days).await)
}
