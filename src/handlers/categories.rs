use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    db::Db,
    error::AppError,
    middleware::CurrentAccount,
    models::{CategoryView, CreateCategory},
    store::{categories, parse_object_id},
};

#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, description = "Categories sorted by name", body = Vec<CategoryView>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_categories(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
) -> Json<Vec<CategoryView>> {
    let categories = categories::list(&db, account.id).await;
    Json(categories.into_iter().map(CategoryView::from).collect())
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created"),
        (status = 400, description = "Missing name"),
        (status = 409, description = "Category already exists"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn create_category(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Json(payload): Json<CreateCategory>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "El nombre de la categoría es obligatorio".to_string(),
        ));
    }

    let category_id = categories::create(&db, &payload.name, account.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": category_id.to_hex() })),
    ))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted; its tasks keep living without category"),
        (status = 404, description = "Category not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn delete_category(
    State(db): State<Db>,
    CurrentAccount(account): CurrentAccount,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let category_id = parse_object_id(&id)
        .ok_or_else(|| AppError::NotFound("Categoría no encontrada".to_string()))?;

    if !categories::delete(&db, category_id, account.id).await? {
        return Err(AppError::NotFound("Categoría no encontrada".to_string()));
    }
    Ok(Json(
        serde_json::json!({ "success": true, "message": "Categoría eliminada" }),
    ))
}
