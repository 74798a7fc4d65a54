use chrono::{DateTime, Duration, NaiveTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::FindOptions;
use serde::Deserialize;

use crate::db::Db;
use crate::error::AppError;
use crate::models::{format_date, Category, CreateTask, StatusCounts, Task, TaskPatch, TaskStatus, TaskView};
use crate::store::{parse_object_id, parse_optional_date};

pub async fn create(db: &Db, user_id: ObjectId, request: &CreateTask) -> Result<ObjectId, AppError> {
    let category_id = match request
        .category_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        // La existencia y propiedad de la categoría no se valida aquí: una
        // tarea puede quedar apuntando a un id ajeno o muerto y el listado
        // lo resuelve a nombre null. Un id mal formado sí se trata como
        // categoría inexistente.
        Some(raw) => Some(
            parse_object_id(raw)
                .ok_or_else(|| AppError::NotFound("Categoría no encontrada".to_string()))?,
        ),
        None => None,
    };

    let now = bson::DateTime::now();
    let task = Task {
        id: ObjectId::new(),
        title: request.title.trim().to_string(),
        description: request
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        status: TaskStatus::NoIniciado,
        category_id,
        user_id,
        start_date: parse_optional_date(request.start_date.as_deref())?,
        end_date: parse_optional_date(request.end_date.as_deref())?,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    db.tasks().insert_one(&task, None).await?;
    Ok(task.id)
}

/// Fila que produce el pipeline de listado: la tarea más el arreglo del
/// `$lookup` contra `categories` (vacío si la referencia no resuelve).
#[derive(Debug, Deserialize)]
struct TaskRow {
    #[serde(rename = "_id")]
    id: ObjectId,
    title: String,
    #[serde(default)]
    description: String,
    status: TaskStatus,
    category_id: Option<ObjectId>,
    start_date: Option<bson::DateTime>,
    end_date: Option<bson::DateTime>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
    completed_at: Option<bson::DateTime>,
    #[serde(default)]
    category: Vec<Category>,
}

impl TaskRow {
    fn into_view(self) -> TaskView {
        TaskView {
            id: self.id.to_hex(),
            title: self.title,
            description: self.description,
            status: self.status,
            category_id: self.category_id.map(|id| id.to_hex()),
            category_name: self.category.into_iter().next().map(|c| c.name),
            start_date: self.start_date.map(format_date),
            end_date: self.end_date.map(format_date),
            created_at: self.created_at.to_chrono(),
            updated_at: self.updated_at.to_chrono(),
            completed_at: self.completed_at.map(|d| d.to_chrono()),
        }
    }
}

pub(crate) fn list_filter(
    user_id: ObjectId,
    status: Option<TaskStatus>,
    category: Option<ObjectId>,
) -> Document {
    let mut filter = doc! { "user_id": user_id };
    if let Some(status) = status {
        filter.insert("status", status.as_str());
    }
    if let Some(category) = category {
        filter.insert("category_id", category);
    }
    filter
}

/// Tareas del usuario con el nombre de categoría resuelto, más recientes
/// primero. Ambos filtros, si vienen, se aplican en conjunción exacta.
pub async fn list(
    db: &Db,
    user_id: ObjectId,
    status: Option<TaskStatus>,
    category: Option<ObjectId>,
) -> Vec<TaskView> {
    let pipeline = vec![
        doc! { "$match": list_filter(user_id, status, category) },
        doc! { "$lookup": {
            "from": "categories",
            "localField": "category_id",
            "foreignField": "_id",
            "as": "category",
        }},
        doc! { "$sort": { "created_at": -1 } },
    ];

    let mut cursor = match db.tasks().aggregate(pipeline, None).await {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!("no se pudieron consultar las tareas: {}", e);
            return Vec::new();
        }
    };

    let mut views = Vec::new();
    loop {
        match cursor.try_next().await {
            Ok(Some(document)) => match bson::from_document::<TaskRow>(document) {
                Ok(row) => views.push(row.into_view()),
                Err(e) => tracing::warn!("tarea con forma inesperada omitida: {}", e),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("el cursor de tareas falló: {}", e);
                break;
            }
        }
    }
    views
}

/// Campos del `$set` para un cambio de estado. Entrar a `finalizado` sella
/// `completed_at`; salir de él lo limpia.
pub(crate) fn status_update(status: TaskStatus) -> Document {
    let completed_at = if status == TaskStatus::Finalizado {
        Bson::DateTime(bson::DateTime::now())
    } else {
        Bson::Null
    };
    doc! {
        "status": status.as_str(),
        "updated_at": bson::DateTime::now(),
        "completed_at": completed_at,
    }
}

/// Devuelve false si ningún documento del usuario coincide; reaplicar el
/// estado actual cuenta como éxito.
pub async fn update_status(
    db: &Db,
    task_id: ObjectId,
    user_id: ObjectId,
    status: TaskStatus,
) -> Result<bool, AppError> {
    let result = db
        .tasks()
        .update_one(
            doc! { "_id": task_id, "user_id": user_id },
            doc! { "$set": status_update(status) },
            None,
        )
        .await?;
    Ok(result.matched_count > 0)
}

/// Campos del `$set` para una actualización parcial. Los campos ausentes o
/// vacíos se dejan intactos; `updated_at` se toca siempre, haya o no cambios
/// efectivos. Un estado presente arrastra el ajuste de `completed_at`.
pub(crate) fn patch_update(patch: &TaskPatch) -> Result<Document, AppError> {
    let mut set = doc! { "updated_at": bson::DateTime::now() };

    if let Some(title) = non_empty(&patch.title) {
        set.insert("title", title);
    }
    if let Some(description) = non_empty(&patch.description) {
        set.insert("description", description);
    }
    if let Some(category) = non_empty(&patch.category_id) {
        let id = parse_object_id(category)
            .ok_or_else(|| AppError::NotFound("Categoría no encontrada".to_string()))?;
        set.insert("category_id", id);
    }
    if let Some(start) = non_empty(&patch.start_date) {
        set.insert("start_date", crate::store::parse_date(start)?);
    }
    if let Some(end) = non_empty(&patch.end_date) {
        set.insert("end_date", crate::store::parse_date(end)?);
    }
    if let Some(status) = patch.status {
        set.insert("status", status.as_str());
        if status == TaskStatus::Finalizado {
            set.insert("completed_at", bson::DateTime::now());
        } else {
            set.insert("completed_at", Bson::Null);
        }
    }

    Ok(set)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub async fn update_fields(
    db: &Db,
    task_id: ObjectId,
    user_id: ObjectId,
    patch: &TaskPatch,
) -> Result<bool, AppError> {
    let set = patch_update(patch)?;
    let result = db
        .tasks()
        .update_one(
            doc! { "_id": task_id, "user_id": user_id },
            doc! { "$set": set },
            None,
        )
        .await?;
    Ok(result.matched_count > 0)
}

pub async fn delete(db: &Db, task_id: ObjectId, user_id: ObjectId) -> Result<bool, AppError> {
    let result = db
        .tasks()
        .delete_one(doc! { "_id": task_id, "user_id": user_id }, None)
        .await?;
    Ok(result.deleted_count > 0)
}

/// Conteo de tareas por estado. Degrada a ceros si el store falla.
pub async fn statistics(db: &Db, user_id: ObjectId) -> StatusCounts {
    let pipeline = vec![
        doc! { "$match": { "user_id": user_id } },
        doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
    ];

    let mut cursor = match db.tasks().aggregate(pipeline, None).await {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!("no se pudieron consultar las estadísticas: {}", e);
            return StatusCounts::default();
        }
    };

    let mut groups: Vec<(String, u64)> = Vec::new();
    loop {
        match cursor.try_next().await {
            Ok(Some(document)) => {
                let status = document.get_str("_id").unwrap_or_default().to_string();
                let count = match document.get("count") {
                    Some(Bson::Int32(n)) => *n as u64,
                    Some(Bson::Int64(n)) => *n as u64,
                    _ => 0,
                };
                groups.push((status, count));
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("el cursor de estadísticas falló: {}", e);
                return StatusCounts::default();
            }
        }
    }

    StatusCounts::from_groups(groups.iter().map(|(s, c)| (s.as_str(), *c)))
}

/// Filtro de tareas por vencer: no finalizadas, con fecha de fin entre el
/// inicio del día de hoy y `days` días después, ambos inclusive. El límite
/// inferior es medianoche para que una tarea que vence hoy siga apareciendo
/// aunque ya hayan pasado horas del día.
pub(crate) fn upcoming_filter(user_id: ObjectId, now: DateTime<Utc>, days: i64) -> Document {
    // `days` viene del cliente; acotado a diez años para no desbordar la
    // aritmética de fechas de chrono.
    let days = days.clamp(0, 3650);
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let until = start + Duration::days(days);
    doc! {
        "user_id": user_id,
        "status": { "$ne": TaskStatus::Finalizado.as_str() },
        "end_date": {
            "$gte": bson::DateTime::from_chrono(start),
            "$lte": bson::DateTime::from_chrono(until),
        },
    }
}

/// Tareas próximas a vencer, ascendente por fecha de fin. Sin `$lookup`:
/// aquí no se resuelve el nombre de la categoría.
pub async fn upcoming(db: &Db, user_id: ObjectId, days: i64) -> Vec<TaskView> {
    let filter = upcoming_filter(user_id, Utc::now(), days);
    let options = FindOptions::builder().sort(doc! { "end_date": 1 }).build();

    let cursor = match db.tasks().find(filter, options).await {
        Ok(cursor) => cursor,
        Err(e) => {
            tracing::warn!("no se pudieron consultar las tareas por vencer: {}", e);
            return Vec::new();
        }
    };
    match cursor.try_collect::<Vec<Task>>().await {
        Ok(tasks) => tasks.into_iter().map(TaskView::from).collect(),
        Err(e) => {
            tracing::warn!("no se pudieron leer las tareas por vencer: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_update_seals_completed_at_on_finalizado() {
        let set = status_update(TaskStatus::Finalizado);
        assert_eq!(set.get_str("status").unwrap(), "finalizado");
        assert!(matches!(set.get("completed_at"), Some(Bson::DateTime(_))));
        assert!(matches!(set.get("updated_at"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn status_update_clears_completed_at_on_other_statuses() {
        for status in [
            TaskStatus::NoIniciado,
            TaskStatus::EnProceso,
            TaskStatus::EnProblemas,
        ] {
            let set = status_update(status);
            assert_eq!(set.get_str("status").unwrap(), status.as_str());
            assert_eq!(set.get("completed_at"), Some(&Bson::Null));
        }
    }

    #[test]
    fn patch_update_always_bumps_updated_at() {
        let set = patch_update(&TaskPatch::default()).unwrap();
        assert!(matches!(set.get("updated_at"), Some(Bson::DateTime(_))));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn patch_update_skips_empty_strings() {
        // Cadena vacía equivale a ausente: el campo queda intacto.
        let patch = TaskPatch {
            title: Some(String::new()),
            description: Some("   ".to_string()),
            start_date: Some(String::new()),
            ..TaskPatch::default()
        };
        let set = patch_update(&patch).unwrap();
        assert!(!set.contains_key("title"));
        assert!(!set.contains_key("description"));
        assert!(!set.contains_key("start_date"));
    }

    #[test]
    fn patch_update_sets_provided_fields() {
        let category = ObjectId::new();
        let patch = TaskPatch {
            title: Some("Comprar leche".to_string()),
            description: Some("dos litros".to_string()),
            category_id: Some(category.to_hex()),
            start_date: Some("2026-09-01".to_string()),
            end_date: Some("2026-09-08".to_string()),
            status: None,
        };
        let set = patch_update(&patch).unwrap();
        assert_eq!(set.get_str("title").unwrap(), "Comprar leche");
        assert_eq!(set.get_str("description").unwrap(), "dos litros");
        assert_eq!(set.get_object_id("category_id").unwrap(), category);
        assert!(matches!(set.get("start_date"), Some(Bson::DateTime(_))));
        assert!(matches!(set.get("end_date"), Some(Bson::DateTime(_))));
        assert!(!set.contains_key("status"));
        assert!(!set.contains_key("completed_at"));
    }

    #[test]
    fn patch_update_applies_completed_at_invariant() {
        let done = TaskPatch {
            status: Some(TaskStatus::Finalizado),
            ..TaskPatch::default()
        };
        let set = patch_update(&done).unwrap();
        assert!(matches!(set.get("completed_at"), Some(Bson::DateTime(_))));

        let reopened = TaskPatch {
            status: Some(TaskStatus::EnProceso),
            ..TaskPatch::default()
        };
        let set = patch_update(&reopened).unwrap();
        assert_eq!(set.get("completed_at"), Some(&Bson::Null));
    }

    #[test]
    fn patch_update_rejects_garbage_dates_and_ids() {
        let bad_date = TaskPatch {
            end_date: Some("mañana".to_string()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            patch_update(&bad_date),
            Err(AppError::Validation(_))
        ));

        // Un id de categoría mal formado se trata como categoría inexistente,
        // igual que los ids de ruta.
        let bad_category = TaskPatch {
            category_id: Some("xyz".to_string()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            patch_update(&bad_category),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn list_filter_is_exact_match_conjunction() {
        let user = ObjectId::new();
        let category = ObjectId::new();

        let bare = list_filter(user, None, None);
        assert_eq!(bare.len(), 1);
        assert_eq!(bare.get_object_id("user_id").unwrap(), user);

        let filtered = list_filter(user, Some(TaskStatus::EnProceso), Some(category));
        assert_eq!(filtered.get_str("status").unwrap(), "en proceso");
        assert_eq!(filtered.get_object_id("category_id").unwrap(), category);
    }

    #[test]
    fn upcoming_filter_covers_today_inclusive() {
        let user = ObjectId::new();
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 15, 30, 0).unwrap();
        let filter = upcoming_filter(user, now, 7);

        let window = filter.get_document("end_date").unwrap();
        let start = window.get_datetime("$gte").unwrap().to_chrono();
        let until = window.get_datetime("$lte").unwrap().to_chrono();

        // Una tarea que vence hoy (medianoche) entra aunque sean las 15:30.
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 29, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2026, 9, 5, 0, 0, 0).unwrap());

        let status = filter.get_document("status").unwrap();
        assert_eq!(status.get_str("$ne").unwrap(), "finalizado");
    }

    #[test]
    fn upcoming_filter_caps_oversized_windows() {
        let user = ObjectId::new();
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();

        // Un valor absurdo del cliente no debe entrar en pánico; la ventana
        // queda acotada a diez años.
        let filter = upcoming_filter(user, now, i64::MAX);
        let window = filter.get_document("end_date").unwrap();
        let start = window.get_datetime("$gte").unwrap().to_chrono();
        let until = window.get_datetime("$lte").unwrap().to_chrono();
        assert_eq!(until - start, Duration::days(3650));

        // Días negativos colapsan la ventana al día de hoy.
        let filter = upcoming_filter(user, now, -30);
        let window = filter.get_document("end_date").unwrap();
        assert_eq!(
            window.get_datetime("$gte").unwrap(),
            window.get_datetime("$lte").unwrap()
        );
    }
}
