use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// --- Documentos almacenados en MongoDB ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub username: String,
    // Hash argon2 en formato PHC, nunca la contraseña en claro.
    pub password_hash: String,
    pub birth_date: Option<bson::DateTime>,
    pub telegram_chat_id: Option<String>,
    pub created_at: bson::DateTime,
    pub last_login: Option<bson::DateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub user_id: ObjectId,
    pub created_at: bson::DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub category_id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub start_date: Option<bson::DateTime>,
    pub end_date: Option<bson::DateTime>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    // Invariante: Some si y solo si status == Finalizado.
    pub completed_at: Option<bson::DateTime>,
}

/// Los cuatro estados del ciclo de vida de una tarea. Se persisten y se
/// exponen con los literales en español del sistema original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TaskStatus {
    #[serde(rename = "no iniciado")]
    NoIniciado,
    #[serde(rename = "en proceso")]
    EnProceso,
    #[serde(rename = "finalizado")]
    Finalizado,
    #[serde(rename = "en problemas")]
    EnProblemas,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NoIniciado => "no iniciado",
            TaskStatus::EnProceso => "en proceso",
            TaskStatus::Finalizado => "finalizado",
            TaskStatus::EnProblemas => "en problemas",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no iniciado" => Some(TaskStatus::NoIniciado),
            "en proceso" => Some(TaskStatus::EnProceso),
            "finalizado" => Some(TaskStatus::Finalizado),
            "en problemas" => Some(TaskStatus::EnProblemas),
            _ => None,
        }
    }
}

// --- Vistas (lo que ven los clientes; el hash nunca sale por aquí) ---

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub birth_date: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        AccountView {
            id: account.id.to_hex(),
            email: account.email,
            username: account.username,
            birth_date: account.birth_date.map(format_date),
            telegram_chat_id: account.telegram_chat_id,
            created_at: account.created_at.to_chrono(),
            last_login: account.last_login.map(|d| d.to_chrono()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryView {
    fn from(category: Category) -> Self {
        CategoryView {
            id: category.id.to_hex(),
            name: category.name,
            created_at: category.created_at.to_chrono(),
        }
    }
}

/// Tarea enriquecida con el nombre de su categoría y con las fechas de
/// calendario renderizadas como `YYYY-MM-DD`, sin componente horario.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub category_id: Option<String>,
    // None si la tarea no tiene categoría o si la referenciada ya no existe.
    pub category_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        TaskView {
            id: task.id.to_hex(),
            title: task.title,
            description: task.description,
            status: task.status,
            category_id: task.category_id.map(|id| id.to_hex()),
            category_name: None,
            start_date: task.start_date.map(format_date),
            end_date: task.end_date.map(format_date),
            created_at: task.created_at.to_chrono(),
            updated_at: task.updated_at.to_chrono(),
            completed_at: task.completed_at.map(|d| d.to_chrono()),
        }
    }
}

pub fn format_date(date: bson::DateTime) -> String {
    date.to_chrono().format("%Y-%m-%d").to_string()
}

/// Conteo de tareas por estado, de forma fija: las cuatro claves siempre
/// presentes aunque valgan cero.
#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub total: u64,
    #[serde(rename = "no iniciado")]
    pub no_iniciado: u64,
    #[serde(rename = "en proceso")]
    pub en_proceso: u64,
    #[serde(rename = "finalizado")]
    pub finalizado: u64,
    #[serde(rename = "en problemas")]
    pub en_problemas: u64,
}

impl StatusCounts {
    /// Construye el conteo a partir de los grupos `(estado, cantidad)` que
    /// devuelve el `$group` por estado. Estados desconocidos no suman.
    pub fn from_groups<'a>(groups: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let mut counts = StatusCounts::default();
        for (status, count) in groups {
            match TaskStatus::parse(status) {
                Some(TaskStatus::NoIniciado) => counts.no_iniciado = count,
                Some(TaskStatus::EnProceso) => counts.en_proceso = count,
                Some(TaskStatus::Finalizado) => counts.finalizado = count,
                Some(TaskStatus::EnProblemas) => counts.en_problemas = count,
                None => continue,
            }
            counts.total += count;
        }
        counts
    }
}

// --- DTOs de peticiones y respuestas ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub birth_date: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Actualización parcial: cada campo ausente (o presente pero vacío) se deja
/// intacto. Eso implica que un campo no puede vaciarse por esta vía.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategory {
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TelegramUpdate {
    pub telegram_chat_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub account: AccountView,
    pub stats: StatusCounts,
}

// Claims para JWT: `sub` lleva el id de la cuenta en hexadecimal.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_round_trip() {
        for status in [
            TaskStatus::NoIniciado,
            TaskStatus::EnProceso,
            TaskStatus::Finalizado,
            TaskStatus::EnProblemas,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("terminado"), None);
        assert_eq!(TaskStatus::parse(""), None);
    }

    #[test]
    fn status_serializes_to_spanish_literals() {
        assert_eq!(
            serde_json::to_value(TaskStatus::EnProblemas).unwrap(),
            serde_json::json!("en problemas")
        );
        let parsed: TaskStatus = serde_json::from_str("\"no iniciado\"").unwrap();
        assert_eq!(parsed, TaskStatus::NoIniciado);
        assert!(serde_json::from_str::<TaskStatus>("\"pendiente\"").is_err());
    }

    #[test]
    fn status_counts_from_groups_sums_known_statuses() {
        let counts = StatusCounts::from_groups([
            ("no iniciado", 3),
            ("finalizado", 2),
            ("estado fantasma", 9),
        ]);
        assert_eq!(counts.no_iniciado, 3);
        assert_eq!(counts.finalizado, 2);
        assert_eq!(counts.en_proceso, 0);
        assert_eq!(counts.en_problemas, 0);
        assert_eq!(counts.total, 5);
    }

    #[test]
    fn status_counts_default_is_all_zero() {
        let counts = StatusCounts::from_groups([]);
        assert_eq!(counts, StatusCounts::default());
        assert_eq!(counts.total, 0);
    }

    #[test]
    fn task_view_formats_calendar_dates_without_time() {
        let date = bson::DateTime::parse_rfc3339_str("2026-03-05T00:00:00Z").unwrap();
        assert_eq!(format_date(date), "2026-03-05");
    }
}
