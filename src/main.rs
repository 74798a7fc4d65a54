use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod store;

#[cfg(test)]
mod tests;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::profile,
        handlers::auth::set_telegram,
        handlers::tasks::create_task,
        handlers::tasks::get_tasks,
        handlers::tasks::update_task,
        handlers::tasks::update_task_status,
        handlers::tasks::delete_task,
        handlers::tasks::get_statistics,
        handlers::tasks::get_upcoming,
        handlers::categories::get_categories,
        handlers::categories::create_category,
        handlers::categories::delete_category
    ),
    components(
        schemas(
            models::RegisterRequest,
            models::LoginRequest,
            models::Token,
            models::AccountView,
            models::ProfileResponse,
            models::TelegramUpdate,
            models::TaskStatus,
            models::TaskView,
            models::CreateTask,
            models::TaskPatch,
            models::UpdateStatus,
            models::StatusCounts,
            models::CategoryView,
            models::CreateCategory
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registro, login y perfil"),
        (name = "tasks", description = "Tareas: CRUD, estadísticas y vencimientos"),
        (name = "categories", description = "Categorías del usuario")
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Inicializar tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info,taskflow=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Conectar a MongoDB y declarar índices
    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("DATABASE_NAME").unwrap_or_else(|_| "taskflow_db".into());
    let db = db::Db::connect(&uri, &db_name).await?;
    db.ensure_indexes().await?;
    tracing::info!("base de datos `{}` inicializada", db_name);

    // Crear app
    let app = create_app(db);

    // Iniciar servidor
    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn create_app(db: db::Db) -> Router {
    // Configurar CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Rutas públicas
        .route("/", get(|| async { "TaskFlow backend is running!" }))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/token", post(handlers::auth::login))
        // Rutas protegidas
        .route("/auth/profile", get(handlers::auth::profile))
        .route("/auth/telegram", put(handlers::auth::set_telegram))
        .route("/tasks", post(handlers::tasks::create_task))
        .route("/tasks", get(handlers::tasks::get_tasks))
        .route("/tasks/stats", get(handlers::tasks::get_statistics))
        .route("/tasks/upcoming", get(handlers::tasks::get_upcoming))
        .route("/tasks/:id", put(handlers::tasks::update_task))
        .route("/tasks/:id", delete(handlers::tasks::delete_task))
        .route("/tasks/:id/status", patch(handlers::tasks::update_task_status))
        .route("/categories", get(handlers::categories::get_categories))
        .route("/categories", post(handlers::categories::create_category))
        .route("/categories/:id", delete(handlers::categories::delete_category))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(db)
}
