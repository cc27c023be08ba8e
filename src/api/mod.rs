mod handlers;
mod middleware;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::Database;
use crate::refresh::TaskListCache;
use crate::service::TaskService;

pub use middleware::{BearerToken, CurrentCaller};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService<Database, TaskListCache>,
    pub auth: AuthService,
    pub cache: TaskListCache,
}

impl AppState {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let cache = TaskListCache::new();
        Self {
            tasks: TaskService::new(db.clone(), cache.clone()),
            auth: AuthService::new(db, config.session_ttl),
            cache,
        }
    }
}

pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, AppConfig::default())
}

pub fn create_router_with_config(db: Database, config: AppConfig) -> Router {
    let state = AppState::new(db, &config);

    let api = Router::new()
        // Accounts
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        // Tasks
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/tasks/{id}",
            put(handlers::rename_task).delete(handlers::delete_task),
        )
        .route("/tasks/{id}/completed", put(handlers::toggle_task))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer(config.cors_origins.as_deref()))
        .with_state(state)
}
