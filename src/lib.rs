//! Bloggen Backend - library for app logic and testing

pub mod ai;
pub mod content;
pub mod db;
pub mod export;
pub mod logging;
pub mod routes;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::routes::ai::Provider;

/// Request body cap for every route
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN, falling back to
/// the local frontend dev servers.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://localhost:5173"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true)
}

fn auth_routes() -> Router {
    use routes::auth;
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::me))
        .route("/user/preferences", put(auth::update_preferences))
}

fn blog_routes() -> Router {
    use routes::blogs;
    Router::new()
        .route("/blogs", get(blogs::list_blogs).post(blogs::create_blog))
        .route(
            "/blogs/{id}",
            get(blogs::get_blog)
                .put(blogs::update_blog)
                .delete(blogs::delete_blog),
        )
        .route("/blogs/{id}/export", post(blogs::export_blog))
}

fn ai_routes(provider: Provider) -> Router {
    use routes::ai;
    Router::new()
        .route("/generate-outline", post(ai::generate_outline))
        .route("/generate-content", post(ai::generate_content))
        .route("/seo-analyze", post(ai::seo_analyze))
        .route("/rewrite", post(ai::rewrite))
        .route("/expand", post(ai::expand))
        .layer(Extension(provider))
}

fn admin_routes() -> Router {
    use routes::admin;
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            get(admin::user_details).delete(admin::delete_user),
        )
        .route("/users/{id}/role", put(admin::update_user_role))
        .route("/ai-usage", get(admin::ai_usage))
}

/// Create the application router with the given completion provider.
pub fn create_app_with_provider(provider: Provider) -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    let api = Router::new()
        .merge(auth_routes())
        .merge(blog_routes())
        .nest("/ai", ai_routes(provider))
        .nest("/admin", admin_routes());

    Router::new()
        .nest("/api", api)
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
}

/// Create the application router backed by the Groq provider.
pub fn create_app() -> Router {
    create_app_with_provider(ai::groq::provider())
}

/// Connect to PostgreSQL, migrate, seed the admin account and start the
/// refresh-token purge. The service keeps running without a database.
async fn init_database() {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
        return;
    }

    let pool = match db::init_pool(None).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Continuing without database.",
                e
            );
            return;
        }
    };

    if let Err(e) = db::run_migrations(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        return;
    }
    if let Err(e) = routes::auth::seed_admin(&pool).await {
        tracing::error!("Failed to seed admin account: {}", e);
    }
    spawn_token_purge(pool);
}

/// Purge stale refresh tokens now and then every [`TOKEN_PURGE_INTERVAL`].
fn spawn_token_purge(pool: Arc<PgPool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match db::tokens::purge_stale(&pool).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "removed stale refresh tokens"),
                Err(e) => tracing::warn!("Failed to purge refresh tokens: {}", e),
            }
        }
    });
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    let log_config = logging::LogConfig::from_env();
    // Dropping the guards would stop the background log writers.
    let _log_guards = logging::init(&log_config);

    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    if log_config.is_production() && *routes::auth::JWT_SECRET == routes::auth::DEFAULT_JWT_SECRET
    {
        panic!(
            "FATAL: JWT_SECRET must be set to a secure, unique value in production. \
             Refusing to start with the default secret."
        );
    }
    if !ai::groq::api_key_configured() {
        tracing::warn!("GROQ_API_KEY is not set; AI endpoints will return errors");
    }

    init_database().await;

    let app = create_app();

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
