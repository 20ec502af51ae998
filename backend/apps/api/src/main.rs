//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but request-level
//! errors are `auth::AuthError` rendered as `kernel::error::AppError`.

mod config;

use auth::application::{SignUpInput, SignUpUseCase, run_maintenance};
use auth::domain::repository::AuthStore;
use auth::{AuthContext, AuthError, MemoryAuthRepository, PgAuthRepository, auth_router};
use axum::{
    Router,
    http::{Method, header},
};
use platform::client::ClientInfo;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AdminBootstrap, ApiConfig, StoreKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    match config.store.clone() {
        StoreKind::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;

            tracing::info!("Connected to database");

            // Run migrations
            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            serve(PgAuthRepository::new(pool), config).await
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory auth store; state is lost on restart");
            serve(MemoryAuthRepository::new(), config).await
        }
    }
}

async fn serve<R: AuthStore>(repo: R, config: ApiConfig) -> anyhow::Result<()> {
    let ctx = AuthContext::with_system_clock(repo, config.auth)?;

    // Startup cleanup: errors here never prevent server startup
    run_maintenance(&ctx).await;

    if let Some(admin) = &config.admin {
        bootstrap_admin(&ctx, admin).await?;
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .expose_headers([header::RETRY_AFTER])
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api", auth_router(ctx))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the configured admin account unless it already exists
async fn bootstrap_admin<R: AuthStore>(
    ctx: &AuthContext<R>,
    admin: &AdminBootstrap,
) -> anyhow::Result<()> {
    let input = SignUpInput {
        username: admin.username.clone(),
        password: admin.password.clone(),
        is_admin: true,
    };

    match SignUpUseCase::new(ctx.clone())
        .execute(input, &ClientInfo::default())
        .await
    {
        Ok(out) => {
            tracing::info!(username = %out.username, "Admin account created");
            Ok(())
        }
        Err(AuthError::UserNameTaken) => {
            tracing::info!(username = %admin.username, "Admin account already exists");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Admin bootstrap failed: {e}")),
    }
}
