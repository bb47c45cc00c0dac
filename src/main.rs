//! Nexa Backend - Rust-powered media library service
//!
//! This is the main entry point for the Nexa backend API.
//! All operations are exposed via GraphQL at /graphql.

mod api;
mod config;
mod db;
mod errors;
mod graphql;
mod jobs;
mod paths;
mod services;
mod settings;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::extract::WebSocketUpgrade;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::graphql::{verify_token, AuthUser, NexaSchema};
use crate::paths::Paths;
use crate::services::detail_fields::DetailFieldService;
use crate::services::ffmpeg::FfmpegService;
use crate::services::hub::HubService;
use crate::services::logging::{create_database_layer, DatabaseLoggerConfig};
use crate::services::notifications::JobNotificationFabric;
use crate::services::playback::PlaybackOrchestrator;
use crate::services::playlist::PlaylistService;
use crate::services::transcode::TranscodeManager;
use crate::settings::Settings;

/// Application state shared across REST handlers (`api::health`, `api::artwork`,
/// `api::stream`). GraphQL resolvers pull their services from schema-wide data instead
/// (see `graphql::build_schema`), so this stays small.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub paths: Arc<Paths>,
    pub schema: NexaSchema,
}

const DB_CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(2);
const DB_CONNECT_MAX_ATTEMPTS: u32 = 15;

/// `Database::connect` has no retry of its own; the database is usually a bind-mounted sqlite
/// file that the container volume may still be attaching when this process starts, so retry a
/// handful of times before giving up.
async fn connect_with_retry(url: &str) -> anyhow::Result<Database> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match Database::connect(url).await {
            Ok(db) => return Ok(db),
            Err(e) if attempt < DB_CONNECT_MAX_ATTEMPTS => {
                tracing::warn!(error = %e, attempt, "database connection failed, retrying");
                tokio::time::sleep(DB_CONNECT_RETRY_INTERVAL).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let config = Arc::new(config);

    eprintln!("Connecting to database...");
    let db = connect_with_retry(&config.database_url).await?;
    eprintln!("Database connected!");

    eprintln!("Running database migrations...");
    if let Err(e) = db.migrate().await {
        eprintln!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }
    eprintln!("Migrations complete!");

    let db_logger_config = DatabaseLoggerConfig {
        min_level: tracing::Level::INFO,
        batch_size: 100,
        flush_interval_ms: 2000,
        broadcast_capacity: 1000,
    };
    let (db_layer, log_broadcast_sender) = create_database_layer(db.pool().clone(), db_logger_config);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("nexa={},tower_http=info", config.log_level).into()))
        .with(tracing_subscriber::fmt::layer().json())
        .with(db_layer)
        .init();

    tracing::info!("Starting Nexa backend");

    let paths = Paths::resolve(&config)?;
    let paths_arc = Arc::new(paths.clone());
    tracing::info!(data = %paths.data.display(), cache = %paths.cache.display(), "paths resolved");

    let settings = Arc::new(Settings::new(db.pool().clone()));
    settings.warm().await?;

    let fabric = JobNotificationFabric::new(db.clone());
    let _flush_handle = fabric.clone().spawn_flush_loop();

    let ffmpeg = Arc::new(FfmpegService::new());

    let idle_timeout = Duration::from_secs(config.playback_session_ttl_secs);
    let transcode_for_playback = TranscodeManager::new(db.clone(), config.max_concurrent_transcodes, idle_timeout);
    transcode_for_playback.cleanup_stale_jobs().await?;
    let transcode_shared = Arc::new(TranscodeManager::new(db.clone(), config.max_concurrent_transcodes, idle_timeout));

    let playlists_for_playback = PlaylistService::new(db.clone());
    let playlists_shared = Arc::new(PlaylistService::new(db.clone()));

    let playback = Arc::new(PlaybackOrchestrator::new(db.clone(), paths.clone(), transcode_for_playback, playlists_for_playback));

    let hubs = Arc::new(HubService::new(db.clone()));
    let detail_fields = Arc::new(DetailFieldService::new(db.clone()));

    let http_client = reqwest::Client::new();
    let (metadata_updates, _) = broadcast::channel::<Uuid>(256);

    // No concrete metadata-agent implementations ship in this crate (see graphql::schema::agents);
    // the scheduler's rescan and refresh fan-outs both run over an empty agent list.
    let agents = Vec::new();

    let schema = graphql::build_schema(
        db.clone(),
        config.clone(),
        paths_arc.clone(),
        fabric.clone(),
        ffmpeg.clone(),
        transcode_shared.clone(),
        playback.clone(),
        playlists_shared.clone(),
        hubs.clone(),
        detail_fields.clone(),
        settings.clone(),
        http_client.clone(),
        Some(log_broadcast_sender),
        metadata_updates.clone(),
    );
    tracing::info!("GraphQL schema built");

    let _scheduler = jobs::start_scheduler(db.clone(), config.clone(), paths_arc.clone(), fabric.clone(), transcode_shared.clone(), agents).await?;
    tracing::info!("Job scheduler started");

    let state = AppState {
        config: config.clone(),
        db: db.clone(),
        paths: paths_arc.clone(),
        schema,
    };

    let app = Router::new()
        .merge(api::health::router())
        .merge(api::artwork::router())
        .merge(api::stream::router())
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/graphql/ws", get(graphql_ws_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphQL playground: http://localhost:{}/graphql", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .filter(|h| h.starts_with("Bearer "))
        .map(|h| h[7..].to_string())
}

/// Resolves a verified JWT subject into this crate's `AuthUser` row, creating one on first
/// sight. The token carries no display-name claim, so new users are seeded with their uuid's
/// string form; callers are expected to rename via `users.rename` afterward if they want
/// something friendlier.
async fn resolve_auth_user(db: &Database, token: &str, jwt_secret: &str) -> Option<AuthUser> {
    let uuid = verify_token(token, jwt_secret).ok()?;
    match db.users().get_or_create(uuid, &uuid.to_string()).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(error = %e, "failed to resolve authenticated user");
            None
        }
    }
}

async fn graphql_handler(axum::extract::State(state): axum::extract::State<AppState>, headers: HeaderMap, req: GraphQLRequest) -> GraphQLResponse {
    let mut request = req.into_inner();

    if let Some(token) = extract_token(&headers) {
        if let Some(user) = resolve_auth_user(&state.db, &token, &state.config.jwt_secret).await {
            request = request.data(user);
        }
    }

    state.schema.execute(request).await.into()
}

async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(GraphiQLSource::build().endpoint("/graphql").subscription_endpoint("/graphql/ws").finish()).into_response()
    } else {
        (
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

async fn graphql_ws_handler(axum::extract::State(state): axum::extract::State<AppState>, headers: HeaderMap, protocol: GraphQLProtocol, ws: WebSocketUpgrade) -> impl IntoResponse {
    let initial_auth_user = match extract_token(&headers) {
        Some(token) => resolve_auth_user(&state.db, &token, &state.config.jwt_secret).await,
        None => None,
    };

    let db = state.db.clone();
    let jwt_secret = state.config.jwt_secret.clone();

    ws.protocols(["graphql-transport-ws", "graphql-ws"]).on_upgrade(move |socket| {
        let mut ws = GraphQLWebSocket::new(socket, state.schema.clone(), protocol);

        if let Some(user) = initial_auth_user {
            let mut data = async_graphql::Data::default();
            data.insert(user);
            ws = ws.with_data(data);
        }

        ws.on_connection_init(move |params| {
            let db = db.clone();
            let jwt_secret = jwt_secret.clone();
            async move {
                let token = params
                    .get("Authorization")
                    .or_else(|| params.get("authorization"))
                    .and_then(|v| v.as_str())
                    .map(|t| t.strip_prefix("Bearer ").unwrap_or(t).to_string());

                if let Some(token) = token {
                    if let Some(user) = resolve_auth_user(&db, &token, &jwt_secret).await {
                        let mut data = async_graphql::Data::default();
                        data.insert(user);
                        return Ok(data);
                    }
                }
                Ok(async_graphql::Data::default())
            }
        })
        .serve()
    })
}
