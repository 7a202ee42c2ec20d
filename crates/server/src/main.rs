use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{StoryListResponse, StoryManifestResponse},
};
use storage::StoryLibrary;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{ApiContext, MediaScope};
use app_state::AppState;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (settings, warnings) = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();
    for warning in &warnings {
        warn!("{warning}");
    }

    let library = StoryLibrary::new(settings.library_config())?;
    let state = AppState {
        api: ApiContext {
            library,
            media_cache_seconds: settings.media_cache_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, roots = ?settings.story_roots, "story server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD]);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stories", get(http_list_stories))
        .route("/api/stories/:story_id", get(http_story_manifest))
        .route("/api/media/*path", get(http_media))
        .route("/output/*path", get(http_static))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Malformed | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(error.code), Json(error))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_list_stories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoryListResponse>, (StatusCode, Json<ApiError>)> {
    api::list_stories(&state.api).await.map(Json).map_err(reject)
}

async fn http_story_manifest(
    State(state): State<Arc<AppState>>,
    Path(story_id): Path<String>,
) -> Result<Json<StoryManifestResponse>, (StatusCode, Json<ApiError>)> {
    api::story_manifest(&state.api, &story_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_media(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    serve_media(&state.api, &path, MediaScope::Resolved).await
}

async fn http_static(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    serve_media(&state.api, &path, MediaScope::Static).await
}

async fn serve_media(
    ctx: &ApiContext,
    path: &str,
    scope: MediaScope,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let file = api::media_file(ctx, path, scope).await.map_err(reject)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(file.content_type),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("public, max-age={}", ctx.media_cache_seconds))
    {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if file.placeholder {
        headers.insert("x-story-placeholder", HeaderValue::from_static("true"));
    }

    Ok((StatusCode::OK, headers, file.bytes).into_response())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
