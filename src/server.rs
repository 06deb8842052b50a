use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::image_rewrite::ImageRewriter;
use crate::paginate::{self, DEFAULT_TAKE, PageLimits};
use crate::proxy::{ImageProxy, ProxiedImage};
use crate::upstream::UpstreamClient;

/// Per-process handles shared by every request. Nothing in here is mutated.
#[derive(Clone)]
pub struct AppState {
    upstream: Arc<UpstreamClient>,
    proxy: Arc<ImageProxy>,
    limits: PageLimits,
    public_url: Option<String>,
    rewrite_images: bool,
}

impl AppState {
    pub fn new(upstream: UpstreamClient, proxy: ImageProxy, config: &GatewayConfig) -> Self {
        Self {
            upstream: Arc::new(upstream),
            proxy: Arc::new(proxy),
            limits: config.upstream.limits,
            public_url: config.public_url.clone(),
            rewrite_images: config.rewrite_images,
        }
    }

    fn rewriter(&self, headers: &HeaderMap, uri: &Uri) -> Option<ImageRewriter> {
        if !self.rewrite_images {
            return None;
        }
        Some(ImageRewriter::new(&self.public_base(headers, uri)))
    }

    /// Configured public URL, else scheme + authority of the incoming request
    /// (`Host` header, then the request target as HTTP/2 sends it), else empty
    /// (rewritten links become root-relative).
    fn public_base(&self, headers: &HeaderMap, uri: &Uri) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|h| !h.is_empty())
            .or_else(|| uri.authority().map(|a| a.as_str()));
        let Some(host) = host else {
            return String::new();
        };
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.scheme_str())
            .filter(|p| matches!(*p, "http" | "https"))
            .unwrap_or("http");
        format!("{proto}://{host}")
    }

    fn finish(&self, headers: &HeaderMap, uri: &Uri, value: Value) -> Json<Value> {
        match self.rewriter(headers, uri) {
            Some(rewriter) => Json(rewriter.rewrite(value)),
            None => Json(value),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/series", get(list_series))
        .route("/series/:slug", get(series_detail))
        .route("/series/:slug/chapters", get(chapters))
        .route("/series/:slug/chapters/:chapter", get(chapter_detail))
        .route("/proxy", get(proxy_image))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the outbound clients, serves until Ctrl-C/SIGTERM, then drops them.
pub async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    let upstream = config.upstream.build_client()?;
    let proxy = config.build_proxy()?;
    let app = router(AppState::new(upstream, proxy, &config));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", config.addr))?;
    tracing::info!(
        addr = %config.addr,
        upstream = %config.upstream.base,
        page_size = config.upstream.limits.page_size,
        page_ceiling = config.upstream.limits.page_ceiling,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
}

async fn root() -> Json<Value> {
    Json(serde_json::json!({
        "status": 200,
        "message": "Komikcast API gateway with offset and cursor pagination",
        "modes": ["offset", "cursor"],
    }))
}

#[derive(Debug, Deserialize)]
struct SeriesQuery {
    offset: Option<u64>,
    take: Option<u32>,
    cursor: Option<String>,
}

async fn list_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    query: Result<Query<SeriesQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(q) = query.map_err(|err| GatewayError::validation(err.body_text()))?;
    let take = q.take.unwrap_or(DEFAULT_TAKE);
    let rewriter = state.rewriter(&headers, &uri);

    match (q.offset, q.cursor) {
        (Some(_), Some(_)) => Err(GatewayError::validation(
            "offset and cursor cannot be combined",
        )),
        (None, Some(cursor)) => {
            let mut page = paginate::cursor::paginate(
                state.upstream.as_ref(),
                state.limits,
                Some(&cursor),
                take,
            )
            .await?;
            if let Some(rewriter) = rewriter {
                page = page.map_items(|item| rewriter.rewrite(item));
            }
            Ok(Json(page).into_response())
        }
        (offset, None) => {
            let mut page = paginate::offset::paginate(
                state.upstream.as_ref(),
                state.limits,
                offset.unwrap_or(0),
                take,
            )
            .await?;
            if let Some(rewriter) = rewriter {
                page = page.map_items(|item| rewriter.rewrite(item));
            }
            Ok(Json(page).into_response())
        }
    }
}

async fn series_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(slug): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let value = state.upstream.series_detail(&slug).await?;
    Ok(state.finish(&headers, &uri, value))
}

async fn chapters(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(slug): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let value = state.upstream.chapters(&slug).await?;
    Ok(state.finish(&headers, &uri, value))
}

async fn chapter_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path((slug, chapter)): Path<(String, String)>,
) -> Result<Json<Value>, GatewayError> {
    let chapter: u32 = chapter.trim().parse().map_err(|_| {
        GatewayError::validation(format!("chapter must be a non-negative integer: {chapter:?}"))
    })?;
    let value = state.upstream.chapter_detail(&slug, chapter).await?;
    Ok(state.finish(&headers, &uri, value))
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
    referer: Option<String>,
}

async fn proxy_image(
    State(state): State<AppState>,
    query: Result<Query<ProxyQuery>, QueryRejection>,
) -> Result<ProxiedImage, GatewayError> {
    let Query(q) = query.map_err(|err| GatewayError::validation(err.body_text()))?;
    let target = state.proxy.validate_target(q.url.as_deref())?;
    tracing::debug!(%target, "proxy image");
    state.proxy.fetch(&target, q.referer.as_deref()).await
}
