//! Actix server startup + app wiring.
//!
//! Builds the shared state, routes, middleware, and OpenAPI endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use anyhow::Result;
use futures_util::future::{LocalBoxFuture, Ready, ok};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::config;
use crate::openapi;
use crate::resolver::MediaRoot;
use crate::state::AppState;

/// Build server state and start the Actix HTTP server.
pub(crate) async fn run(args: crate::Args) -> Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let bind = resolve_bind(args.bind, &cfg)?;
    let media_dir = resolve_media_dir(args.media_dir, &cfg)?;
    let url_prefix = match args.url_prefix.as_deref() {
        Some(raw) => config::normalize_url_prefix(raw),
        None => config::url_prefix_from_config(&cfg),
    };
    let root = MediaRoot::new(&media_dir)?;
    let audio = config::audio_classifier_from_config(&cfg);
    let transcode = config::transcode_profile_from_config(&cfg)?;
    tracing::info!(
        bind = %bind,
        media_dir = %root.path().display(),
        url_prefix = %url_prefix,
        decoder = %transcode.decoder.display(),
        "starting recording-browser"
    );

    let state = web::Data::new(AppState::new(root, audio, transcode, url_prefix.clone()));
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "HEAD"])
            .allowed_headers(vec![
                actix_web::http::header::RANGE,
                actix_web::http::header::IF_NONE_MATCH,
                actix_web::http::header::IF_MODIFIED_SINCE,
            ])
            .expose_headers(vec![
                actix_web::http::header::CONTENT_RANGE,
                actix_web::http::header::CONTENT_DISPOSITION,
            ])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(FilteredLogger)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(web::scope(&url_prefix).configure(api::configure))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

/// Return true when the request path should be logged.
fn should_log_path(path: &str) -> bool {
    !(path.ends_with("/health") || path.starts_with("/swagger-ui/"))
}

/// Name the endpoint family a matched route pattern belongs to.
fn route_kind(pattern: Option<&str>) -> &'static str {
    let Some(pattern) = pattern else {
        return "unmatched";
    };
    if let Some(head) = pattern.strip_suffix("/{path:.*}") {
        return match head.rsplit('/').next() {
            Some("browse") => "browse",
            Some("file") => "file",
            Some("download") => "download",
            Some("stream") => "stream",
            _ => "other",
        };
    }
    if pattern.ends_with("/health") {
        "health"
    } else if pattern.ends_with('/') {
        "browse"
    } else {
        "other"
    }
}

/// Actix middleware that filters noisy paths from logging.
struct FilteredLogger;

impl<S, B> actix_web::dev::Transform<S, ServiceRequest> for FilteredLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = FilteredLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(FilteredLoggerMiddleware { service })
    }
}

/// Service wrapper that applies the logging filter.
struct FilteredLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for FilteredLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();
        let should_log = should_log_path(&path);
        let method = req.method().clone();
        let peer = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("-")
            .to_string();
        let ua = req
            .headers()
            .get(actix_web::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        let range = req
            .headers()
            .get(actix_web::http::header::RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let start = std::time::Instant::now();
        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            if should_log {
                let route = route_kind(res.request().match_pattern().as_deref());
                // Streams are logged when headers go out, not when the body ends.
                tracing::info!(
                    method = %method,
                    path = %path,
                    route,
                    status = %res.status().as_u16(),
                    range = range.as_deref().unwrap_or("-"),
                    user_agent = %ua,
                    peer = %peer,
                    elapsed_ms = %start.elapsed().as_millis(),
                    "http request"
                );
            }
            Ok(res)
        })
    }
}

/// Load server config from disk or return defaults.
fn load_config(path: Option<&PathBuf>) -> Result<config::ServerConfig> {
    if let Some(path) = path {
        return config::ServerConfig::load(path);
    }
    let auto_path = std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
    match auto_path {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "using config next to executable");
            config::ServerConfig::load(&path)
        }
        _ => Ok(config::ServerConfig::default()),
    }
}

/// Resolve the final bind address from args + config.
fn resolve_bind(bind: Option<SocketAddr>, cfg: &config::ServerConfig) -> Result<SocketAddr> {
    match bind {
        Some(addr) => Ok(addr),
        None => config::bind_from_config(cfg),
    }
}

/// Resolve the media directory from args + config.
fn resolve_media_dir(dir: Option<PathBuf>, cfg: &config::ServerConfig) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => config::media_dir_from_config(cfg),
    }
}
