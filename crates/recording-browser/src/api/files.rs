//! Raw file handlers (inline and attachment).

use actix_web::{HttpRequest, HttpResponse, Responder, get, web};

use crate::delivery::serve_file;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/file/{path}",
    params(
        ("path" = String, Path, description = "File path relative to the media root")
    ),
    responses(
        (status = 200, description = "Full file"),
        (status = 206, description = "Partial content"),
        (status = 304, description = "Not modified"),
        (status = 403, description = "File not readable"),
        (status = 404, description = "Not found"),
        (status = 416, description = "Invalid range")
    )
)]
#[get("/file/{path:.*}")]
/// Serve a file inline with conditional and range support.
pub async fn inline_file(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> impl Responder {
    deliver(&state, &path, false, &req).await
}

#[utoipa::path(
    get,
    path = "/download/{path}",
    params(
        ("path" = String, Path, description = "File path relative to the media root")
    ),
    responses(
        (status = 200, description = "Full file as attachment"),
        (status = 206, description = "Partial content"),
        (status = 304, description = "Not modified"),
        (status = 403, description = "File not readable"),
        (status = 404, description = "Not found")
    )
)]
#[get("/download/{path:.*}")]
/// Serve a file as an attachment.
pub async fn download_file(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> impl Responder {
    deliver(&state, &path, true, &req).await
}

async fn deliver(
    state: &AppState,
    relative: &str,
    as_attachment: bool,
    req: &HttpRequest,
) -> HttpResponse {
    let file = match state.root.resolve(relative) {
        Ok(file) => file,
        Err(err) => return err.into_response(),
    };
    match serve_file(&file, as_attachment).await {
        Ok(named) => named.into_response(req),
        Err(err) => err.into_response(),
    }
}
