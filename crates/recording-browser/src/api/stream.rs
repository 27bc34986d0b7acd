//! Live transcoded stream handler.

use actix_web::http::header;
use actix_web::{HttpResponse, Responder, get, web};

use crate::state::AppState;
use crate::transcode::{into_body_stream, open_transcode_stream};

#[utoipa::path(
    get,
    path = "/stream/{path}",
    params(
        ("path" = String, Path, description = "Recording path relative to the media root")
    ),
    responses(
        (status = 200, description = "Live audio/mpeg stream without Content-Length"),
        (status = 404, description = "Not found"),
        (status = 500, description = "Transcoder unavailable")
    )
)]
#[get("/stream/{path:.*}")]
/// Transcode a recording on the fly and stream the result.
pub async fn stream_transcoded(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let file = match state.root.resolve(&path) {
        Ok(file) => file,
        Err(err) => return err.into_response(),
    };
    let session = match open_transcode_stream(&file, &state.transcode).await {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, state.transcode.format.content_type()))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .insert_header((header::ACCEPT_RANGES, "none"))
        .streaming(into_body_stream(session))
}
