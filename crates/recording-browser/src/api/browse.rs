//! Directory listing handlers.

use actix_web::{HttpResponse, Responder, get, web};
use recording_browser_types::{DirectoryEntry, EntryLinks, ListingResponse, SortMode};
use serde::Deserialize;

use crate::error::BrowseError;
use crate::listing::{breadcrumbs, list_dir, parent_of};
use crate::state::AppState;

/// Query parameters for directory listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    /// `name` or `time` (default `time`).
    pub sort: Option<String>,
    /// Case-insensitive substring filter on entry names.
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/",
    params(
        ("sort" = Option<String>, Query, description = "Sort mode: name or time"),
        ("q" = Option<String>, Query, description = "Case-insensitive name filter")
    ),
    responses(
        (status = 200, description = "Root listing", body = ListingResponse),
        (status = 403, description = "Directory not readable")
    )
)]
#[get("/")]
/// List the media root.
pub async fn browse_root(
    state: web::Data<AppState>,
    query: web::Query<ListingQuery>,
) -> impl Responder {
    listing_response(state, String::new(), query.into_inner()).await
}

#[utoipa::path(
    get,
    path = "/browse/{path}",
    params(
        ("path" = String, Path, description = "Directory path relative to the media root"),
        ("sort" = Option<String>, Query, description = "Sort mode: name or time"),
        ("q" = Option<String>, Query, description = "Case-insensitive name filter")
    ),
    responses(
        (status = 200, description = "Directory listing", body = ListingResponse),
        (status = 403, description = "Directory not readable"),
        (status = 404, description = "Not found")
    )
)]
#[get("/browse/{path:.*}")]
/// List a directory under the media root.
pub async fn browse_dir(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListingQuery>,
) -> impl Responder {
    listing_response(state, path.into_inner(), query.into_inner()).await
}

async fn listing_response(
    state: web::Data<AppState>,
    relative: String,
    query: ListingQuery,
) -> HttpResponse {
    let sort = SortMode::parse_lenient(query.sort.as_deref());
    let filter = query.q.unwrap_or_default();
    match web::block(move || build_listing(&state, &relative, &filter, sort)).await {
        Ok(Ok(listing)) => HttpResponse::Ok().json(listing),
        Ok(Err(err)) => err.into_response(),
        Err(err) => {
            tracing::error!(error = %err, "listing task failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn build_listing(
    state: &AppState,
    relative: &str,
    filter: &str,
    sort: SortMode,
) -> Result<ListingResponse, BrowseError> {
    let dir = state.root.resolve(relative)?;
    let meta = std::fs::metadata(&dir).map_err(BrowseError::from_io)?;
    if !meta.is_dir() {
        return Err(BrowseError::NotFound);
    }

    let mut entries = list_dir(&state.root, &dir, filter, sort, &state.audio)?;
    for entry in entries.iter_mut() {
        entry.links = links_for(&state.url_prefix, entry);
    }
    let path = state.root.relative_of(&dir);
    Ok(ListingResponse {
        parent: parent_of(&path),
        breadcrumbs: breadcrumbs(&path),
        path,
        sort,
        query: filter.to_string(),
        entries,
    })
}

/// Build endpoint links for an entry under the mount prefix.
pub(crate) fn links_for(prefix: &str, entry: &DirectoryEntry) -> EntryLinks {
    let encoded = encode_relative(&entry.relative_path);
    if entry.is_directory {
        return EntryLinks {
            browse: Some(format!("{prefix}/browse/{encoded}")),
            ..EntryLinks::default()
        };
    }
    EntryLinks {
        browse: None,
        file: Some(format!("{prefix}/file/{encoded}")),
        download: Some(format!("{prefix}/download/{encoded}")),
        stream: entry
            .is_audio
            .then(|| format!("{prefix}/stream/{encoded}")),
    }
}

fn encode_relative(relative: &str) -> String {
    relative
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
