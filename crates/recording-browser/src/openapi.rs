use recording_browser_types::{
    Breadcrumb, DirectoryEntry, EntryLinks, HealthResponse, ListingResponse, SortMode,
};
use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::browse::browse_root,
        api::browse::browse_dir,
        api::files::inline_file,
        api::files::download_file,
        api::stream::stream_transcoded,
    ),
    components(
        schemas(
            SortMode,
            EntryLinks,
            DirectoryEntry,
            Breadcrumb,
            ListingResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "recording-browser", description = "Recording browser API")
    )
)]
pub struct ApiDoc;
