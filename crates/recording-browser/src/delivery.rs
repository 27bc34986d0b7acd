//! Raw file delivery for the file and download endpoints.
//!
//! Conditional requests (ETag / Last-Modified) and byte ranges are handled
//! by `actix-files`; this module only validates the target and picks the
//! content disposition.

use std::path::Path;

use actix_files::NamedFile;
use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};

use crate::error::BrowseError;

/// Open `file` for delivery, inline or as an attachment.
///
/// Missing paths and anything that is not a regular file are `NotFound`.
pub async fn serve_file(file: &Path, as_attachment: bool) -> Result<NamedFile, BrowseError> {
    let meta = tokio::fs::metadata(file).await.map_err(BrowseError::from_io)?;
    if !meta.is_file() {
        return Err(BrowseError::NotFound);
    }
    let named = NamedFile::open_async(file)
        .await
        .map_err(BrowseError::from_io)?;

    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let disposition = if as_attachment {
        DispositionType::Attachment
    } else {
        DispositionType::Inline
    };
    Ok(named
        .use_etag(true)
        .use_last_modified(true)
        .set_content_disposition(ContentDisposition {
            disposition,
            parameters: vec![filename_param(name)],
        }))
}

fn filename_param(name: String) -> DispositionParam {
    if name.is_ascii() {
        DispositionParam::Filename(name)
    } else {
        DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext("UTF-8".to_owned()),
            language_tag: None,
            value: name.into_bytes(),
        })
    }
}
