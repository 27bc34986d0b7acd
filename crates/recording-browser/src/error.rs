//! Request-level error taxonomy.
//!
//! Every handler funnels failures through [`BrowseError`] so the mapping to
//! HTTP status codes lives in one place and never leaks filesystem layout.

use std::io;

use actix_web::HttpResponse;
use actix_web::http::StatusCode;

/// Errors surfaced by the resolver, lister, delivery and transcode paths.
#[derive(Debug, thiserror::Error)]
pub enum BrowseError {
    /// The requested path escapes the media root.
    #[error("path escapes the media root")]
    ContainmentViolation,
    /// The path does not exist or is the wrong kind for the endpoint.
    #[error("not found")]
    NotFound,
    /// The filesystem refused access to an existing path.
    #[error("permission denied")]
    PermissionDenied,
    /// The decoder executable could not be started.
    #[error("transcoder unavailable ({decoder}): {reason}")]
    TranscodeUnavailable { decoder: String, reason: String },
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl BrowseError {
    /// Classify an I/O error from opening or stat-ing a path.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::InvalidInput => BrowseError::NotFound,
            io::ErrorKind::PermissionDenied => BrowseError::PermissionDenied,
            _ => BrowseError::Io(err),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BrowseError::ContainmentViolation | BrowseError::NotFound => StatusCode::NOT_FOUND,
            BrowseError::PermissionDenied => StatusCode::FORBIDDEN,
            BrowseError::TranscodeUnavailable { .. } | BrowseError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Convert into an HTTP response with a short plain-text body.
    pub fn into_response(self) -> HttpResponse {
        let body = match &self {
            BrowseError::ContainmentViolation | BrowseError::NotFound => "not found",
            BrowseError::PermissionDenied => "permission denied",
            BrowseError::TranscodeUnavailable { .. } => "transcoder unavailable",
            BrowseError::Io(_) => "internal error",
        };
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(body)
    }
}

impl From<io::Error> for BrowseError {
    fn from(err: io::Error) -> Self {
        BrowseError::from_io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_reported_as_not_found() {
        assert_eq!(
            BrowseError::ContainmentViolation.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(BrowseError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn io_kinds_are_classified() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(BrowseError::from_io(denied), BrowseError::PermissionDenied));
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(BrowseError::from_io(missing), BrowseError::NotFound));
        let nul = io::Error::from(io::ErrorKind::InvalidInput);
        assert!(matches!(BrowseError::from_io(nul), BrowseError::NotFound));
        let other = io::Error::other("boom");
        assert!(matches!(BrowseError::from_io(other), BrowseError::Io(_)));
    }

    #[test]
    fn denied_io_becomes_forbidden_response() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let resp = BrowseError::from_io(denied).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let missing = io::Error::from(io::ErrorKind::NotFound);
        let resp = BrowseError::from_io(missing).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unavailable_decoder_is_a_server_error() {
        let err = BrowseError::TranscodeUnavailable {
            decoder: "ffmpeg".to_string(),
            reason: "missing".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
