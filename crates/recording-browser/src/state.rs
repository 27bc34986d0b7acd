//! Shared application state.
//!
//! Built once at startup and shared read-only with every handler.

use crate::listing::AudioClassifier;
use crate::resolver::MediaRoot;
use crate::transcode::TranscodeProfile;

pub struct AppState {
    pub root: MediaRoot,
    pub audio: AudioClassifier,
    pub transcode: TranscodeProfile,
    /// Mount prefix used when building links ("" or "/segment").
    pub url_prefix: String,
}

impl AppState {
    pub fn new(
        root: MediaRoot,
        audio: AudioClassifier,
        transcode: TranscodeProfile,
        url_prefix: String,
    ) -> Self {
        Self {
            root,
            audio,
            transcode,
            url_prefix,
        }
    }
}
