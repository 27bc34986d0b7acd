//! HTTP API handlers.
//!
//! Defines the Actix routes for browsing, file delivery and live streams.

pub mod browse;
pub mod files;
pub mod health;
pub mod stream;

use actix_web::web;

pub use browse::{browse_dir, browse_root};
pub use files::{download_file, inline_file};
pub use stream::stream_transcoded;

/// Register every route; mounted under the configured prefix by startup.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(browse_root)
        .service(browse_dir)
        .service(inline_file)
        .service(download_file)
        .service(stream_transcoded);
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test, web};
    use recording_browser_types::ListingResponse;
    use tempfile::TempDir;

    use crate::api;
    use crate::listing::AudioClassifier;
    use crate::resolver::MediaRoot;
    use crate::state::AppState;
    use crate::transcode::TranscodeProfile;

    struct Fixture {
        tmp: TempDir,
        state: web::Data<AppState>,
    }

    impl Fixture {
        fn media(&self) -> PathBuf {
            self.tmp.path().join("media")
        }
    }

    /// Media tree under `<tmp>/media`, a secret next to it, and the given decoder.
    fn fixture_with_decoder(decoder: impl FnOnce(&Path) -> PathBuf) -> Fixture {
        let tmp = TempDir::new().expect("temp dir");
        let media = tmp.path().join("media");
        std::fs::create_dir_all(media.join("calls")).unwrap();
        std::fs::write(media.join("calls").join("first.wav"), b"RIFF0123456789").unwrap();
        std::fs::write(media.join("record1.wav"), b"RIFFabc").unwrap();
        std::fs::write(media.join("notes.txt"), b"hello").unwrap();
        std::fs::write(media.join("Recording2.gsm"), b"gsm").unwrap();
        std::fs::write(media.join(".hidden.wav"), b"x").unwrap();
        std::fs::write(tmp.path().join("secret.txt"), b"top secret").unwrap();

        let decoder = decoder(tmp.path());
        let state = web::Data::new(AppState::new(
            MediaRoot::new(&media).expect("media root"),
            AudioClassifier::default(),
            TranscodeProfile {
                decoder,
                chunk_size: 4096,
                ..TranscodeProfile::default()
            },
            String::new(),
        ));
        Fixture { tmp, state }
    }

    fn fixture() -> Fixture {
        fixture_with_decoder(|dir| dir.join("no-such-decoder"))
    }

    macro_rules! app {
        ($fixture:expr) => {
            test::init_service(
                App::new()
                    .app_data($fixture.state.clone())
                    .configure(api::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn root_listing_puts_directories_first() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/?sort=name").to_request();
        let listing: ListingResponse = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["calls", "notes.txt", "record1.wav", "Recording2.gsm"]
        );
        assert_eq!(listing.path, "");
        assert!(listing.parent.is_none());
        assert_eq!(listing.breadcrumbs.len(), 1);
    }

    #[actix_web::test]
    async fn nested_listing_reports_parent_and_links() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/browse/calls").to_request();
        let listing: ListingResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listing.path, "calls");
        assert_eq!(listing.parent.as_deref(), Some(""));
        assert_eq!(listing.entries.len(), 1);
        let entry = &listing.entries[0];
        assert_eq!(entry.relative_path, "calls/first.wav");
        assert_eq!(entry.links.stream.as_deref(), Some("/stream/calls/first.wav"));
    }

    #[actix_web::test]
    async fn filter_matches_case_insensitively() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get()
            .uri("/?q=REC&sort=name")
            .to_request();
        let listing: ListingResponse = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["record1.wav", "Recording2.gsm"]);
        assert_eq!(listing.query, "REC");
    }

    #[actix_web::test]
    async fn unknown_sort_falls_back_to_time() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/?sort=size").to_request();
        let listing: ListingResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listing.sort, recording_browser_types::SortMode::Time);
        assert!(listing.entries[0].is_directory);
    }

    #[actix_web::test]
    async fn repeated_listing_is_byte_identical() {
        let fx = fixture();
        let app = app!(fx);

        let first = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/?sort=time").to_request(),
        )
        .await;
        let second = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/?sort=time").to_request(),
        )
        .await;
        assert_eq!(first, second);
    }

    #[actix_web::test]
    async fn traversal_is_not_found_on_every_endpoint() {
        let fx = fixture();
        let app = app!(fx);

        for uri in [
            "/browse/..",
            "/browse/../..",
            "/file/../secret.txt",
            "/download/../secret.txt",
            "/stream/../secret.txt",
            "/file/calls/../../secret.txt",
            "/file/%2e%2e/secret.txt",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "uri {uri}");
            let body = test::read_body(resp).await;
            assert!(
                !String::from_utf8_lossy(&body).contains("top secret"),
                "uri {uri} leaked content"
            );
        }
    }

    #[actix_web::test]
    async fn malformed_paths_are_not_found() {
        let fx = fixture();
        let app = app!(fx);

        let long = "x".repeat(300);
        let uris = vec![
            "/file/a%00b.wav".to_string(),
            "/download/a%00b.wav".to_string(),
            "/browse/a%00b".to_string(),
            "/stream/a%00b.wav".to_string(),
            format!("/file/{long}"),
            format!("/browse/{long}"),
            format!("/stream/{long}.wav"),
        ];
        for uri in uris {
            let req = test::TestRequest::get().uri(&uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "uri {uri}");
        }
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn listing_does_not_follow_links_out_of_root() {
        let fx = fixture();
        std::fs::write(fx.tmp.path().join("secret.bin"), vec![0u8; 12345]).unwrap();
        std::os::unix::fs::symlink(
            fx.tmp.path().join("secret.bin"),
            fx.media().join("leak.bin"),
        )
        .unwrap();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/?q=leak").to_request();
        let listing: ListingResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listing.entries.len(), 1);
        assert_ne!(listing.entries[0].size_bytes, 12345);

        let req = test::TestRequest::get().uri("/file/leak.bin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn wrong_kind_is_not_found() {
        let fx = fixture();
        let app = app!(fx);

        for uri in ["/browse/notes.txt", "/file/calls", "/download/calls", "/stream/calls"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "uri {uri}");
        }
    }

    #[actix_web::test]
    async fn file_and_download_differ_only_in_disposition() {
        let fx = fixture();
        let app = app!(fx);

        let inline = test::call_service(
            &app,
            test::TestRequest::get().uri("/file/calls/first.wav").to_request(),
        )
        .await;
        assert_eq!(inline.status(), StatusCode::OK);
        let inline_disposition = inline
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let inline_body = test::read_body(inline).await;

        let download = test::call_service(
            &app,
            test::TestRequest::get().uri("/download/calls/first.wav").to_request(),
        )
        .await;
        assert_eq!(download.status(), StatusCode::OK);
        let download_disposition = download
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let download_body = test::read_body(download).await;

        assert!(inline_disposition.starts_with("inline"));
        assert!(download_disposition.starts_with("attachment"));
        assert_eq!(inline_body, download_body);
        assert_eq!(&inline_body[..], b"RIFF0123456789");
    }

    #[actix_web::test]
    async fn file_honors_range_requests() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get()
            .uri("/file/calls/first.wav")
            .insert_header((header::RANGE, "bytes=4-7"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"0123");
    }

    #[actix_web::test]
    async fn file_honors_conditional_requests() {
        let fx = fixture();
        let app = app!(fx);

        let first = test::call_service(
            &app,
            test::TestRequest::get().uri("/file/record1.wav").to_request(),
        )
        .await;
        let etag = first
            .headers()
            .get(header::ETAG)
            .cloned()
            .expect("etag header");

        let req = test::TestRequest::get()
            .uri("/file/record1.wav")
            .insert_header((header::IF_NONE_MATCH, etag))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn stream_without_decoder_is_server_error() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/stream/record1.wav").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn unreadable_directory_is_forbidden() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let locked = fx.media().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read_dir(&locked).is_ok() {
            // Running privileged; permission bits are not enforced.
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/browse/locked").to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = test::TestRequest::get().uri("/browse/missing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[cfg(unix)]
    mod streaming {
        use super::*;
        use crate::transcode::test_support::fake_decoder;

        /// Freshly written scripts can briefly fail to exec ("text file busy")
        /// while another test thread forks; retry those spawns.
        macro_rules! stream_request {
            ($app:expr, $uri:expr) => {{
                let mut attempts = 0;
                loop {
                    let req = test::TestRequest::get().uri($uri).to_request();
                    let resp = test::call_service(&$app, req).await;
                    attempts += 1;
                    if resp.status() != StatusCode::INTERNAL_SERVER_ERROR || attempts == 5 {
                        break resp;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }};
        }

        #[actix_web::test]
        async fn stream_is_live_mp3_without_length() {
            let fx = fixture_with_decoder(|dir| {
                fake_decoder(dir, "decoder.sh", "exec head -c 10000 /dev/zero")
            });
            let app = app!(fx);

            let resp = stream_request!(app, "/stream/record1.wav");
            assert_eq!(resp.status(), StatusCode::OK);
            let headers = resp.headers();
            assert_eq!(
                headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
                Some("audio/mpeg")
            );
            assert_eq!(
                headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok()),
                Some("no-store")
            );
            assert!(headers.get(header::CONTENT_LENGTH).is_none());
            let body = test::read_body(resp).await;
            assert_eq!(body.len(), 10000);
        }

        #[actix_web::test]
        async fn missing_recording_never_spawns_decoder() {
            let fx = fixture_with_decoder(|dir| {
                let marker = dir.join("spawned");
                fake_decoder(
                    dir,
                    "decoder.sh",
                    &format!("touch '{}'\nexec head -c 10 /dev/zero", marker.display()),
                )
            });
            let app = app!(fx);

            let req = test::TestRequest::get().uri("/stream/nope.wav").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            assert!(!fx.tmp.path().join("spawned").exists());
        }

        #[cfg(target_os = "linux")]
        #[actix_web::test]
        async fn client_disconnect_kills_decoder() {
            use std::pin::Pin;

            use actix_web::body::MessageBody;
            use futures_util::future::poll_fn;

            use crate::transcode::test_support::process_gone;

            let fx = fixture_with_decoder(|dir| {
                let pid_file = dir.join("decoder.pid");
                fake_decoder(
                    dir,
                    "decoder.sh",
                    &format!("echo $$ > '{}'\nexec cat /dev/zero", pid_file.display()),
                )
            });
            let app = app!(fx);

            let resp = stream_request!(app, "/stream/record1.wav");
            assert_eq!(resp.status(), StatusCode::OK);
            let mut body = resp.into_body();
            let first = poll_fn(|cx| Pin::new(&mut body).poll_next(cx)).await;
            assert!(matches!(first, Some(Ok(ref chunk)) if !chunk.is_empty()));

            let pid: u32 = std::fs::read_to_string(fx.tmp.path().join("decoder.pid"))
                .expect("pid file")
                .trim()
                .parse()
                .expect("pid");
            assert!(!process_gone(pid));

            drop(body);

            let mut gone = false;
            for _ in 0..50 {
                if process_gone(pid) {
                    gone = true;
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            assert!(gone, "decoder {pid} survived client disconnect");
        }
    }
}
