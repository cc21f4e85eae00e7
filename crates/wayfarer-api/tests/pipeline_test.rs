//! Upload pipeline integration tests with injected service doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use bytes::Bytes;

use wayfarer_api::{pipeline, routes, AppState};
use wayfarer_core::models::{RemoteReference, ScanVerdict, UploadCategory};
use wayfarer_core::{AppError, Config};
use wayfarer_services::{CdnError, RemoteStore, Scanner, SignedCredential};

fn test_config() -> Config {
    Config {
        server_port: 0,
        environment: "test".to_string(),
        clamav_enabled: true,
        clamav_host: "localhost".to_string(),
        clamav_port: 3310,
        clamav_fail_closed: false,
        clamav_timeout_secs: 5,
        max_photo_size_bytes: 10 * 1024 * 1024,
        max_avatar_size_bytes: 5 * 1024 * 1024,
        max_banner_size_bytes: 10 * 1024 * 1024,
        photo_target_bytes: 2 * 1024 * 1024,
        avatar_target_bytes: 1024 * 1024,
        banner_target_bytes: 2 * 1024 * 1024,
        cdn_upload_url: "https://upload.cdn.example.com/api/v1/files".to_string(),
        cdn_api_url: "https://api.cdn.example.com/v1".to_string(),
        cdn_url_endpoint: "https://cdn.example.com/wayfarer".to_string(),
        cdn_public_key: "public_test_key".to_string(),
        cdn_private_key: "private_test_key_0123".to_string(),
        credential_ttl_secs: 300,
    }
}

/// Scanner double with a fixed verdict and a call counter.
struct MockScanner {
    verdict: ScanVerdict,
    calls: AtomicUsize,
}

impl MockScanner {
    fn clean() -> Self {
        Self {
            verdict: ScanVerdict::clean(),
            calls: AtomicUsize::new(0),
        }
    }

    fn infected(signature: &str) -> Self {
        Self {
            verdict: ScanVerdict::infected(vec![signature.to_string()]),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scanner for MockScanner {
    async fn scan(&self, _data: &[u8], _filename: &str) -> ScanVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Remote store double that fails the first `fail_times` uploads and records
/// the credential token used for each attempt plus who each credential was
/// issued for.
struct MockStore {
    fail_times: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
    credential_requests: Mutex<Vec<(String, String)>>,
    credentials_issued: AtomicUsize,
}

impl MockStore {
    fn new(fail_times: usize) -> Self {
        Self {
            fail_times: AtomicUsize::new(fail_times),
            tokens_seen: Mutex::new(Vec::new()),
            credential_requests: Mutex::new(Vec::new()),
            credentials_issued: AtomicUsize::new(0),
        }
    }

    fn attempts(&self) -> usize {
        self.tokens_seen.lock().unwrap().len()
    }

    fn tokens(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }

    fn credential_requests(&self) -> Vec<(String, String)> {
        self.credential_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    fn request_credential(&self, category: UploadCategory, user_id: &str) -> SignedCredential {
        self.credential_requests
            .lock()
            .unwrap()
            .push((category.as_str().to_string(), user_id.to_string()));
        let n = self.credentials_issued.fetch_add(1, Ordering::SeqCst);
        SignedCredential {
            token: format!("token-{}", n),
            expire: i64::MAX,
            signature: "sig".to_string(),
            public_key: "public_test_key".to_string(),
        }
    }

    async fn upload(
        &self,
        credential: &SignedCredential,
        file_name: &str,
        folder: &str,
        _mime_type: &str,
        _bytes: Bytes,
    ) -> Result<RemoteReference, CdnError> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(credential.token.clone());

        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.store(remaining - 1, Ordering::SeqCst);
            return Err(CdnError::Rejected {
                status: 500,
                body: "injected failure".to_string(),
            });
        }

        let path = format!("/{}/{}", folder, file_name);
        let url = format!("https://cdn.example.com/wayfarer{}", path);
        Ok(RemoteReference {
            asset_id: "asset-1".to_string(),
            path,
            thumbnail_url: format!("{}?tr=w-300,h-300", url),
            url,
        })
    }

    async fn delete(&self, _asset_id: &str) -> Result<(), CdnError> {
        Ok(())
    }
}

fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 90, 160])));
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .unwrap();
    buffer
}

fn tiff_fixture(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([80, 50, 20])));
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Tiff)
        .unwrap();
    buffer
}

fn state_with(scanner: Arc<MockScanner>, store: Arc<MockStore>) -> AppState {
    AppState::with_services(test_config(), scanner, store)
}

#[tokio::test]
async fn test_pipeline_success() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = state_with(scanner.clone(), store.clone());

    let data = jpeg_fixture(40, 30);
    let output = pipeline::process_upload(
        &state,
        UploadCategory::Location,
        "traveler-1",
        "trip.jpg",
        "image/jpeg",
        Bytes::from(data),
        None,
    )
    .await
    .unwrap();

    assert_eq!(output.reference.asset_id, "asset-1");
    assert!(output.reference.path.starts_with("/locations/"));
    assert!(output.reference.thumbnail_url.contains("tr=w-300,h-300"));
    assert_eq!((output.asset.width, output.asset.height), (40, 30));
    assert_eq!(output.asset.mime_type, "image/jpeg");
    // Synthetic fixture carries no EXIF.
    assert!(output.metadata.is_none());
    assert_eq!(scanner.calls(), 1);
    assert_eq!(store.attempts(), 1);
}

#[tokio::test]
async fn test_infected_upload_never_reaches_store() {
    let scanner = Arc::new(MockScanner::infected("Eicar-Test-Signature"));
    let store = Arc::new(MockStore::new(0));
    let state = state_with(scanner, store.clone());

    let err = pipeline::process_upload(
        &state,
        UploadCategory::Location,
        "traveler-1",
        "evil.jpg",
        "image/jpeg",
        Bytes::from(jpeg_fixture(16, 16)),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::SecurityViolation(_)));
    assert_eq!(store.attempts(), 0);
}

#[tokio::test]
async fn test_oversize_rejected_before_scan() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = state_with(scanner.clone(), store.clone());

    let oversized = Bytes::from(vec![0u8; 5 * 1024 * 1024 + 1]);
    let err = pipeline::process_upload(
        &state,
        UploadCategory::Avatar,
        "traveler-1",
        "huge.jpg",
        "image/jpeg",
        oversized,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    // Validation failures must never trigger a scan.
    assert_eq!(scanner.calls(), 0);
    assert_eq!(store.attempts(), 0);
}

#[tokio::test]
async fn test_upload_retry_uses_fresh_credential() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(1));
    let state = state_with(scanner, store.clone());

    let output = pipeline::process_upload(
        &state,
        UploadCategory::Banner,
        "traveler-2",
        "banner.jpg",
        "image/jpeg",
        Bytes::from(jpeg_fixture(64, 16)),
        None,
    )
    .await
    .unwrap();

    assert_eq!(output.reference.asset_id, "asset-1");
    assert_eq!(store.attempts(), 2);
    let tokens = store.tokens();
    assert_ne!(tokens[0], tokens[1]);
    // Both credentials were scoped to the same category and acting user.
    let requests = store.credential_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|(c, u)| c == "banner" && u == "traveler-2"));
}

#[tokio::test]
async fn test_credential_request_scoped_to_category_and_user() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = state_with(scanner, store.clone());

    pipeline::process_upload(
        &state,
        UploadCategory::Avatar,
        "traveler-7",
        "me.jpg",
        "image/jpeg",
        Bytes::from(jpeg_fixture(16, 16)),
        None,
    )
    .await
    .unwrap();

    assert_eq!(
        store.credential_requests(),
        vec![("avatar".to_string(), "traveler-7".to_string())]
    );
}

#[tokio::test]
async fn test_second_upload_failure_is_terminal() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(2));
    let state = state_with(scanner, store.clone());

    let err = pipeline::process_upload(
        &state,
        UploadCategory::Location,
        "traveler-1",
        "trip.jpg",
        "image/jpeg",
        Bytes::from(jpeg_fixture(16, 16)),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Upload(_)));
    assert_eq!(store.attempts(), 2);
}

#[tokio::test]
async fn test_client_metadata_is_sanitized() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = state_with(scanner, store);

    let raw = serde_json::json!({
        "gpsLatitude": "not-a-number",
        "gpsLongitude": 2.29,
        "cameraMake": "<script>alert(1)</script>Apple",
    });
    let output = pipeline::process_upload(
        &state,
        UploadCategory::Location,
        "traveler-1",
        "trip.jpg",
        "image/jpeg",
        Bytes::from(jpeg_fixture(16, 16)),
        Some(raw),
    )
    .await
    .unwrap();

    let metadata = output.metadata.unwrap();
    assert_eq!(metadata.gps_latitude, None);
    assert!(!metadata.has_gps);
    let make = metadata.camera_make.unwrap();
    assert!(!make.contains('<'));
    assert!(make.contains("Apple"));
}

#[tokio::test]
async fn test_endpoint_success_response_shape() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = Arc::new(state_with(scanner, store.clone()));
    let server = TestServer::new(routes::build_router(state)).unwrap();

    let form = MultipartForm::new()
        .add_text("uploadType", "location")
        .add_part(
            "photo",
            Part::bytes(jpeg_fixture(40, 30))
                .file_name("trip.jpg")
                .mime_type("image/jpeg"),
        );

    let response = server.post("/api/v0/photos").multipart(form).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["upload"]["fileId"], "asset-1");
    assert!(body["upload"]["url"].as_str().unwrap().starts_with("https://"));
    assert!(body["upload"]["thumbnailUrl"]
        .as_str()
        .unwrap()
        .contains("tr=w-300,h-300"));
    assert_eq!(body["upload"]["width"], 40);
    assert_eq!(body["upload"]["height"], 30);
    assert_eq!(body["file"]["originalFilename"], "trip.jpg");
    assert_eq!(body["file"]["mimeType"], "image/jpeg");
    assert!(body["metadata"].is_null());

    // No userId field: the credential is issued for the anonymous fallback.
    assert_eq!(
        store.credential_requests(),
        vec![("location".to_string(), "anonymous".to_string())]
    );
}

#[tokio::test]
async fn test_endpoint_forwards_user_to_credential_request() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = Arc::new(state_with(scanner, store.clone()));
    let server = TestServer::new(routes::build_router(state)).unwrap();

    let form = MultipartForm::new()
        .add_text("uploadType", "avatar")
        .add_text("userId", "traveler-42")
        .add_part(
            "photo",
            Part::bytes(jpeg_fixture(16, 16))
                .file_name("me.jpg")
                .mime_type("image/jpeg"),
        );

    let response = server.post("/api/v0/photos").multipart(form).await;
    response.assert_status_ok();

    assert_eq!(
        store.credential_requests(),
        vec![("avatar".to_string(), "traveler-42".to_string())]
    );
}

#[tokio::test]
async fn test_endpoint_reports_declared_mime_for_converted_upload() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = Arc::new(state_with(scanner, store));
    let server = TestServer::new(routes::build_router(state)).unwrap();

    let form = MultipartForm::new()
        .add_text("uploadType", "location")
        .add_part(
            "photo",
            Part::bytes(tiff_fixture(32, 24))
                .file_name("scan.tiff")
                .mime_type("image/tiff"),
        );

    let response = server.post("/api/v0/photos").multipart(form).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    // `file` describes the upload as received, not the converted rendition.
    assert_eq!(body["file"]["mimeType"], "image/tiff");
    assert_eq!(body["file"]["originalFilename"], "scan.tiff");
    assert_eq!(body["upload"]["width"], 32);
    assert_eq!(body["upload"]["height"], 24);
}

#[tokio::test]
async fn test_endpoint_rejects_bad_upload_type() {
    let scanner = Arc::new(MockScanner::clean());
    let store = Arc::new(MockStore::new(0));
    let state = Arc::new(state_with(scanner, store));
    let server = TestServer::new(routes::build_router(state)).unwrap();

    let form = MultipartForm::new()
        .add_text("uploadType", "gallery")
        .add_part(
            "photo",
            Part::bytes(jpeg_fixture(16, 16))
                .file_name("a.jpg")
                .mime_type("image/jpeg"),
        );

    let response = server.post("/api/v0/photos").multipart(form).await;
    response.assert_status_bad_request();

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("upload type"));
}

#[tokio::test]
async fn test_endpoint_security_rejection_hides_signature() {
    let scanner = Arc::new(MockScanner::infected("Eicar-Test-Signature"));
    let store = Arc::new(MockStore::new(0));
    let state = Arc::new(state_with(scanner, store));
    let server = TestServer::new(routes::build_router(state)).unwrap();

    let form = MultipartForm::new()
        .add_text("uploadType", "avatar")
        .add_part(
            "photo",
            Part::bytes(jpeg_fixture(16, 16))
                .file_name("evil.jpg")
                .mime_type("image/jpeg"),
        );

    let response = server.post("/api/v0/photos").multipart(form).await;
    response.assert_status_bad_request();

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SECURITY_VIOLATION");
    assert!(!body["error"].as_str().unwrap().contains("Eicar"));
}
