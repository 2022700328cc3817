use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use meshcraft::prompt::ORBIT_PROMPT;
use meshcraft::{
    compose_prompt, Artifact, ArtifactKind, AspectRatio, AuthorizationGate, CancellationToken,
    ClientOptions, GenerationConfig, GenerationError, GenerationRequest, ImageAsset, ImageModel,
    KeySelector, OperationKind, QualityTier, StaticCredential, Studio,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FLASH_URL: &str = "/models/gemini-2.5-flash-image:generateContent";
const PRO_URL: &str = "/models/gemini-3-pro-image-preview:generateContent";
const VEO_URL: &str = "/models/veo-3.1-fast-generate-preview:predictLongRunning";

#[derive(Default)]
struct CountingSelector {
    selected: bool,
    queries: AtomicUsize,
    opens: AtomicUsize,
}

impl KeySelector for CountingSelector {
    fn has_selected_api_key(&self) -> BoxFuture<'_, Result<bool, GenerationError>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.selected)
        })
    }

    fn open_select_key(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

fn studio(server: &MockServer, selector: Arc<CountingSelector>) -> Studio {
    let options = ClientOptions::new()
        .with_base_url(server.uri())
        .with_poll_interval(Duration::from_millis(10))
        .with_max_wait(Some(Duration::from_secs(5)));
    Studio::new(
        &options,
        AuthorizationGate::new(selector),
        Arc::new(StaticCredential("K".into())),
    )
}

fn image_response(data: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    {"text": "Here is the schematic."},
                    {"inlineData": {"mimeType": "image/png", "data": data}}
                ]
            }
        }]
    }))
}

fn still() -> ImageAsset {
    ImageAsset::with_mime_type(b"still".to_vec(), "image/png")
}

#[tokio::test]
async fn create_sends_composed_prompt_without_image_size() {
    let server = MockServer::start().await;
    let prompt = compose_prompt(OperationKind::Create, "a teapot", false);
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .and(query_param("key", "K"))
        .and(body_json(json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"imageConfig": {"aspectRatio": "1:1"}}
        })))
        .respond_with(image_response("aGVsbG8="))
        .expect(1)
        .mount(&server)
        .await;

    let selector = Arc::new(CountingSelector::default());
    let config = GenerationConfig::new().with_quality(QualityTier::Ultra);
    let request = GenerationRequest::create("a teapot", config);
    let result = studio(&server, selector.clone())
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.kind, ArtifactKind::Image);
    assert_eq!(
        result.artifact,
        Artifact::DataUri("data:image/png;base64,aGVsbG8=".into())
    );
    assert_eq!(selector.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn create_with_reference_sends_image_first() {
    let server = MockServer::start().await;
    let prompt = compose_prompt(OperationKind::Create, "a drone", true);
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .and(body_partial_json(json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": "image/jpeg", "data": "cmVm"}},
                {"text": prompt}
            ]}]
        })))
        .respond_with(image_response("AAAA"))
        .expect(1)
        .mount(&server)
        .await;

    let reference = ImageAsset::with_mime_type(b"ref".to_vec(), "image/jpeg");
    let request =
        GenerationRequest::create("a drone", GenerationConfig::new()).with_reference(reference);
    let result = studio(&server, Arc::default())
        .generate(&request, &CancellationToken::new())
        .await;

    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn pro_edit_checks_key_and_sends_image_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRO_URL))
        .and(body_partial_json(json!({
            "generationConfig": {"imageConfig": {"aspectRatio": "4:3", "imageSize": "2K"}}
        })))
        .respond_with(image_response("ZWRpdA=="))
        .expect(1)
        .mount(&server)
        .await;

    let selector = Arc::new(CountingSelector::default());
    let config = GenerationConfig::new()
        .with_model(ImageModel::Pro)
        .with_quality(QualityTier::High)
        .with_aspect_ratio(AspectRatio::Landscape);
    let request = GenerationRequest::edit(still(), "add a rotor", config);
    let result = studio(&server, selector.clone())
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.artifact.as_str(), "data:image/png;base64,ZWRpdA==");
    assert_eq!(selector.queries.load(Ordering::SeqCst), 1);
    assert_eq!(selector.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn edit_sends_canvas_then_instruction() {
    let server = MockServer::start().await;
    let prompt = compose_prompt(OperationKind::Edit, "open the film door", false);
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .and(query_param("key", "K"))
        .and(body_json(json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "c3RpbGw="}},
                {"text": prompt}
            ]}],
            "generationConfig": {"imageConfig": {"aspectRatio": "3:4"}}
        })))
        .respond_with(image_response("ZWRpdA=="))
        .expect(1)
        .mount(&server)
        .await;

    let config = GenerationConfig::new().with_aspect_ratio(AspectRatio::Portrait);
    let request = GenerationRequest::edit(still(), "open the film door", config);
    let result = studio(&server, Arc::default())
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.kind, ArtifactKind::Image);
    assert_eq!(result.artifact.as_str(), "data:image/png;base64,ZWRpdA==");
}

#[tokio::test]
async fn zero_candidates_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let request = GenerationRequest::create("a lamp", GenerationConfig::new());
    let result = studio(&server, Arc::default())
        .generate(&request, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GenerationError::NoCandidates)));
}

#[tokio::test]
async fn text_only_candidate_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't draw that."}]}}]
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::create("a lamp", GenerationConfig::new());
    let result = studio(&server, Arc::default())
        .generate(&request, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GenerationError::NoImageData)));
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let selector = Arc::new(CountingSelector::default());
    let request = GenerationRequest::create("a lamp", GenerationConfig::new());
    let result = studio(&server, selector.clone())
        .generate(&request, &CancellationToken::new())
        .await;

    match result {
        Err(GenerationError::Upstream(error)) => {
            assert_eq!(error.code, 503);
            assert_eq!(error.status.as_deref(), Some("UNAVAILABLE"));
            assert_eq!(error.message, "The model is overloaded.");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(selector.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_credential_reopens_selection_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_URL))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let selector = Arc::new(CountingSelector::default());
    let request = GenerationRequest::create("a lamp", GenerationConfig::new());
    let result = studio(&server, selector.clone())
        .generate(&request, &CancellationToken::new())
        .await;

    let error = result.unwrap_err();
    assert!(error.is_credential_error());
    assert_eq!(selector.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_credential_during_animate_reopens_selection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VEO_URL))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let selector = Arc::new(CountingSelector {
        selected: true,
        ..Default::default()
    });
    let request = GenerationRequest::animate(still(), GenerationConfig::new());
    let result = studio(&server, selector.clone())
        .generate(&request, &CancellationToken::new())
        .await;

    match result {
        Err(GenerationError::Upstream(error)) => {
            assert_eq!(error.code, 404);
            assert!(error.is_credential_error());
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(selector.queries.load(Ordering::SeqCst), 1);
    assert_eq!(selector.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_service_fails_without_exposing_the_key() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let options = ClientOptions::new().with_base_url(format!("http://127.0.0.1:{port}"));
    let selector = Arc::new(CountingSelector::default());
    let studio = Studio::new(
        &options,
        AuthorizationGate::new(selector.clone()),
        Arc::new(StaticCredential("s3cr3t".into())),
    );

    let request = GenerationRequest::create("a lamp", GenerationConfig::new());
    let error = studio
        .generate(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, GenerationError::Upstream(_)), "{error:?}");
    assert!(!error.is_credential_error());
    assert!(!error.to_string().contains("s3cr3t"));
    assert!(!format!("{error:?}").contains("key="));
    assert_eq!(selector.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn finished_video_downloads_with_key_appended() {
    let server = MockServer::start().await;
    let video_uri = format!("{}/video?token=abc", server.uri());
    Mock::given(method("POST"))
        .and(path(VEO_URL))
        .and(query_param("key", "K"))
        .and(body_json(json!({
            "instances": [{
                "prompt": ORBIT_PROMPT,
                "image": {"bytesBase64Encoded": "c3RpbGw=", "mimeType": "image/png"}
            }],
            "parameters": {"sampleCount": 1, "resolution": "720p", "aspectRatio": "16:9"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo-3.1-fast-generate-preview/operations/abc",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": video_uri}}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video"))
        .and(query_param("token", "abc"))
        .and(query_param("key", "K"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(b"mp4-bytes".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let selector = Arc::new(CountingSelector {
        selected: true,
        ..Default::default()
    });
    let studio = studio(&server, selector.clone());
    let config = GenerationConfig::new().with_aspect_ratio(AspectRatio::Square);
    let result = studio
        .generate(&GenerationRequest::animate(still(), config), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.kind, ArtifactKind::Video);
    let Artifact::Blob(blob_ref) = result.artifact else {
        panic!("expected a blob reference");
    };
    let blob = studio.blobs().get(&blob_ref).unwrap();
    assert_eq!(blob.bytes, b"mp4-bytes");
    assert_eq!(blob.mime_type, "video/mp4");
    assert!(studio.blobs().revoke(&blob_ref));
    assert_eq!(selector.queries.load(Ordering::SeqCst), 1);
    assert_eq!(selector.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pending_video_is_polled_until_done() {
    let server = MockServer::start().await;
    let video_uri = format!("{}/files/orbit:download?alt=media", server.uri());
    Mock::given(method("POST"))
        .and(path(VEO_URL))
        .and(body_partial_json(json!({"parameters": {"aspectRatio": "9:16"}})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "models/veo-3.1-fast-generate-preview/operations/abc"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models/veo-3.1-fast-generate-preview/operations/abc"))
        .and(query_param("key", "K"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo-3.1-fast-generate-preview/operations/abc",
            "done": false
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models/veo-3.1-fast-generate-preview/operations/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo-3.1-fast-generate-preview/operations/abc",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": video_uri}}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/orbit:download"))
        .and(query_param("alt", "media"))
        .and(query_param("key", "K"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"orbit".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let config = GenerationConfig::new().with_aspect_ratio(AspectRatio::Tall);
    let studio = studio(&server, Arc::default());
    let result = studio
        .generate(&GenerationRequest::animate(still(), config), &CancellationToken::new())
        .await
        .unwrap();

    let Artifact::Blob(blob_ref) = result.artifact else {
        panic!("expected a blob reference");
    };
    assert_eq!(studio.blobs().get(&blob_ref).unwrap().bytes, b"orbit");
}

#[tokio::test]
async fn failed_download_yields_no_artifact() {
    let server = MockServer::start().await;
    let video_uri = format!("{}/video?token=abc", server.uri());
    Mock::given(method("POST"))
        .and(path(VEO_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/abc",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": video_uri}}]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let studio = studio(&server, Arc::default());
    let request = GenerationRequest::animate(still(), GenerationConfig::new());
    let result = studio.generate(&request, &CancellationToken::new()).await;

    assert!(matches!(result, Err(GenerationError::DownloadFailed { status: 404 })));
    assert!(studio.blobs().is_empty());
}

#[tokio::test]
async fn done_without_uri_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VEO_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/abc",
            "done": true,
            "response": {"generateVideoResponse": {"raiMediaFilteredCount": 1}}
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::animate(still(), GenerationConfig::new());
    let result = studio(&server, Arc::default())
        .generate(&request, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GenerationError::NoUriReturned)));
}
