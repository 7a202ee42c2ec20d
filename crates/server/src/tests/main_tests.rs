use super::*;
use axum::{body, body::Body, http::Request};
use storage::LibraryConfig;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    _primary: TempDir,
    _alternate: TempDir,
}

fn write(path: &std::path::Path, contents: impl AsRef<[u8]>) {
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, contents).expect("write");
}

fn test_app(with_placeholder: bool) -> TestApp {
    let primary = TempDir::new().expect("primary");
    let alternate = TempDir::new().expect("alternate");
    let cloud = primary.path().join("the-curious-cloud");
    write(
        &cloud.join("story_segments.json"),
        serde_json::json!({
            "title": "The Curious Cloud",
            "segments": [
                { "text": "Up", "image": "image_1.png", "start": 0, "end": 5 },
                { "text": "Down", "image": "image_2.png", "start": 5, "end": 10 }
            ]
        })
        .to_string(),
    );
    write(&cloud.join("story_audio.mp3"), b"mp3-bytes");
    write(&cloud.join("image_1.png"), b"png-1");
    write(
        &alternate.path().join("sleepy-sea-dragon").join("story_segments.json"),
        r#"[{ "text": "Yawn", "image": "image_1.png", "start": 0, "end": 3 }]"#,
    );
    let placeholder = primary.path().join("placeholder.png");
    if with_placeholder {
        write(&placeholder, b"placeholder");
    }

    let library = StoryLibrary::new(LibraryConfig {
        roots: vec![primary.path().to_path_buf(), alternate.path().to_path_buf()],
        catalog_manifest: None,
        placeholder_image: Some(placeholder),
    })
    .expect("library");
    let router = build_router(Arc::new(AppState {
        api: ApiContext {
            library,
            media_cache_seconds: 86_400,
        },
    }));
    TestApp {
        router,
        _primary: primary,
        _alternate: alternate,
    }
}

async fn get(app: &TestApp, uri: &str) -> Response {
    let request = Request::get(uri).body(Body::empty()).expect("request");
    app.router.clone().oneshot(request).await.expect("response")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = test_app(false);
    let response = get(&app, "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn story_list_merges_roots() {
    let app = test_app(false);
    let response = get(&app, "/api/stories").await;
    assert_eq!(response.status(), StatusCode::OK);
    let list: StoryListResponse =
        serde_json::from_slice(&body_bytes(response).await).expect("json");
    let titles: Vec<_> = list.stories.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["The Curious Cloud", "Sleepy Sea Dragon"]);
}

#[tokio::test]
async fn story_manifest_route_returns_segments() {
    let app = test_app(false);
    let response = get(&app, "/api/stories/sleepy-sea-dragon").await;
    assert_eq!(response.status(), StatusCode::OK);
    let manifest: StoryManifestResponse =
        serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(manifest.title, "Sleepy Sea Dragon");
    assert_eq!(manifest.segments[0].text, "Yawn");

    let missing = get(&app, "/api/stories/nobody").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let error: ApiError = serde_json::from_slice(&body_bytes(missing).await).expect("json");
    assert_eq!(error.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn media_route_sets_type_and_cache_headers() {
    let app = test_app(false);
    let response = get(&app, "/api/media/the-curious-cloud/story_audio.mp3").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=86400"
    );
    assert_eq!(body_bytes(response).await, b"mp3-bytes");

    let manifest = get(&app, "/api/media/the-curious-cloud/story_segments.json").await;
    assert_eq!(manifest.headers()[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn media_route_rejects_traversal() {
    let app = test_app(false);
    for uri in [
        "/api/media/the-curious-cloud/../../etc/passwd",
        "/api/media/..%2F..%2Fetc/passwd",
        "/output/the-curious-cloud/%2e%2e/secret",
    ] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn missing_images_use_placeholder_only_when_present() {
    let without = test_app(false);
    let response = get(&without, "/api/media/the-curious-cloud/image_2.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let with = test_app(true);
    let response = get(&with, "/api/media/the-curious-cloud/image_2.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()["x-story-placeholder"], "true");
    assert_eq!(body_bytes(response).await, b"placeholder");

    let audio = get(&with, "/api/media/sleepy-sea-dragon/story_audio.mp3").await;
    assert_eq!(audio.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn static_route_does_not_fall_back() {
    let app = test_app(true);
    let primary = get(&app, "/output/the-curious-cloud/image_1.png").await;
    assert_eq!(primary.status(), StatusCode::OK);

    let alternate = get(&app, "/output/sleepy-sea-dragon/story_segments.json").await;
    assert_eq!(alternate.status(), StatusCode::NOT_FOUND);

    let placeholder = get(&app, "/output/the-curious-cloud/image_2.png").await;
    assert_eq!(placeholder.status(), StatusCode::NOT_FOUND);
}
