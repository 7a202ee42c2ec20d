use super::*;
use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
use shared::{domain::Segment, error::ErrorCode};
use storage::LibraryConfig;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn spawn_server() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route(
            "/api/stories",
            get(|| async {
                Json(StoryListResponse {
                    stories: vec![StoryDescriptor::from_id(
                        StoryId::parse("moon").expect("id"),
                    )],
                })
            }),
        )
        .route(
            "/api/media/*path",
            get(|Path(path): Path<String>| async move {
                match path.as_str() {
                    "broken/story_segments.json" => (StatusCode::OK, "{".to_string()),
                    "sun/story_segments.json" => (
                        StatusCode::OK,
                        r#"{"title":"Sun Song","segments":[{"text":"Hi","image":"image_1.png","start":0,"end":2}]}"#
                            .to_string(),
                    ),
                    "crash/story_segments.json" => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        serde_json::to_string(&ApiError::new(ErrorCode::Internal, "disk on fire"))
                            .expect("json"),
                    ),
                    "moon/image_1.png" => (StatusCode::OK, "png".to_string()),
                    _ => (StatusCode::NOT_FOUND, String::new()),
                }
            }),
        )
        .route(
            "/output/*path",
            get(|Path(path): Path<String>| async move {
                if path == "moon/story_segments.json" {
                    (
                        StatusCode::OK,
                        r#"[{"text":"Up","image":"image_1.png","start":0,"end":5}]"#.to_string(),
                    )
                } else {
                    (StatusCode::NOT_FOUND, String::new())
                }
            }),
        );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/"))
}

fn id(raw: &str) -> StoryId {
    StoryId::parse(raw).expect("story id")
}

#[tokio::test]
async fn http_source_lists_catalog() -> anyhow::Result<()> {
    let source = HttpStorySource::new(&spawn_server().await?)?;
    assert!(!source.server_url().ends_with('/'));
    let stories = source.list_stories().await?;
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].title, "Moon");
    Ok(())
}

#[tokio::test]
async fn http_source_falls_back_to_static_route() -> anyhow::Result<()> {
    let source = HttpStorySource::new(&spawn_server().await?)?;
    let moon = source.load_manifest(&id("moon")).await?;
    assert_eq!(moon.segments[0].text, "Up");

    let sun = source.load_manifest(&id("sun")).await?;
    assert_eq!(sun.title.as_deref(), Some("Sun Song"));
    assert_eq!(
        sun.segments,
        vec![Segment {
            text: "Hi".into(),
            image: "image_1.png".into(),
            start: 0.0,
            end: 2.0,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn http_source_classifies_manifest_failures() -> anyhow::Result<()> {
    let source = HttpStorySource::new(&spawn_server().await?)?;
    assert!(matches!(
        source.load_manifest(&id("nobody")).await,
        Err(StoryError::ManifestNotFound(_))
    ));
    assert!(matches!(
        source.load_manifest(&id("broken")).await,
        Err(StoryError::ManifestMalformed { .. })
    ));
    match source.load_manifest(&id("crash")).await {
        Err(StoryError::Io(message)) => assert_eq!(message, "disk on fire"),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn http_source_builds_media_urls_and_probes_images() -> anyhow::Result<()> {
    let base = spawn_server().await?;
    let source = HttpStorySource::new(&base)?;
    assert_eq!(
        source.audio_url(&id("moon")),
        format!("{base}api/media/moon/story_audio.mp3")
    );
    source.probe_image(&id("moon"), "image_1.png").await?;
    assert!(matches!(
        source.probe_image(&id("moon"), "image_2.png").await,
        Err(StoryError::AssetMissing { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_catalog_unavailable() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let source = HttpStorySource::new(&format!("http://{addr}"))?;
    assert!(matches!(
        source.list_stories().await,
        Err(StoryError::CatalogUnavailable(_))
    ));
    assert!(HttpStorySource::new("not a url").is_err());
    Ok(())
}

#[tokio::test]
async fn local_source_reads_library() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let story = root.path().join("owl-night");
    std::fs::create_dir_all(&story)?;
    std::fs::write(
        story.join("story_segments.json"),
        r#"{"segments":[{"text":"Hoo","image":"image_1.png","start":0,"end":3}]}"#,
    )?;
    std::fs::write(story.join("story_audio.mp3"), b"mp3")?;

    let source = LocalStorySource::new(StoryLibrary::new(LibraryConfig::single_root(root.path()))?);
    let stories = source.list_stories().await?;
    assert_eq!(stories[0].title, "Owl Night");
    let manifest = source.load_manifest(&id("owl-night")).await?;
    assert_eq!(manifest.segments.len(), 1);
    assert_eq!(
        source.audio_url(&id("owl-night")),
        story.join("story_audio.mp3").display().to_string()
    );
    assert!(source.probe_image(&id("owl-night"), "image_1.png").await.is_err());
    assert!(source.probe_image(&id("owl-night"), "../x.png").await.is_err());
    Ok(())
}
