use super::*;
use tempfile::TempDir;

#[test]
fn healthy_report_is_one_line() {
    let report = StoryReport {
        story_id: "moon".into(),
        has_manifest: true,
        has_audio: true,
        ..StoryReport::default()
    };
    assert_eq!(describe(&report), "ok    moon");
}

#[test]
fn problems_are_listed() {
    let report = StoryReport {
        story_id: "moon".into(),
        has_manifest: true,
        has_audio: false,
        missing_images: vec!["image_2.png".into()],
        timing_issues: vec![TimingIssue::Discontinuous {
            index: 1,
            previous_end: 5.0,
            start: 6.0,
        }],
        ..StoryReport::default()
    };
    assert_eq!(
        describe(&report),
        "FAIL  moon: no audio; missing images: image_2.png; segment 1 starts at 6 but previous ended at 5"
    );
}

#[tokio::test]
async fn retime_requires_story_folder() {
    let root = TempDir::new().expect("root");
    let id = StoryId::parse("ghost").expect("id");
    assert!(retime(root.path(), &id, 150.0).await.is_err());

    let dir = root.path().join("ghost");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(
        dir.join("story_segments.json"),
        r#"[{"text":"Boo boo","image":"image_1.png"}]"#,
    )
    .expect("write");
    assert!(retime(root.path(), &id, 150.0).await.expect("retime"));
    assert!(!retime(root.path(), &id, 150.0).await.expect("retime again"));
}

#[tokio::test]
async fn repair_files_writes_text_and_fills_images() {
    let root = TempDir::new().expect("root");
    let id = StoryId::parse("owl").expect("id");
    let placeholder = root.path().join("placeholder.png");
    std::fs::write(&placeholder, b"ph").expect("placeholder");
    assert!(repair_files(root.path(), &id, &placeholder).await.is_err());

    let dir = root.path().join("owl");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(
        dir.join("story_segments.json"),
        r#"{"segments":[{"text":"Hoot","image":"image_1.png","start":0,"end":4}]}"#,
    )
    .expect("write");

    let (wrote_text, filled) = repair_files(root.path(), &id, &placeholder)
        .await
        .expect("repair");
    assert!(wrote_text);
    assert_eq!(filled, vec!["image_1.png"]);
    assert_eq!(std::fs::read_to_string(dir.join("story.txt")).expect("text"), "Hoot");

    let (wrote_text, filled) = repair_files(root.path(), &id, &placeholder)
        .await
        .expect("repair again");
    assert!(!wrote_text);
    assert!(filled.is_empty());
}
