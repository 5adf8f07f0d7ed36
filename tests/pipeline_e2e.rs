mod support;

use std::sync::Arc;
use std::time::Duration;

use newsreel::encode::{encode_frames, is_ffmpeg_on_path};
use newsreel::pipeline::{Pipeline, RunState};
use newsreel::{
    EncodeProfile, FeedConfig, FeedService, FfmpegEncoder, Frame, NewsreelApp, render_frame,
};

use support::{EMPTY_FEED, FakeEncoder, TWO_ITEM_FEED, load_style, spawn_feed};

async fn wait_terminal(
    app: &Arc<NewsreelApp>,
    rx: &mut tokio::sync::watch::Receiver<RunState>,
) -> RunState {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                RunState::Done { .. } | RunState::Error { .. } => return state,
                _ => {}
            }
            rx.changed().await.expect("state channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("run did not finish; last state {:?}", app.state()))
}

#[tokio::test(flavor = "multi_thread")]
async fn two_headline_run_reaches_done_with_playable_video() {
    let Some(style) = load_style() else {
        eprintln!("skipping: no usable system font");
        return;
    };

    let url = spawn_feed(TWO_ITEM_FEED).await;
    let feed = FeedService::new(FeedConfig::default().with_url(url)).unwrap();
    let encoder = FakeEncoder::default();
    let shared = Arc::clone(&encoder.shared);

    let app = Arc::new(NewsreelApp::new(Pipeline::new(
        feed,
        style,
        Box::new(encoder),
    )));
    let mut rx = app.subscribe();
    assert!(Arc::clone(&app).start_run());
    // A concurrent request is suppressed, not queued.
    assert!(!Arc::clone(&app).start_run());

    let state = wait_terminal(&app, &mut rx).await;
    let RunState::Done { video_id } = state else {
        panic!("expected done, got {state:?}");
    };
    assert_eq!(app.state().percent(), 100);

    // The locator resolves for the run's id and nothing else.
    let video = app.video_for(video_id).expect("video available");
    assert_eq!(&video[4..8], b"ftyp");
    assert!(app.video_for(uuid::Uuid::new_v4()).is_none());

    // Exactly one encode with the fixed argument vector over frame000/001.
    let shared = shared.lock().unwrap();
    assert_eq!(shared.runs.len(), 1);
    assert_eq!(shared.runs[0], EncodeProfile::new(2).args());
    assert_eq!(
        shared.staged_at_run[0],
        vec!["frame000.png".to_string(), "frame001.png".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_feed_terminates_in_error_without_rendering() {
    let Some(style) = load_style() else {
        eprintln!("skipping: no usable system font");
        return;
    };

    let url = spawn_feed(EMPTY_FEED).await;
    let feed = FeedService::new(FeedConfig::default().with_url(url)).unwrap();
    let encoder = FakeEncoder::default();
    let shared = Arc::clone(&encoder.shared);

    let app = Arc::new(NewsreelApp::new(Pipeline::new(
        feed,
        style,
        Box::new(encoder),
    )));
    let mut rx = app.subscribe();
    assert!(Arc::clone(&app).start_run());

    let state = wait_terminal(&app, &mut rx).await;
    let RunState::Error { message } = state else {
        panic!("expected error, got {state:?}");
    };
    assert_eq!(message, "no headlines available today");

    // The encoder was never touched.
    let shared = shared.lock().unwrap();
    assert!(shared.runs.is_empty());
    assert!(shared.files.is_empty());
}

#[test]
fn second_run_cleanup_hides_first_run_frames() {
    let mut encoder = FakeEncoder::default();
    let shared = Arc::clone(&encoder.shared);

    let frames_a: Vec<Frame> = (0..3)
        .map(|i| Frame {
            name: newsreel::frame_name(i),
            data: vec![0xAA],
        })
        .collect();
    let frames_b: Vec<Frame> = (0..2)
        .map(|i| Frame {
            name: newsreel::frame_name(i),
            data: vec![0xBB],
        })
        .collect();

    encode_frames(&mut encoder, &frames_a, &mut |_| {}).unwrap();
    encode_frames(&mut encoder, &frames_b, &mut |_| {}).unwrap();

    let shared = shared.lock().unwrap();
    assert_eq!(shared.runs.len(), 2);
    // The second run's staging view holds only its own frames; the first
    // run's frame002.png and output are gone before staging.
    assert_eq!(
        shared.staged_at_run[1],
        vec!["frame000.png".to_string(), "frame001.png".to_string()]
    );
    assert_eq!(shared.files["frame000.png"], vec![0xBB]);
}

#[test]
fn real_ffmpeg_produces_an_mp4() {
    let Some(style) = load_style() else {
        eprintln!("skipping: no usable system font");
        return;
    };
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }

    let headlines = [("A", "First story of the day"), ("B", "Second story")];
    let frames: Vec<Frame> = headlines
        .iter()
        .enumerate()
        .map(|(i, (title, desc))| {
            let h = newsreel::Headline {
                title: (*title).to_string(),
                link: String::new(),
                published_at: String::new(),
                description: (*desc).to_string(),
            };
            render_frame(&style, &h, i, headlines.len()).unwrap()
        })
        .collect();

    let mut encoder = FfmpegEncoder::new("target/e2e_ffmpeg_scratch");
    let mut last_percent = 0u8;
    let out = encode_frames(&mut encoder, &frames, &mut |p| last_percent = p).unwrap();

    assert!(!out.is_empty());
    assert_eq!(&out[4..8], b"ftyp");
    assert_eq!(last_percent, 100);
}
