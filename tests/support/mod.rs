#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;

use newsreel::encode::OUTPUT_NAME;
use newsreel::{EncoderBackend, FrameStyle, NewsreelError, NewsreelResult};

#[derive(Default)]
pub struct Shared {
    pub files: BTreeMap<String, Vec<u8>>,
    pub runs: Vec<Vec<String>>,
    /// Scratch listing snapshot taken at each run invocation (post-cleanup,
    /// post-staging).
    pub staged_at_run: Vec<Vec<String>>,
}

/// In-memory encoder boundary for tests.
#[derive(Clone, Default)]
pub struct FakeEncoder {
    pub shared: Arc<Mutex<Shared>>,
}

impl EncoderBackend for FakeEncoder {
    fn init(&mut self) -> NewsreelResult<()> {
        Ok(())
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> NewsreelResult<()> {
        self.shared
            .lock()
            .unwrap()
            .files
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> NewsreelResult<Vec<u8>> {
        self.shared
            .lock()
            .unwrap()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| NewsreelError::encode(format!("no such file '{name}'")))
    }

    fn list_files(&mut self) -> NewsreelResult<Vec<String>> {
        Ok(self.shared.lock().unwrap().files.keys().cloned().collect())
    }

    fn remove_file(&mut self, name: &str) -> NewsreelResult<()> {
        self.shared.lock().unwrap().files.remove(name);
        Ok(())
    }

    fn run(&mut self, args: &[String], on_progress: &mut dyn FnMut(f64)) -> NewsreelResult<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.runs.push(args.to_vec());
        let staged: Vec<String> = shared.files.keys().cloned().collect();
        shared.staged_at_run.push(staged);
        on_progress(0.25);
        on_progress(1.0);
        shared
            .files
            .insert(OUTPUT_NAME.to_string(), b"\x00\x00\x00\x18ftypisom".to_vec());
        Ok(())
    }
}

pub fn load_style() -> Option<FrameStyle> {
    // Environments without any known font skip the rendering-dependent tests.
    FrameStyle::load(None).ok()
}

pub const TWO_ITEM_FEED: &str = r#"<rss version="2.0"><channel>
    <title>Example</title>
    <item><title>A</title><link>https://example.com/a</link></item>
    <item><title>B</title><link>https://example.com/b</link></item>
</channel></rss>"#;

pub const EMPTY_FEED: &str = r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;

/// Serve `xml` as a local feed origin; returns the feed URL.
pub async fn spawn_feed(xml: &'static str) -> String {
    let app = Router::new().route(
        "/feed.xml",
        get(move || async move {
            (
                [(axum::http::header::CONTENT_TYPE, "application/rss+xml")],
                xml,
            )
        }),
    );
    spawn_origin(app).await
}

/// Serve a feed origin that always fails; returns the feed URL.
pub async fn spawn_failing_feed() -> String {
    let app = Router::new().route(
        "/feed.xml",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream down") }),
    );
    spawn_origin(app).await
}

async fn spawn_origin(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/feed.xml")
}
