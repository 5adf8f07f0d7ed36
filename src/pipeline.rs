//! End-to-end generation pipeline and its presentation-facing run state.
//!
//! Control flows strictly forward: fetch -> normalize -> render ->
//! encode -> video bytes. Frame rendering fans out across rayon workers;
//! every other phase is sequential because it needs the full output of the
//! previous one.

use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::encode::{EncoderBackend, encode_frames};
use crate::feed::{FeedService, Headline};
use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::render::{Frame, FrameStyle, render_frame};

/// Presentation-facing run state: one case per phase, each carrying only the
/// data relevant to that phase, so a status label can never disagree with
/// its progress number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching { percent: u8 },
    Rendering { percent: u8 },
    Done { video_id: uuid::Uuid },
    Error { message: String },
}

impl RunState {
    /// User-facing status label.
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching { .. } => "fetching",
            RunState::Rendering { .. } => "rendering",
            RunState::Done { .. } => "done",
            RunState::Error { .. } => "error",
        }
    }

    /// 0-100 progress hint. Purely informational; nothing gates on it.
    pub fn percent(&self) -> u8 {
        match self {
            RunState::Idle | RunState::Error { .. } => 0,
            RunState::Fetching { percent } | RunState::Rendering { percent } => *percent,
            RunState::Done { .. } => 100,
        }
    }
}

// Checkpoint progress hints, nondecreasing across a run.
const PCT_STARTED: u8 = 5;
const PCT_HEADLINES: u8 = 15;
const PCT_RENDERED: u8 = 40;
const PCT_ENCODE_START: u8 = 55;
const PCT_ENCODED: u8 = 85;

/// Observer for state-change notifications during a run.
pub type StateObserver = Arc<dyn Fn(RunState) + Send + Sync>;

/// One fetch-render-encode pipeline over injected collaborators.
pub struct Pipeline {
    feed: FeedService,
    style: Arc<FrameStyle>,
    encoder: Arc<Mutex<Box<dyn EncoderBackend>>>,
}

impl Pipeline {
    pub fn new(feed: FeedService, style: FrameStyle, encoder: Box<dyn EncoderBackend>) -> Self {
        Self {
            feed,
            style: Arc::new(style),
            encoder: Arc::new(Mutex::new(encoder)),
        }
    }

    pub fn feed(&self) -> &FeedService {
        &self.feed
    }

    /// Run one full generation and return the MP4 bytes.
    ///
    /// Checkpoint states are emitted through `observer`; the caller owns the
    /// terminal `Done`/`Error` transition. An empty feed is a terminal
    /// failure, not an empty success.
    pub async fn produce_video(&self, observer: StateObserver) -> NewsreelResult<Vec<u8>> {
        observer(RunState::Fetching {
            percent: PCT_STARTED,
        });

        let headlines = self.feed.headlines().await?;
        if headlines.is_empty() {
            return Err(NewsreelError::EmptyFeed);
        }
        tracing::info!(count = headlines.len(), "rendering title cards");
        observer(RunState::Rendering {
            percent: PCT_HEADLINES,
        });

        let style = Arc::clone(&self.style);
        let frames = tokio::task::spawn_blocking(move || render_all(&style, &headlines))
            .await
            .map_err(|e| NewsreelError::render(format!("render task failed: {e}")))??;
        observer(RunState::Rendering {
            percent: PCT_RENDERED,
        });

        observer(RunState::Rendering {
            percent: PCT_ENCODE_START,
        });
        let encoder = Arc::clone(&self.encoder);
        let obs = Arc::clone(&observer);
        let video = tokio::task::spawn_blocking(move || {
            let mut encoder = encoder
                .lock()
                .map_err(|_| NewsreelError::encode("encoder mutex poisoned"))?;
            let mut floor = PCT_ENCODE_START;
            let mut on_percent = |p: u8| {
                let mapped = encode_window_percent(p).max(floor);
                floor = mapped;
                obs(RunState::Rendering { percent: mapped });
            };
            encode_frames(encoder.as_mut(), &frames, &mut on_percent)
        })
        .await
        .map_err(|e| NewsreelError::encode(format!("encode task failed: {e}")))??;
        observer(RunState::Rendering {
            percent: PCT_ENCODED,
        });

        tracing::info!(bytes = video.len(), "encode complete");
        Ok(video)
    }
}

/// Render every headline, concurrently across the rayon pool. Frame order
/// follows input order, never completion order.
fn render_all(style: &FrameStyle, headlines: &[Headline]) -> NewsreelResult<Vec<Frame>> {
    let total = headlines.len();
    headlines
        .par_iter()
        .enumerate()
        .map(|(index, headline)| render_frame(style, headline, index, total))
        .collect()
}

/// Map a 0-100 encoder percentage into the 55..=85 checkpoint window so the
/// overall hint keeps moving forward during the encode phase.
fn encode_window_percent(encoder_percent: u8) -> u8 {
    let p = u32::from(encoder_percent.min(100));
    PCT_ENCODE_START + ((p * u32::from(PCT_ENCODED - PCT_ENCODE_START)) / 100) as u8
}
