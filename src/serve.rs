//! HTTP presentation layer.
//!
//! Serves the normalized headlines, accepts generation requests (one run at
//! a time), publishes run state over a watch channel, and exposes the
//! finished video through a unique-per-run locator that the next run
//! revokes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::watch;
use uuid::Uuid;

use crate::feed::Headline;
use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::pipeline::{Pipeline, RunState, StateObserver};

/// Suggested filename for the downloaded video.
pub const VIDEO_FILENAME: &str = "headlines.mp4";

/// One generated video, addressable by its per-run id until superseded.
pub struct VideoArtifact {
    pub id: Uuid,
    pub data: Vec<u8>,
}

/// Application state: the pipeline plus run bookkeeping.
pub struct NewsreelApp {
    pipeline: Pipeline,
    state_tx: watch::Sender<RunState>,
    busy: AtomicBool,
    video: Mutex<Option<VideoArtifact>>,
}

impl NewsreelApp {
    pub fn new(pipeline: Pipeline) -> Self {
        let (state_tx, _) = watch::channel(RunState::Idle);
        Self {
            pipeline,
            state_tx,
            busy: AtomicBool::new(false),
            video: Mutex::new(None),
        }
    }

    /// Latest run state (the pull side of the progress stream).
    pub fn state(&self) -> RunState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to run-state changes. Detachment is structural: dropping
    /// the receiver is the unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Current artifact bytes for `id`, if it is still the live locator.
    pub fn video_for(&self, id: Uuid) -> Option<Vec<u8>> {
        let guard = self.lock_video();
        guard
            .as_ref()
            .filter(|artifact| artifact.id == id)
            .map(|artifact| artifact.data.clone())
    }

    /// Start a generation run unless one is already in flight; a concurrent
    /// request is suppressed, not queued.
    pub fn start_run(self: Arc<Self>) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        tokio::spawn(async move {
            self.run_once().await;
        });
        true
    }

    async fn run_once(self: Arc<Self>) {
        // The previous artifact is released up front, revoking its locator
        // for the rest of the run.
        *self.lock_video() = None;

        let observer: StateObserver = {
            let tx = self.state_tx.clone();
            Arc::new(move |state| {
                tx.send_replace(state);
            })
        };

        match self.pipeline.produce_video(observer).await {
            Ok(data) => {
                let artifact = VideoArtifact {
                    id: Uuid::new_v4(),
                    data,
                };
                let video_id = artifact.id;
                *self.lock_video() = Some(artifact);
                self.state_tx.send_replace(RunState::Done { video_id });
                tracing::info!(%video_id, "run complete");
            }
            Err(err) => {
                tracing::warn!(error = %err, "run failed");
                self.state_tx.send_replace(RunState::Error {
                    message: err.to_string(),
                });
            }
        }
        self.busy.store(false, Ordering::SeqCst);
    }

    fn lock_video(&self) -> MutexGuard<'_, Option<VideoArtifact>> {
        self.video.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(serde::Serialize)]
struct HeadlinesResponse {
    headlines: Vec<Headline>,
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
    percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'static str>,
}

async fn get_headlines(State(app): State<Arc<NewsreelApp>>) -> Response {
    match app.pipeline.feed().headlines().await {
        Ok(headlines) => (StatusCode::OK, Json(HeadlinesResponse { headlines })).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "headlines endpoint failed");
            let status = match &err {
                NewsreelError::Fetch(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ErrorBody {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn post_generate(State(app): State<Arc<NewsreelApp>>) -> Response {
    if app.start_run() {
        (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "started" })),
        )
            .into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: "generation already in progress".to_string(),
            }),
        )
            .into_response()
    }
}

async fn get_status(State(app): State<Arc<NewsreelApp>>) -> Json<StatusResponse> {
    let state = app.state();
    let (message, video_url, filename) = match &state {
        RunState::Error { message } => (Some(message.clone()), None, None),
        RunState::Done { video_id } => (
            None,
            Some(format!("/api/video/{video_id}")),
            Some(VIDEO_FILENAME),
        ),
        _ => (None, None, None),
    };
    Json(StatusResponse {
        status: state.label(),
        percent: state.percent(),
        message,
        video_url,
        filename,
    })
}

async fn get_video(State(app): State<Arc<NewsreelApp>>, Path(id): Path<Uuid>) -> Response {
    match app.video_for(id) {
        Some(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "video/mp4".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{VIDEO_FILENAME}\""),
                ),
            ],
            data,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn router(app: Arc<NewsreelApp>) -> Router {
    Router::new()
        .route("/api/headlines", get(get_headlines))
        .route("/api/generate", post(post_generate))
        .route("/api/status", get(get_status))
        .route("/api/video/:id", get(get_video))
        .with_state(app)
}

/// Serve the API until ctrl-c.
pub async fn serve(app: Arc<NewsreelApp>, listen: SocketAddr) -> NewsreelResult<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| NewsreelError::validation(format!("failed to bind {listen}: {e}")))?;
    tracing::info!(%listen, "newsreel listening");
    axum::serve(listener, router(app).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| NewsreelError::Other(anyhow::Error::new(e)))?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
