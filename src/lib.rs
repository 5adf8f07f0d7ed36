//! Newsreel turns a news feed into a short video.
//!
//! One run fetches the upstream RSS feed, normalizes it into at most six
//! [`Headline`]s, renders one 1280x720 title card per headline, and stitches
//! the cards into an H.264 MP4 (one card every three seconds) through an
//! injected [`EncoderBackend`]. The result is exposed over a small HTTP API
//! or written to disk by the CLI.
#![forbid(unsafe_code)]

pub mod encode;
pub mod feed;
pub mod foundation;
pub mod pipeline;
pub mod render;
pub mod serve;
pub mod text;

pub use encode::{EncodeProfile, EncoderBackend, FfmpegEncoder, OUTPUT_NAME, is_ffmpeg_on_path};
pub use feed::{DEFAULT_FEED_URL, FeedConfig, FeedService, Headline, MAX_HEADLINES};
pub use foundation::error::{NewsreelError, NewsreelResult};
pub use pipeline::{Pipeline, RunState, StateObserver};
pub use render::{FRAME_HEIGHT, FRAME_WIDTH, Frame, FrameStyle, frame_name, render_frame};
pub use serve::{NewsreelApp, VIDEO_FILENAME, router, serve};
