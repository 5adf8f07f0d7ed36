//! Encoder boundary and encode orchestration.
//!
//! The encoder is a black box behind [`EncoderBackend`]: a named-buffer
//! scratch area plus one execute operation with fractional progress. The
//! production implementation stages files in a scratch directory and invokes
//! the system `ffmpeg`; tests substitute an in-memory fake.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::render::Frame;

/// Fixed output name inside the encoder scratch area.
pub const OUTPUT_NAME: &str = "output.mp4";

/// Seconds each input frame is held on screen.
pub const SECONDS_PER_FRAME: u32 = 3;

/// Output frame rate.
pub const OUTPUT_FPS: u32 = 30;

/// Sequential PNG input pattern, 0-based.
pub const INPUT_PATTERN: &str = "frame%03d.png";

/// The video-encoding collaborator. Injected into the pipeline so the
/// orchestration never touches a process-wide singleton directly and tests
/// can swap in a fake.
pub trait EncoderBackend: Send {
    /// Initialize the backend. Lazy and idempotent; the first call of a
    /// session pays the setup cost, later calls are no-ops.
    fn init(&mut self) -> NewsreelResult<()>;
    fn write_file(&mut self, name: &str, data: &[u8]) -> NewsreelResult<()>;
    fn read_file(&mut self, name: &str) -> NewsreelResult<Vec<u8>>;
    fn list_files(&mut self) -> NewsreelResult<Vec<String>>;
    fn remove_file(&mut self, name: &str) -> NewsreelResult<()>;
    /// Execute one encode with `args`, reporting fractional completion in
    /// 0..=1 through `on_progress`. Progress is informational only.
    fn run(&mut self, args: &[String], on_progress: &mut dyn FnMut(f64)) -> NewsreelResult<()>;
}

/// Fixed H.264 slideshow profile: one input frame every three seconds,
/// 30 fps output, 4:2:0 chroma, fast-start MP4.
#[derive(Clone, Debug)]
pub struct EncodeProfile {
    pub frame_count: usize,
}

impl EncodeProfile {
    pub fn new(frame_count: usize) -> Self {
        Self { frame_count }
    }

    /// Output duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.frame_count as u32 * SECONDS_PER_FRAME) as f64
    }

    /// The fixed argument vector handed to [`EncoderBackend::run`].
    pub fn args(&self) -> Vec<String> {
        [
            "-framerate",
            &format!("1/{SECONDS_PER_FRAME}"),
            "-i",
            INPUT_PATTERN,
            "-c:v",
            "libx264",
            "-r",
            &OUTPUT_FPS.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
            OUTPUT_NAME,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Matches the staged frame naming pattern ("frameNNN.png").
pub fn is_frame_file(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("frame") else {
        return false;
    };
    let Some(digits) = rest.strip_suffix(".png") else {
        return false;
    };
    digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Stage `frames` into the encoder scratch area, run one encode, and read
/// back the MP4 bytes.
///
/// Stale files from a previous run are removed first; cleanup failures,
/// including the listing itself, are ignored. Encoder progress reaches
/// `on_percent` as a rounded 0-100 percentage clamped to 100.
pub fn encode_frames(
    encoder: &mut dyn EncoderBackend,
    frames: &[Frame],
    on_percent: &mut dyn FnMut(u8),
) -> NewsreelResult<Vec<u8>> {
    encoder.init()?;

    // Best-effort hygiene of the shared scratch area.
    if let Ok(names) = encoder.list_files() {
        for name in names {
            if is_frame_file(&name) || name == OUTPUT_NAME {
                let _ = encoder.remove_file(&name);
            }
        }
    }

    for frame in frames {
        encoder.write_file(&frame.name, &frame.data)?;
    }

    let args = EncodeProfile::new(frames.len()).args();
    let mut forward = |ratio: f64| {
        let percent = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;
        on_percent(percent);
    };
    encoder.run(&args, &mut forward)?;

    encoder.read_file(OUTPUT_NAME)
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Encoder boundary backed by the system `ffmpeg` binary over a scratch
/// directory. The directory is shared process-wide state; hygiene comes from
/// the cleanup-before-staging discipline in [`encode_frames`], not locking.
pub struct FfmpegEncoder {
    work_dir: PathBuf,
    initialized: bool,
}

impl FfmpegEncoder {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            initialized: false,
        }
    }

    fn path_for(&self, name: &str) -> NewsreelResult<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(NewsreelError::validation(format!(
                "invalid scratch file name '{name}'"
            )));
        }
        Ok(self.work_dir.join(name))
    }
}

impl EncoderBackend for FfmpegEncoder {
    fn init(&mut self) -> NewsreelResult<()> {
        if self.initialized {
            return Ok(());
        }
        if !is_ffmpeg_on_path() {
            return Err(NewsreelError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }
        use anyhow::Context as _;
        std::fs::create_dir_all(&self.work_dir).with_context(|| {
            format!(
                "failed to create scratch directory '{}'",
                self.work_dir.display()
            )
        })?;
        self.initialized = true;
        Ok(())
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> NewsreelResult<()> {
        let path = self.path_for(name)?;
        std::fs::write(path, data)
            .map_err(|e| NewsreelError::encode(format!("failed to stage '{name}': {e}")))
    }

    fn read_file(&mut self, name: &str) -> NewsreelResult<Vec<u8>> {
        let path = self.path_for(name)?;
        std::fs::read(path)
            .map_err(|e| NewsreelError::encode(format!("failed to read back '{name}': {e}")))
    }

    fn list_files(&mut self) -> NewsreelResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.work_dir).map_err(|e| {
            NewsreelError::encode(format!(
                "failed to list scratch directory '{}': {e}",
                self.work_dir.display()
            ))
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| NewsreelError::encode(format!("failed to list scratch: {e}")))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn remove_file(&mut self, name: &str) -> NewsreelResult<()> {
        let path = self.path_for(name)?;
        std::fs::remove_file(path)
            .map_err(|e| NewsreelError::encode(format!("failed to remove '{name}': {e}")))
    }

    fn run(&mut self, args: &[String], on_progress: &mut dyn FnMut(f64)) -> NewsreelResult<()> {
        let staged_frames = self
            .list_files()?
            .into_iter()
            .filter(|n| is_frame_file(n))
            .count();
        let total_us = EncodeProfile::new(staged_frames).duration_secs() * 1_000_000.0;

        let mut cmd = Command::new("ffmpeg");
        cmd.current_dir(&self.work_dir)
            .args(["-y", "-loglevel", "error", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            NewsreelError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NewsreelError::encode("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| NewsreelError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });

        // `-progress pipe:1` emits key=value lines; out_time_us tracks the
        // produced output timeline.
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Some(value) = line.strip_prefix("out_time_us=")
                && let Ok(us) = value.trim().parse::<f64>()
                && total_us > 0.0
            {
                on_progress((us / total_us).clamp(0.0, 1.0));
            }
            if line.trim() == "progress=end" {
                on_progress(1.0);
            }
        }

        let status = child.wait().map_err(|e| {
            NewsreelError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| NewsreelError::encode("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| NewsreelError::encode(format!("ffmpeg stderr read failed: {e}")))?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(NewsreelError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}
