//! Title-card frame rendering.
//!
//! Each headline becomes one fixed-size PNG: gradient background, masthead,
//! wrapped title, optional wrapped description, page counter, date caption.
//! Rendering is a pure function of the headline plus layout constants, so
//! frames for distinct headlines can render concurrently; ordering is carried
//! by the explicit frame index, never by completion order.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::feed::Headline;
use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::text::{format_pub_date, wrap_text};

pub const FRAME_WIDTH: u32 = 1280;
pub const FRAME_HEIGHT: u32 = 720;

const MARGIN_X: i32 = 80;
/// Pixel budget for wrapped text lines.
const TEXT_BUDGET: u32 = FRAME_WIDTH - 2 * MARGIN_X as u32;

const MASTHEAD: &str = "TODAY'S HEADLINES";
const MASTHEAD_PX: f32 = 30.0;
const MASTHEAD_Y: i32 = 92;

const TITLE_PX: f32 = 58.0;
const TITLE_MAX_LINES: usize = 3;
const TITLE_Y: i32 = 220;
const TITLE_LINE_GAP: i32 = 72;

const DESC_PX: f32 = 32.0;
const DESC_MAX_LINES: usize = 4;
const DESC_Y: i32 = 462;
const DESC_LINE_GAP: i32 = 42;

const FOOTER_PX: f32 = 26.0;
const FOOTER_Y: i32 = FRAME_HEIGHT as i32 - 72;

// Diagonal gradient endpoints, top-left to bottom-right.
const GRADIENT_START: [u8; 3] = [18, 20, 28];
const GRADIENT_END: [u8; 3] = [44, 26, 70];
// Vertical darkening overlay for text contrast, top to bottom alpha.
const OVERLAY_TOP: f32 = 0.12;
const OVERLAY_BOTTOM: f32 = 0.42;

const COLOR_TITLE: Rgb<u8> = Rgb([245, 246, 250]);
const COLOR_BODY: Rgb<u8> = Rgb([176, 182, 196]);
const COLOR_ACCENT: Rgb<u8> = Rgb([122, 158, 255]);

/// One rendered title card, named for its position in the feed.
#[derive(Clone, Debug)]
pub struct Frame {
    pub name: String,
    /// PNG bytes.
    pub data: Vec<u8>,
}

/// Zero-padded frame filename for a 0-based index: "frame000.png", ...
pub fn frame_name(index: usize) -> String {
    format!("frame{index:03}.png")
}

/// Card font plus the layout constants above. Constructed once per process
/// and shared read-only across render workers.
pub struct FrameStyle {
    font: FontVec,
}

impl FrameStyle {
    /// Load the card font: an explicit `path` first, then the
    /// `NEWSREEL_FONT` environment variable, then well-known system font
    /// locations. No usable font means no drawing surface, which is fatal
    /// for rendering.
    pub fn load(path: Option<&Path>) -> NewsreelResult<Self> {
        let bytes = font_bytes(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| NewsreelError::render(format!("failed to parse font: {e}")))?;
        Ok(Self { font })
    }

    fn measure(&self, px: f32, line: &str) -> u32 {
        let (width, _) = text_size(PxScale::from(px), &self.font, line);
        width as u32
    }
}

const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn font_bytes(path: Option<&Path>) -> NewsreelResult<Vec<u8>> {
    if let Some(path) = path {
        return std::fs::read(path)
            .map_err(|e| NewsreelError::render(format!("failed to read font '{}': {e}", path.display())));
    }
    if let Ok(env_path) = std::env::var("NEWSREEL_FONT") {
        return std::fs::read(&env_path)
            .map_err(|e| NewsreelError::render(format!("failed to read font '{env_path}': {e}")));
    }
    for candidate in SYSTEM_FONT_PATHS {
        if let Ok(bytes) = std::fs::read(candidate) {
            tracing::debug!(font = candidate, "using system font");
            return Ok(bytes);
        }
    }
    Err(NewsreelError::render(
        "no usable font found; pass --font or set NEWSREEL_FONT",
    ))
}

/// Render one title card for `headline` at `index` of `total`.
pub fn render_frame(
    style: &FrameStyle,
    headline: &Headline,
    index: usize,
    total: usize,
) -> NewsreelResult<Frame> {
    let mut img = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);
    paint_background(&mut img);

    draw_text_mut(
        &mut img,
        COLOR_ACCENT,
        MARGIN_X,
        MASTHEAD_Y,
        PxScale::from(MASTHEAD_PX),
        &style.font,
        MASTHEAD,
    );

    let title_lines = wrap_text(&headline.title, TEXT_BUDGET, TITLE_MAX_LINES, |s| {
        style.measure(TITLE_PX, s)
    });
    for (i, line) in title_lines.iter().enumerate() {
        draw_text_mut(
            &mut img,
            COLOR_TITLE,
            MARGIN_X,
            TITLE_Y + i as i32 * TITLE_LINE_GAP,
            PxScale::from(TITLE_PX),
            &style.font,
            line,
        );
    }

    if !headline.description.is_empty() {
        let desc_lines = wrap_text(&headline.description, TEXT_BUDGET, DESC_MAX_LINES, |s| {
            style.measure(DESC_PX, s)
        });
        for (i, line) in desc_lines.iter().enumerate() {
            draw_text_mut(
                &mut img,
                COLOR_BODY,
                MARGIN_X,
                DESC_Y + i as i32 * DESC_LINE_GAP,
                PxScale::from(DESC_PX),
                &style.font,
                line,
            );
        }
    }

    let counter = format!("{} / {}", index + 1, total);
    let counter_w = style.measure(FOOTER_PX, &counter);
    draw_text_mut(
        &mut img,
        COLOR_BODY,
        FRAME_WIDTH as i32 - MARGIN_X - counter_w as i32,
        FOOTER_Y,
        PxScale::from(FOOTER_PX),
        &style.font,
        &counter,
    );

    let caption = format_pub_date(&headline.published_at);
    draw_text_mut(
        &mut img,
        COLOR_BODY,
        MARGIN_X,
        FOOTER_Y,
        PxScale::from(FOOTER_PX),
        &style.font,
        &caption,
    );

    Ok(Frame {
        name: frame_name(index),
        data: encode_png(&img)?,
    })
}

fn paint_background(img: &mut RgbImage) {
    let diag_span = (FRAME_WIDTH + FRAME_HEIGHT - 2) as f32;
    let y_span = (FRAME_HEIGHT - 1) as f32;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let t = (x + y) as f32 / diag_span;
        let overlay = OVERLAY_TOP + (OVERLAY_BOTTOM - OVERLAY_TOP) * (y as f32 / y_span);
        let mut rgb = [0u8; 3];
        for (c, out) in rgb.iter_mut().enumerate() {
            let base = f32::from(lerp_u8(GRADIENT_START[c], GRADIENT_END[c], t));
            *out = (base * (1.0 - overlay)).round() as u8;
        }
        *px = Rgb(rgb);
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (f32::from(a) + (f32::from(b) - f32::from(a)) * t)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn encode_png(img: &RgbImage) -> NewsreelResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image::write_buffer_with_format(
        &mut Cursor::new(&mut bytes),
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .map_err(|e| NewsreelError::render(format!("png encode failed: {e}")))?;
    Ok(bytes)
}
