//! Text helpers for title cards: whitespace normalization, greedy word
//! wrapping against a pixel budget, and the publication-date caption.

use chrono::DateTime;

/// Appended to the last wrapped line when input had to be discarded.
pub const ELLIPSIS: char = '\u{2026}';

/// Caption shown when a publication timestamp is empty or unparseable.
pub const TIME_UNAVAILABLE: &str = "time unavailable";

/// Collapse internal whitespace runs to single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedy word-boundary wrap of `text` against a pixel `max_width` budget.
///
/// `measure` returns the rendered width of a candidate line; words are
/// appended to the running line until the next append would exceed the
/// budget, at which point the line is committed and the word starts a new
/// one. A single word wider than the whole budget is never split; it stays
/// as its own (overflowing) line. At most `max_lines` lines are produced.
/// When input had to be discarded, the final line is shortened from the end,
/// character by character, until it fits the budget together with a trailing
/// ellipsis.
pub fn wrap_text<F>(text: &str, max_width: u32, max_lines: usize, measure: F) -> Vec<String>
where
    F: Fn(&str) -> u32,
{
    let text = collapse_whitespace(text);
    if text.is_empty() || max_lines == 0 {
        return Vec::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut discarded = false;

    for word in text.split(' ') {
        if current.is_empty() {
            current = word.to_string();
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
            continue;
        }
        lines.push(std::mem::take(&mut current));
        if lines.len() == max_lines {
            // The cap is reached; this word and everything after it is
            // dropped in favor of the ellipsis.
            discarded = true;
            break;
        }
        current = word.to_string();
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if discarded && let Some(last) = lines.last_mut() {
        *last = ellipsize(last, max_width, &measure);
    }

    lines
}

fn ellipsize<F>(line: &str, max_width: u32, measure: &F) -> String
where
    F: Fn(&str) -> u32,
{
    let mut kept = line.to_string();
    loop {
        let candidate = format!("{kept}{ELLIPSIS}");
        if kept.is_empty() || measure(&candidate) <= max_width {
            return candidate;
        }
        kept.pop();
    }
}

/// Format a raw feed timestamp as the card's date caption (fixed English
/// locale, full date + short time). Empty or unparseable input yields
/// [`TIME_UNAVAILABLE`]; this never fails.
pub fn format_pub_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return TIME_UNAVAILABLE.to_string();
    }
    // RSS pubDate is RFC 2822; some feeds carry RFC 3339 instead.
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.format("%A, %B %-d, %Y, %-I:%M %p").to_string())
        .unwrap_or_else(|_| TIME_UNAVAILABLE.to_string())
}
