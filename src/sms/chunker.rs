//! Splits long bodies into SMS-sized segments on word boundaries.

/// Longest segment sent in one provider request, in characters.
pub const SEGMENT_LENGTH: usize = 160;

/// How far back from a hard cut to look for whitespace.
const BACKTRACK: usize = 25;

fn is_break(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// Split `body` into segments of at most [`SEGMENT_LENGTH`] characters.
///
/// Bodies that already fit are returned whole. Otherwise each cut backs up
/// to the nearest whitespace within [`BACKTRACK`] characters, falling back
/// to a hard cut. Segments are trimmed and empty ones are dropped.
pub fn chunk(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= SEGMENT_LENGTH {
        return vec![body.to_string()];
    }

    let mut segments = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + SEGMENT_LENGTH).min(chars.len());

        if end < chars.len() && !is_break(chars[end]) {
            let floor = end.saturating_sub(BACKTRACK).max(start + 1);
            if let Some(cut) = (floor..end).rev().find(|&i| is_break(chars[i])) {
                end = cut;
            }
        }

        let segment: String = chars[start..end].iter().collect();
        let trimmed = segment.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
        start = end;
    }

    segments
}
