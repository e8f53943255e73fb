//! Playable timeline derived from per-turn durations.
//!
//! Timestamps are a prefix sum over turn durations in stored order. They never
//! depend on wall-clock time, so recomputing after a resume yields the same
//! values as an uninterrupted run.

use crate::job::{Chapter, Turn};

/// Assign `timestamp[i] = sum(duration[0..i])` to every turn.
///
/// Negative or non-finite durations count as zero so timestamps stay
/// non-decreasing.
pub fn recompute(turns: &[Turn]) -> Vec<Turn> {
    let mut elapsed = 0.0_f64;
    turns
        .iter()
        .map(|turn| {
            let mut turn = turn.clone();
            turn.timestamp = elapsed;
            elapsed += sanitized(turn.duration);
            turn
        })
        .collect()
}

/// Derive each chapter's span from its member turns.
///
/// `turns` must already carry recomputed timestamps. A chapter with no member
/// turns keeps its previous span.
pub fn recompute_chapters(chapters: &[Chapter], turns: &[Turn]) -> Vec<Chapter> {
    chapters
        .iter()
        .map(|chapter| {
            let mut chapter = chapter.clone();
            let span = turns
                .iter()
                .filter(|t| t.chapter_id == chapter.id)
                .fold(None, |acc: Option<(f64, f64)>, t| {
                    let start = t.timestamp;
                    let end = t.timestamp + sanitized(t.duration);
                    Some(match acc {
                        Some((lo, hi)) => (lo.min(start), hi.max(end)),
                        None => (start, end),
                    })
                });
            if let Some((start, end)) = span {
                chapter.start_time = start;
                chapter.end_time = end;
            }
            chapter
        })
        .collect()
}

/// Total program length in seconds.
pub fn total_duration(turns: &[Turn]) -> f64 {
    turns.iter().map(|t| sanitized(t.duration)).sum()
}

fn sanitized(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}
