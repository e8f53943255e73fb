//! Progress percentages per stage.
//!
//! Transcription fills 10..=35, extraction sits at 40, the finished script at
//! the configured midpoint, audio fills midpoint..=95, and 100 is reserved for
//! the finalized job.

use crate::defaults::{PROGRESS_AUDIO_END, PROGRESS_TRANSCRIPTION_END, PROGRESS_TRANSCRIPTION_START};

fn interpolate(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = end.saturating_sub(start) as usize;
    let step = span * done.min(total) / total;
    start.saturating_add(step as u8)
}

pub fn transcription(done: usize, total: usize) -> u8 {
    interpolate(PROGRESS_TRANSCRIPTION_START, PROGRESS_TRANSCRIPTION_END, done, total)
}

pub fn audio(script_progress: u8, done: usize, total: usize) -> u8 {
    interpolate(script_progress, PROGRESS_AUDIO_END, done, total)
}
