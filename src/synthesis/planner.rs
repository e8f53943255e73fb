//! Groups dialogue turns into synthesis batches.
//!
//! Scans turns left to right and greedily grows a window from the current
//! position while every constraint holds:
//! - the turn is not over the per-turn word ceiling
//! - the window has at most `max_speakers` distinct roles
//! - the summed text length plus per-turn label overhead stays within budget
//! - the window has at most `max_turns` turns
//!
//! The longest prefix of the window that contains at least two roles becomes a
//! dialogue batch. If no such prefix exists the first turn becomes a single
//! batch and scanning resumes right after it.

use crate::defaults;
use crate::job::{SpeakerRole, Turn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

/// Limits for dialogue batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum distinct speaker roles per dialogue batch.
    pub max_speakers: usize,
    /// Character budget per dialogue batch (text plus label overhead).
    pub char_budget: usize,
    /// Maximum turns per dialogue batch.
    pub max_turns: usize,
    /// Turns with more words than this are always synthesized alone.
    pub max_turn_words: usize,
    /// Characters charged per turn for its speaker label.
    pub label_overhead: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_speakers: defaults::MAX_SPEAKERS,
            char_budget: defaults::CHAR_BUDGET,
            max_turns: defaults::MAX_TURNS_PER_BATCH,
            max_turn_words: defaults::MAX_TURN_WORDS,
            label_overhead: defaults::LABEL_OVERHEAD,
        }
    }
}

/// Synthesis mode for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Single,
    Dialogue,
}

/// A contiguous run of turns destined for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisBatch {
    pub mode: BatchMode,
    /// Index range into the planned slice.
    pub range: Range<usize>,
    pub turn_ids: Vec<String>,
}

impl SynthesisBatch {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Pure batch planner.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlanner {
    config: PlannerConfig,
}

impl ChunkPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Characters a turn costs inside a dialogue request.
    fn cost(&self, turn: &Turn) -> usize {
        turn.text.chars().count() + self.config.label_overhead
    }

    fn is_oversized(&self, turn: &Turn) -> bool {
        turn.word_count() > self.config.max_turn_words
    }

    /// Partition `turns` into batches. Every turn lands in exactly one batch,
    /// in order.
    pub fn plan(&self, turns: &[Turn]) -> Vec<SynthesisBatch> {
        let mut batches = Vec::new();
        let mut start = 0;

        while start < turns.len() {
            let end = self.longest_dialogue_end(turns, start);
            let (mode, range) = match end {
                Some(end) => (BatchMode::Dialogue, start..end + 1),
                None => (BatchMode::Single, start..start + 1),
            };
            start = range.end;
            batches.push(SynthesisBatch {
                mode,
                turn_ids: turns[range.clone()].iter().map(|t| t.id.clone()).collect(),
                range,
            });
        }

        batches
    }

    /// Last index of the longest valid window starting at `start` that holds
    /// at least two distinct roles, if any.
    fn longest_dialogue_end(&self, turns: &[Turn], start: usize) -> Option<usize> {
        let first = &turns[start];
        if self.is_oversized(first) || self.config.max_speakers < 2 {
            return None;
        }

        let mut roles: BTreeSet<SpeakerRole> = BTreeSet::from([first.speaker_role]);
        let mut size = self.cost(first);
        let mut best = None;

        for (index, turn) in turns.iter().enumerate().skip(start + 1) {
            if self.is_oversized(turn) {
                break;
            }
            if index - start + 1 > self.config.max_turns {
                break;
            }
            let grown_size = size + self.cost(turn);
            if grown_size > self.config.char_budget {
                break;
            }
            let new_role = !roles.contains(&turn.speaker_role);
            if new_role && roles.len() + 1 > self.config.max_speakers {
                break;
            }

            roles.insert(turn.speaker_role);
            size = grown_size;
            if roles.len() >= 2 {
                best = Some(index);
            }
        }

        best
    }
}
