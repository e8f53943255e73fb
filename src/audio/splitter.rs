//! Proportional splitting of one dialogue buffer back into per-turn clips.
//!
//! The provider renders a short multi-speaker exchange as one buffer with no
//! turn boundaries. Each turn gets a share of the samples proportional to its
//! word count. Speaking rate is not uniform, so the cut points are an
//! estimate: no forced alignment or silence detection is attempted.

use crate::audio::PcmAudio;
use crate::audio::wav::encode_wav;
use crate::defaults::MIN_CLIP_SECONDS;
use crate::error::Result;

/// One turn that was merged into the dialogue buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTurn {
    pub id: String,
    pub text: String,
}

impl SplitTurn {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Word weight, never below 1.
    fn weight(&self) -> usize {
        self.text.split_whitespace().count().max(1)
    }
}

/// A playable slice of the dialogue buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitClip {
    pub id: String,
    /// WAV container bytes.
    pub clip: Vec<u8>,
    /// Number of PCM samples in this clip.
    pub samples: usize,
    /// Clip length in seconds, floored at [`MIN_CLIP_SECONDS`].
    pub duration_seconds: f64,
}

/// Compute per-turn sample counts for a buffer of `total_samples`.
///
/// Every turn but the last gets `round(total * words / total_words)`, clamped
/// to what is left. The last turn takes the exact remainder, so the counts
/// always sum to `total_samples`.
pub fn allocate_samples(total_samples: usize, turns: &[SplitTurn]) -> Vec<usize> {
    if turns.is_empty() {
        return Vec::new();
    }

    let weights: Vec<usize> = turns.iter().map(SplitTurn::weight).collect();
    let total_weight: usize = weights.iter().sum();

    let mut allocations = Vec::with_capacity(turns.len());
    let mut remaining = total_samples;
    for &weight in &weights[..weights.len() - 1] {
        let share = (total_samples as f64 * weight as f64 / total_weight as f64).round() as usize;
        let share = share.min(remaining);
        allocations.push(share);
        remaining -= share;
    }
    allocations.push(remaining);
    allocations
}

/// Partition `buffer` across `turns` and wrap each slice as a WAV clip.
///
/// `buffer` must have been synthesized from exactly these turns, in order.
pub fn split(buffer: &PcmAudio, turns: &[SplitTurn]) -> Result<Vec<SplitClip>> {
    let allocations = allocate_samples(buffer.sample_count(), turns);
    let sample_rate = buffer.format.sample_rate.max(1) as f64;

    let mut clips = Vec::with_capacity(turns.len());
    let mut offset = 0usize;
    for (turn, &count) in turns.iter().zip(&allocations) {
        let samples = buffer.samples_in(offset, offset + count);
        let clip = encode_wav(&samples, buffer.format)?;
        clips.push(SplitClip {
            id: turn.id.clone(),
            clip,
            samples: count,
            duration_seconds: (count as f64 / sample_rate).max(MIN_CLIP_SECONDS),
        });
        offset += count;
    }
    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn turns(texts: &[&str]) -> Vec<SplitTurn> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SplitTurn::new(format!("t{i}"), *t))
            .collect()
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn allocation_is_proportional_to_words() {
        let ts = turns(&[words(10).as_str(), words(30).as_str()]);
        assert_eq!(allocate_samples(4000, &ts), vec![1000, 3000]);
    }

    #[test]
    fn last_turn_absorbs_rounding_remainder() {
        let ts = turns(&["a", "b", "c"]);
        let alloc = allocate_samples(10, &ts);
        // round(10/3) = 3 for each of the first two, remainder 4
        assert_eq!(alloc, vec![3, 3, 4]);
        assert_eq!(alloc.iter().sum::<usize>(), 10);
    }

    #[test]
    fn allocation_is_lossless_for_many_shapes() {
        let shapes: [&[usize]; 5] = [&[1, 1], &[7, 3, 9], &[100, 1, 1, 1], &[2, 5, 2, 5], &[13]];
        for shape in shapes {
            let texts: Vec<String> = shape.iter().map(|&n| words(n)).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let ts = turns(&refs);
            for total in [0usize, 1, 17, 24_000, 123_457] {
                let alloc = allocate_samples(total, &ts);
                assert_eq!(alloc.len(), ts.len());
                assert_eq!(alloc.iter().sum::<usize>(), total, "shape {shape:?} total {total}");
            }
        }
    }

    #[test]
    fn empty_text_counts_as_one_word() {
        let ts = turns(&["", "one"]);
        assert_eq!(allocate_samples(100, &ts), vec![50, 50]);
    }

    #[test]
    fn clips_cover_whole_buffer_in_order() {
        let samples: Vec<i16> = (0..9000).map(|i| (i % 1000) as i16).collect();
        let buffer = PcmAudio::from_samples(&samples, 3000);
        let ts = turns(&[words(1).as_str(), words(2).as_str()]);

        let clips = split(&buffer, &ts).unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].id, "t0");
        assert_eq!(clips[1].id, "t1");
        assert_eq!(clips[0].samples + clips[1].samples, 9000);

        let mut rejoined = Vec::new();
        for clip in &clips {
            let reader = hound::WavReader::new(Cursor::new(clip.clip.clone())).unwrap();
            assert_eq!(reader.spec().sample_rate, 3000);
            assert_eq!(reader.spec().channels, 1);
            rejoined.extend(reader.into_samples::<i16>().map(|s| s.unwrap()));
        }
        assert_eq!(rejoined, samples);
    }

    #[test]
    fn clip_durations_follow_samples() {
        let buffer = PcmAudio::from_samples(&vec![0i16; 24000 * 6], 24000);
        let ts = turns(&[words(1).as_str(), words(2).as_str()]);

        let clips = split(&buffer, &ts).unwrap();

        assert_eq!(clips[0].duration_seconds, 2.0);
        assert_eq!(clips[1].duration_seconds, 4.0);
    }

    #[test]
    fn short_clips_are_floored_to_one_second() {
        let buffer = PcmAudio::from_samples(&vec![0i16; 100], 24000);
        let clips = split(&buffer, &turns(&["hi", "there"])).unwrap();
        assert!(clips.iter().all(|c| c.duration_seconds == MIN_CLIP_SECONDS));
    }

    #[test]
    fn no_turns_yields_no_clips() {
        let buffer = PcmAudio::from_samples(&[1, 2, 3], 24000);
        assert!(split(&buffer, &[]).unwrap().is_empty());
    }
}
