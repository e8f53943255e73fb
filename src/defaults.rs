//! Default configuration constants for podsynth.
//!
//! Shared by the config layer and the components that fall back to them when
//! built without a config file. These are tunable policy, not invariants.

/// Pages transcribed per `advance` call.
pub const PAGES_PER_INVOCATION: usize = 5;

/// Turns handed to the audio stage per `advance` call.
pub const TURNS_PER_INVOCATION: usize = 6;

/// Wall-clock budget for one `advance` call, in seconds.
///
/// Kept under the typical five-minute ceiling of short-lived compute
/// invocations so the final persistence write still fits.
pub const INVOCATION_BUDGET_SECS: u64 = 240;

/// How many times a single turn may be attempted before the job fails.
pub const MAX_SYNTHESIS_ATTEMPTS: u32 = 3;

/// Progress checkpoints (0-100) for each stage.
pub const PROGRESS_TRANSCRIPTION_START: u8 = 10;
pub const PROGRESS_TRANSCRIPTION_END: u8 = 35;
pub const PROGRESS_KNOWLEDGE: u8 = 40;
pub const PROGRESS_SCRIPT: u8 = 65;
pub const PROGRESS_AUDIO_END: u8 = 95;
pub const PROGRESS_DONE: u8 = 100;

/// Maximum distinct speaker roles in one dialogue synthesis call.
pub const MAX_SPEAKERS: usize = 2;

/// Character budget for one dialogue synthesis call.
pub const CHAR_BUDGET: usize = 3000;

/// Maximum number of turns in one dialogue synthesis call.
pub const MAX_TURNS_PER_BATCH: usize = 4;

/// Turns longer than this many words always go through single-speaker synthesis.
pub const MAX_TURN_WORDS: usize = 400;

/// Characters added per turn for the speaker label in a dialogue request.
pub const LABEL_OVERHEAD: usize = 12;

/// Speaking rate used to estimate clip duration when the provider reports none.
///
/// 135 words per minute is a relaxed conversational pace; the resulting
/// duration is an estimate and is never treated as sample-accurate.
pub const WORDS_PER_MINUTE: u32 = 135;

/// Timeout for one synthesis call, in seconds.
pub const SYNTHESIS_TIMEOUT_SECS: u64 = 60;

/// Timeout for one language-service call, in seconds.
pub const LLM_TIMEOUT_SECS: u64 = 120;

/// Pause between consecutive provider calls, in milliseconds.
pub const INTER_CALL_DELAY_MS: u64 = 500;

/// Output sample rate of synthesized speech, in Hz.
pub const SAMPLE_RATE: u32 = 24000;

/// Bytes per PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Shortest clip duration fed into the timeline, in seconds.
pub const MIN_CLIP_SECONDS: f64 = 1.0;

/// Content type of stored clips.
pub const CLIP_CONTENT_TYPE: &str = "audio/wav";

/// Default voice ids per speaker role.
pub const HOST_VOICE: &str = "alloy";
pub const EXPERT_VOICE: &str = "onyx";
pub const SIMPLIFIER_VOICE: &str = "nova";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_checkpoints_are_ordered() {
        let checkpoints = [
            PROGRESS_TRANSCRIPTION_START,
            PROGRESS_TRANSCRIPTION_END,
            PROGRESS_KNOWLEDGE,
            PROGRESS_SCRIPT,
            PROGRESS_AUDIO_END,
            PROGRESS_DONE,
        ];
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn dialogue_limits_allow_at_least_one_exchange() {
        assert!(MAX_SPEAKERS >= 2);
        assert!(MAX_TURNS_PER_BATCH >= 2);
        assert!(CHAR_BUDGET > 2 * LABEL_OVERHEAD);
    }
}
