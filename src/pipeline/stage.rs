//! Stage inference from persisted job data.
//!
//! There is no stored "current stage". The stage is read off the shape of the
//! job record so a crash between two writes can never leave the two
//! disagreeing.

use crate::job::{Job, JobStatus, Turn};
use crate::synthesis::clean::is_speakable;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No script yet and some pages are still untranscribed.
    NeedsTranscription,
    /// Every page is transcribed but no script exists.
    NeedsScript,
    /// Some speakable turn still has no audio.
    NeedsAudio,
    /// Every turn is synthesized; the timeline has to be finalized.
    Finalize,
    /// The job is `ready`. Nothing left to do.
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::NeedsTranscription => "transcription",
            Stage::NeedsScript => "script",
            Stage::NeedsAudio => "audio",
            Stage::Finalize => "finalize",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// A job has a script once any turn carries text.
pub fn has_script(job: &Job) -> bool {
    job.turns.iter().any(|t| !t.text.trim().is_empty())
}

/// A turn still waiting for audio.
pub fn is_pending(turn: &Turn) -> bool {
    !turn.has_audio() && is_speakable(&turn.text)
}

/// Decide what the next invocation should do.
///
/// `untranscribed_pages` only matters while the job has no script.
pub fn infer(job: &Job, untranscribed_pages: usize) -> Stage {
    if job.status == JobStatus::Ready {
        Stage::Complete
    } else if !has_script(job) {
        if untranscribed_pages > 0 {
            Stage::NeedsTranscription
        } else {
            Stage::NeedsScript
        }
    } else if job.turns.iter().any(is_pending) {
        Stage::NeedsAudio
    } else {
        Stage::Finalize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SpeakerRole;

    fn job_with(turns: Vec<Turn>) -> Job {
        let mut job = Job::new("job-1", "owner");
        job.turns = turns;
        job
    }

    fn voiced(id: &str) -> Turn {
        let mut t = Turn::new(id, "c", SpeakerRole::Host, "spoken words");
        t.audio = format!("memory://{id}.wav");
        t.duration = 2.0;
        t
    }

    #[test]
    fn empty_job_with_pages_needs_transcription() {
        assert_eq!(infer(&job_with(vec![]), 3), Stage::NeedsTranscription);
    }

    #[test]
    fn transcribed_job_without_turns_needs_script() {
        assert_eq!(infer(&job_with(vec![]), 0), Stage::NeedsScript);
    }

    #[test]
    fn turns_with_blank_text_do_not_count_as_script() {
        let job = job_with(vec![Turn::new("t", "c", SpeakerRole::Host, "   ")]);
        assert_eq!(infer(&job, 0), Stage::NeedsScript);
    }

    #[test]
    fn pending_turn_needs_audio() {
        let job = job_with(vec![
            voiced("a"),
            Turn::new("b", "c", SpeakerRole::Expert, "not yet"),
        ]);
        assert_eq!(infer(&job, 5), Stage::NeedsAudio);
    }

    #[test]
    fn all_voiced_turns_finalize() {
        assert_eq!(infer(&job_with(vec![voiced("a"), voiced("b")]), 0), Stage::Finalize);
    }

    #[test]
    fn unspeakable_turn_is_not_pending() {
        let job = job_with(vec![voiced("a"), Turn::new("b", "c", SpeakerRole::Host, "**")]);
        assert_eq!(infer(&job, 0), Stage::Finalize);
    }

    #[test]
    fn ready_job_is_complete() {
        let mut job = job_with(vec![voiced("a")]);
        job.status = JobStatus::Ready;
        assert_eq!(infer(&job, 0), Stage::Complete);
    }
}
