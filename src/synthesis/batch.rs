//! Drives planning, synthesis, and splitting over a slice of turns.
//!
//! Each completed turn is stored as a WAV blob and reported on the progress
//! channel right away, so the receiver can persist it before the next
//! provider call starts. A closed channel stops the run.

use crate::audio::splitter::{SplitTurn, split};
use crate::audio::wav::encode_pcm;
use crate::defaults;
use crate::error::{PodsynthError, Result};
use crate::job::Turn;
use crate::store::BlobStore;
use crate::synthesis::clean::{clean_for_speech, is_speakable};
use crate::synthesis::client::{AudioSynthesisClient, DialogueTurn};
use crate::synthesis::planner::{BatchMode, ChunkPlanner, PlannerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub planner: PlannerConfig,
    /// Pause between consecutive provider calls.
    pub inter_call_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            inter_call_delay: Duration::from_millis(defaults::INTER_CALL_DELAY_MS),
        }
    }
}

/// What happened to one handled turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The turn with its new audio and duration.
    Synthesized(Turn),
    /// A provider call for this turn was made and failed.
    Failed { turn_id: String },
    /// No speakable text, so no call was made.
    Skipped,
}

/// Emitted once per handled turn. `completed` only ever grows.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub message: String,
    pub outcome: TurnOutcome,
}

impl BatchProgress {
    /// The synthesized turn, if this event carries one.
    pub fn turn(&self) -> Option<&Turn> {
        match &self.outcome {
            TurnOutcome::Synthesized(turn) => Some(turn),
            _ => None,
        }
    }
}

pub struct AudioBatchOrchestrator {
    client: AudioSynthesisClient,
    blobs: Arc<dyn BlobStore>,
    planner: ChunkPlanner,
    inter_call_delay: Duration,
}

/// Spaces provider calls by a fixed delay. The first call goes out at once.
struct Pacer {
    delay: Duration,
    called: bool,
}

impl Pacer {
    async fn wait(&mut self) {
        if self.called && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.called = true;
    }
}

/// Mutable state of one run.
struct Run<'a> {
    job_id: &'a str,
    language: Option<&'a str>,
    progress: mpsc::Sender<BatchProgress>,
    deadline: Option<Instant>,
    pacer: Pacer,
    completed: usize,
    total: usize,
    stopped: bool,
}

impl Run<'_> {
    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.progress.is_closed() {
            info!(job_id = self.job_id, "progress receiver gone, stopping audio batch");
            self.stopped = true;
        } else if self.past_deadline() {
            info!(
                job_id = self.job_id,
                completed = self.completed,
                total = self.total,
                "invocation deadline reached, stopping audio batch"
            );
            self.stopped = true;
        }
        self.stopped
    }

    async fn report(&mut self, message: String, outcome: TurnOutcome) {
        self.completed += 1;
        let event = BatchProgress {
            completed: self.completed,
            total: self.total,
            message,
            outcome,
        };
        if self.progress.send(event).await.is_err() {
            self.stopped = true;
        }
    }
}

impl AudioBatchOrchestrator {
    pub fn new(client: AudioSynthesisClient, blobs: Arc<dyn BlobStore>, config: BatchConfig) -> Self {
        Self {
            client,
            blobs,
            planner: ChunkPlanner::new(config.planner),
            inter_call_delay: config.inter_call_delay,
        }
    }

    pub fn client(&self) -> &AudioSynthesisClient {
        &self.client
    }

    /// Synthesize `turns` in order.
    ///
    /// Returns the turns with `audio` and `duration` set where synthesis
    /// succeeded and untouched where it failed or was not reached. Only blob
    /// storage failures abort the run.
    pub async fn run(
        &self,
        job_id: &str,
        mut turns: Vec<Turn>,
        language: Option<&str>,
        progress: mpsc::Sender<BatchProgress>,
        deadline: Option<Instant>,
    ) -> Result<Vec<Turn>> {
        let cleaned: Vec<Turn> = turns
            .iter()
            .map(|t| Turn {
                text: clean_for_speech(&t.text),
                ..t.clone()
            })
            .collect();
        let batches = self.planner.plan(&cleaned);

        let mut run = Run {
            job_id,
            language,
            progress,
            deadline,
            pacer: Pacer {
                delay: self.inter_call_delay,
                called: false,
            },
            completed: 0,
            total: turns.len(),
            stopped: false,
        };

        debug!(
            job_id,
            turns = turns.len(),
            batches = batches.len(),
            provider = self.client.provider_name(),
            "planned audio batches"
        );

        for (index, batch) in batches.iter().enumerate() {
            if run.should_stop() {
                break;
            }

            let speakable: Vec<usize> = batch
                .range
                .clone()
                .filter(|&i| is_speakable(&cleaned[i].text))
                .collect();

            if batch.mode == BatchMode::Dialogue && speakable.len() >= 2 {
                match self.dialogue(&mut run, &cleaned, &speakable, &mut turns).await {
                    Ok(()) => {}
                    Err(e @ PodsynthError::Persistence { .. }) => return Err(e),
                    Err(e) => {
                        warn!(
                            job_id,
                            batch = index,
                            turns = speakable.len(),
                            error = %e,
                            "multi-speaker synthesis failed, falling back to single-speaker"
                        );
                        for &i in &speakable {
                            if run.should_stop() {
                                break;
                            }
                            self.single(&mut run, &mut turns[i], &cleaned[i].text)
                                .await?;
                        }
                    }
                }
                for i in batch.range.clone().filter(|i| !speakable.contains(i)) {
                    self.skip(&mut run, &turns[i]).await;
                }
                continue;
            }

            for i in batch.range.clone() {
                if run.should_stop() {
                    break;
                }
                if is_speakable(&cleaned[i].text) {
                    self.single(&mut run, &mut turns[i], &cleaned[i].text).await?;
                } else {
                    self.skip(&mut run, &turns[i]).await;
                }
            }
        }

        Ok(turns)
    }

    /// One multi-speaker call for the speakable turns of a batch, then split
    /// and store each clip. Any failure before the first clip is stored lets
    /// the caller fall back to single-speaker calls.
    async fn dialogue(
        &self,
        run: &mut Run<'_>,
        cleaned: &[Turn],
        speakable: &[usize],
        turns: &mut [Turn],
    ) -> Result<()> {
        let lines: Vec<DialogueTurn> = speakable
            .iter()
            .map(|&i| DialogueTurn::new(cleaned[i].text.clone(), cleaned[i].speaker_role))
            .collect();

        run.pacer.wait().await;
        let buffer = self.client.synthesize_dialogue(&lines, run.language).await?;

        let split_turns: Vec<SplitTurn> = speakable
            .iter()
            .map(|&i| SplitTurn::new(cleaned[i].id.clone(), cleaned[i].text.clone()))
            .collect();
        let clips = split(&buffer, &split_turns)?;

        // Store everything first so a blob failure leaves nothing half-reported.
        let mut stored = Vec::with_capacity(clips.len());
        for clip in clips {
            let url = self.store_clip(run.job_id, &clip.id, clip.clip).await?;
            stored.push((url, clip.duration_seconds));
        }

        for (&i, (url, duration)) in speakable.iter().zip(stored) {
            let turn = &mut turns[i];
            turn.audio = url;
            turn.duration = duration;
            let message = format!("Synthesized turn {} (dialogue)", turn.id);
            run.report(message, TurnOutcome::Synthesized(turn.clone()))
                .await;
        }
        Ok(())
    }

    /// Single-speaker synthesis for one turn. A provider failure counts one
    /// attempt and leaves the audio empty for a later retry.
    async fn single(&self, run: &mut Run<'_>, turn: &mut Turn, text: &str) -> Result<()> {
        let voice = self.client.voice_for(turn.speaker_role).to_string();
        run.pacer.wait().await;

        match self.client.synthesize_single(text, &voice, run.language).await {
            Ok(result) => {
                let clip = encode_pcm(&result.audio)?;
                let url = self.store_clip(run.job_id, &turn.id, clip).await?;
                turn.audio = url;
                turn.duration = result.duration_estimate.max(defaults::MIN_CLIP_SECONDS);
                let message = format!("Synthesized turn {}", turn.id);
                run.report(message, TurnOutcome::Synthesized(turn.clone()))
                    .await;
            }
            Err(e) => {
                warn!(
                    job_id = run.job_id,
                    turn_id = %turn.id,
                    error = %e,
                    "single-speaker synthesis failed, turn left for retry"
                );
                turn.synthesis_attempts += 1;
                let message = format!("Synthesis failed for turn {}", turn.id);
                let outcome = TurnOutcome::Failed {
                    turn_id: turn.id.clone(),
                };
                run.report(message, outcome).await;
            }
        }
        Ok(())
    }

    /// Empty-text turns are a script defect; they get no audio and no retry.
    async fn skip(&self, run: &mut Run<'_>, turn: &Turn) {
        warn!(job_id = run.job_id, turn_id = %turn.id, "turn has no speakable text, skipping");
        run.report(format!("Skipped empty turn {}", turn.id), TurnOutcome::Skipped)
            .await;
    }

    async fn store_clip(&self, job_id: &str, turn_id: &str, clip: Vec<u8>) -> Result<String> {
        let path = clip_path(job_id, turn_id);
        self.blobs
            .put(&path, clip, defaults::CLIP_CONTENT_TYPE)
            .await
    }
}

/// Blob path of a turn's clip.
pub fn clip_path(job_id: &str, turn_id: &str) -> String {
    format!("jobs/{job_id}/turns/{turn_id}.wav")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SpeakerRole;
    use crate::store::MemoryBlobStore;
    use crate::synthesis::client::ClientSettings;
    use crate::synthesis::provider::SilentSynthesizer;

    fn turn(id: &str, role: SpeakerRole, text: &str) -> Turn {
        Turn::new(id, "ch-1", role, text)
    }

    fn orchestrator(
        synth: Arc<SilentSynthesizer>,
        blobs: Arc<MemoryBlobStore>,
    ) -> AudioBatchOrchestrator {
        let client = AudioSynthesisClient::new(synth, ClientSettings::default());
        AudioBatchOrchestrator::new(
            client,
            blobs,
            BatchConfig {
                planner: PlannerConfig::default(),
                inter_call_delay: Duration::ZERO,
            },
        )
    }

    async fn collect(mut rx: mpsc::Receiver<BatchProgress>) -> Vec<BatchProgress> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn three_turn_dialogue() -> Vec<Turn> {
        vec![
            turn("a", SpeakerRole::Host, "Welcome to the show today"),
            turn("b", SpeakerRole::Expert, "Thanks for having me here"),
            turn("c", SpeakerRole::Host, "Let us begin with the basics"),
        ]
    }

    #[tokio::test]
    async fn dialogue_batch_is_split_into_clips() {
        let synth = Arc::new(SilentSynthesizer::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth.clone(), blobs.clone());
        let (tx, rx) = mpsc::channel(16);

        let (result, events) = tokio::join!(
            orch.run("job-1", three_turn_dialogue(), Some("en"), tx, None),
            collect(rx)
        );
        let turns = result.unwrap();

        assert_eq!(synth.dialogue_calls(), 1);
        assert_eq!(synth.single_calls(), 0);
        assert!(turns.iter().all(Turn::has_audio));
        assert_eq!(turns[0].text, "Welcome to the show today");
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.turn().is_some_and(Turn::has_audio)));
        assert_eq!(
            events.iter().map(|e| e.completed).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(blobs.get("jobs/job-1/turns/b.wav").is_some());
    }

    #[tokio::test]
    async fn failed_dialogue_falls_back_to_single_calls() {
        let synth = Arc::new(SilentSynthesizer::new().with_dialogue_failure());
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth.clone(), blobs.clone());
        let (tx, rx) = mpsc::channel(16);

        let (result, events) = tokio::join!(
            orch.run("job-1", three_turn_dialogue(), None, tx, None),
            collect(rx)
        );
        let turns = result.unwrap();

        assert_eq!(synth.dialogue_calls(), 1);
        assert_eq!(synth.single_calls(), 3);
        assert!(turns.iter().all(Turn::has_audio));
        assert!(turns.iter().all(|t| t.duration >= 1.0));
        // The failed dialogue call is not charged to any turn.
        assert!(turns.iter().all(|t| t.synthesis_attempts == 0));
        assert_eq!(events.len(), 3);
        assert_eq!(blobs.len(), 3);
    }

    #[tokio::test]
    async fn single_failure_leaves_turn_empty() {
        let synth = Arc::new(SilentSynthesizer::new().with_single_failure("Only me talking"));
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth, blobs);
        let (tx, rx) = mpsc::channel(16);

        let input = vec![
            turn("a", SpeakerRole::Host, "Only me talking"),
            turn("b", SpeakerRole::Host, "Still only me"),
        ];
        let (result, events) = tokio::join!(orch.run("job-1", input, None, tx, None), collect(rx));
        let turns = result.unwrap();

        assert!(!turns[0].has_audio());
        assert_eq!(turns[0].synthesis_attempts, 1);
        assert!(turns[1].has_audio());
        assert_eq!(turns[1].synthesis_attempts, 0);
        assert_eq!(events.len(), 2);
        assert!(events[0].turn().is_none());
        assert_eq!(
            events[0].outcome,
            TurnOutcome::Failed {
                turn_id: "a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unspeakable_turn_is_skipped_without_a_call() {
        let synth = Arc::new(SilentSynthesizer::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth.clone(), blobs);
        let (tx, rx) = mpsc::channel(16);

        let input = vec![turn("a", SpeakerRole::Host, "**  **")];
        let (result, events) = tokio::join!(orch.run("job-1", input, None, tx, None), collect(rx));
        let turns = result.unwrap();

        assert_eq!(synth.single_calls(), 0);
        assert!(!turns[0].has_audio());
        assert_eq!(turns[0].duration, 0.0);
        assert_eq!(turns[0].synthesis_attempts, 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, TurnOutcome::Skipped);
    }

    #[tokio::test]
    async fn markup_is_stripped_before_synthesis() {
        let synth = Arc::new(SilentSynthesizer::new().with_single_failure("**bold** claim"));
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth, blobs);
        let (tx, rx) = mpsc::channel(16);

        let input = vec![turn("a", SpeakerRole::Host, "**bold** claim")];
        let (result, _) = tokio::join!(orch.run("job-1", input, None, tx, None), collect(rx));
        let turns = result.unwrap();

        assert!(turns[0].has_audio(), "provider saw cleaned text, not markup");
        assert_eq!(turns[0].text, "**bold** claim", "stored text is unchanged");
    }

    #[tokio::test]
    async fn blob_failure_aborts_the_run() {
        let synth = Arc::new(SilentSynthesizer::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.set_fail_puts(true);
        let orch = orchestrator(synth, blobs);
        let (tx, rx) = mpsc::channel(16);

        let input = vec![turn("a", SpeakerRole::Host, "Hello there")];
        let (result, _) = tokio::join!(orch.run("job-1", input, None, tx, None), collect(rx));
        assert!(matches!(result, Err(PodsynthError::Persistence { .. })));
    }

    #[tokio::test]
    async fn closed_channel_stops_before_next_batch() {
        let synth = Arc::new(SilentSynthesizer::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth.clone(), blobs);
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let input = vec![
            turn("a", SpeakerRole::Host, "One"),
            turn("b", SpeakerRole::Host, "Two"),
        ];
        orch.run("job-1", input, None, tx, None).await.unwrap();
        assert_eq!(synth.single_calls(), 0);
    }

    #[tokio::test]
    async fn expired_deadline_starts_no_work() {
        let synth = Arc::new(SilentSynthesizer::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth.clone(), blobs);
        let (tx, rx) = mpsc::channel(16);

        let input = vec![turn("a", SpeakerRole::Host, "One")];
        let (result, events) = tokio::join!(
            orch.run("job-1", input, None, tx, Some(Instant::now())),
            collect(rx)
        );
        assert!(!result.unwrap()[0].has_audio());
        assert!(events.is_empty());
        assert_eq!(synth.single_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_leaves_unreached_turns_uncharged() {
        let synth = Arc::new(SilentSynthesizer::new().with_latency(Duration::from_secs(1)));
        let blobs = Arc::new(MemoryBlobStore::new());
        let orch = orchestrator(synth.clone(), blobs);
        let (tx, rx) = mpsc::channel(16);

        let input = vec![
            turn("a", SpeakerRole::Host, "One"),
            turn("b", SpeakerRole::Host, "Two"),
            turn("c", SpeakerRole::Host, "Three"),
        ];
        let deadline = Instant::now() + Duration::from_millis(1500);
        let (result, events) = tokio::join!(
            orch.run("job-1", input, None, tx, Some(deadline)),
            collect(rx)
        );
        let turns = result.unwrap();

        assert_eq!(synth.single_calls(), 2);
        assert_eq!(events.len(), 2);
        assert!(turns[1].has_audio());
        assert!(!turns[2].has_audio());
        assert_eq!(turns[2].synthesis_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_calls_are_spaced_by_the_delay() {
        let synth = Arc::new(SilentSynthesizer::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let client = AudioSynthesisClient::new(synth.clone(), ClientSettings::default());
        let orch = AudioBatchOrchestrator::new(
            client,
            blobs,
            BatchConfig {
                planner: PlannerConfig::default(),
                inter_call_delay: Duration::from_millis(500),
            },
        );
        let (tx, rx) = mpsc::channel(16);

        let input = vec![
            turn("a", SpeakerRole::Host, "One"),
            turn("b", SpeakerRole::Host, "Two"),
            turn("c", SpeakerRole::Host, "Three"),
        ];
        let start = Instant::now();
        let (result, _) = tokio::join!(orch.run("job-1", input, None, tx, None), collect(rx));
        result.unwrap();

        assert_eq!(synth.single_calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[test]
    fn clip_path_layout() {
        assert_eq!(clip_path("job-1", "turn-0003"), "jobs/job-1/turns/turn-0003.wav");
    }
}
