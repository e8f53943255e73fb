use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use podsynth::audio::PcmAudio;
use podsynth::audio::splitter::{SplitTurn, split};
use podsynth::job::{SpeakerRole, Turn};
use podsynth::synthesis::{ChunkPlanner, PlannerConfig};

const SAMPLE_RATE: u32 = 24_000;

/// A script that cycles through all three roles with varying turn lengths.
fn script(len: usize) -> Vec<Turn> {
    let roles = [SpeakerRole::Host, SpeakerRole::Expert, SpeakerRole::Simplifier];
    (0..len)
        .map(|i| {
            let words = 20 + (i * 37) % 90;
            let text = vec!["word"; words].join(" ");
            Turn::new(format!("turn-{i:04}"), "chapter-01", roles[i % 3], text)
        })
        .collect()
}

fn bench_plan(c: &mut Criterion) {
    let planner = ChunkPlanner::new(PlannerConfig::default());
    let mut group = c.benchmark_group("plan");
    for len in [10, 100, 1000] {
        let turns = script(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &turns, |b, turns| {
            b.iter(|| planner.plan(black_box(turns)))
        });
    }
    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    for turns in [2, 4] {
        let parts: Vec<SplitTurn> = script(turns)
            .into_iter()
            .map(|t| SplitTurn::new(t.id, t.text))
            .collect();
        // One minute of audio per batch
        let buffer = PcmAudio::new(vec![0u8; SAMPLE_RATE as usize * 60 * 2], SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::from_parameter(turns), &parts, |b, parts| {
            b.iter(|| split(black_box(&buffer), black_box(parts)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan, bench_split);
criterion_main!(benches);
