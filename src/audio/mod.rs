//! PCM buffers, WAV containers, and proportional splitting of dialogue audio.

pub mod splitter;
pub mod wav;

use crate::defaults::BYTES_PER_SAMPLE;

/// Sample layout of a raw PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 16-bit little-endian mono, the only layout the providers emit.
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }
}

/// Raw PCM16 mono audio as returned by a synthesis provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    /// Little-endian sample bytes.
    pub data: Vec<u8>,
    pub format: PcmFormat,
}

impl PcmAudio {
    pub fn new(data: Vec<u8>, sample_rate: u32) -> Self {
        Self {
            data,
            format: PcmFormat::mono16(sample_rate),
        }
    }

    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, sample_rate)
    }

    /// Whole samples in the buffer. A trailing partial sample is not counted.
    pub fn sample_count(&self) -> usize {
        self.data.len() / self.format.bytes_per_sample()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count() as f64 / self.format.sample_rate as f64
    }

    /// Decode samples in `[start, end)` (sample indices).
    pub fn samples_in(&self, start: usize, end: usize) -> Vec<i16> {
        let width = self.format.bytes_per_sample();
        let end = end.min(self.sample_count());
        if start >= end {
            return Vec::new();
        }
        self.data[start * width..end * width]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    pub fn samples(&self) -> Vec<i16> {
        self.samples_in(0, self.sample_count())
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }
}
