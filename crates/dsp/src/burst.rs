use num_complex::Complex32;
use std::collections::VecDeque;

const BURST_START_CAPACITY: usize = 2048;
const MAX_BURST_SAMPLES: usize = 1 << 16;
/// Power ratio over the tracked noise floor that opens a burst (20 dB)
const THRESHOLD_RATIO: f32 = 100.0;
const NOISE_ALPHA: f32 = 1e-3;
const NOISE_FLOOR_MIN: f32 = 1e-12;

/// A contiguous run of samples flagged as containing RF energy.
#[derive(Debug)]
pub struct Burst {
    /// Start offset in samples since the detector was created,
    /// including the pre-burst pad.
    pub start: u64,
    pub samples: Vec<Complex32>,
}

/// Per-channel burst detector. Stateful across `feed` calls: tracks a
/// noise-floor estimate while idle, keeps `pad` samples of pre-trigger
/// history, and closes a burst after `pad` consecutive samples back
/// under the threshold.
pub struct BurstDetector {
    pad: usize,
    noise_floor: f32,
    history: VecDeque<Complex32>,
    buf: Vec<Complex32>,
    start: u64,
    count: u64,
    capturing: bool,
    low_run: usize,
}

impl BurstDetector {
    pub fn new(pad: usize) -> Self {
        Self {
            pad: pad.max(1),
            noise_floor: 1e-9,
            history: VecDeque::new(),
            buf: Vec::new(),
            start: 0,
            count: 0,
            capturing: false,
            low_run: 0,
        }
    }

    /// Feed one block of decimated samples; returns the bursts that
    /// completed within it, in detection order.
    pub fn feed(&mut self, samples: &[Complex32]) -> Vec<Burst> {
        let mut out = Vec::new();

        for &s in samples {
            let p = s.norm_sqr();

            if self.capturing {
                self.buf.push(s);
                if p > self.noise_floor * THRESHOLD_RATIO {
                    self.low_run = 0;
                } else {
                    self.low_run += 1;
                }
                if self.low_run > self.pad || self.buf.len() >= MAX_BURST_SAMPLES {
                    out.push(Burst {
                        start: self.start,
                        samples: std::mem::take(&mut self.buf),
                    });
                    self.capturing = false;
                    self.low_run = 0;
                }
            } else if p > self.noise_floor * THRESHOLD_RATIO {
                // Open with the pad of pre-trigger context
                self.buf = Vec::with_capacity(BURST_START_CAPACITY);
                self.buf.extend(self.history.iter().copied());
                self.buf.push(s);
                self.start = self.count - self.history.len() as u64;
                self.history.clear();
                self.capturing = true;
                self.low_run = 0;
            } else {
                self.noise_floor = ((1.0 - NOISE_ALPHA) * self.noise_floor + NOISE_ALPHA * p)
                    .max(NOISE_FLOOR_MIN);
                self.history.push_back(s);
                if self.history.len() > self.pad {
                    self.history.pop_front();
                }
            }

            self.count += 1;
        }
        out
    }
}
