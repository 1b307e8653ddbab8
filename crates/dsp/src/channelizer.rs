use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::window;

/// FFT bin index for a channel at relative offset `rel` from the capture
/// center, in units of the channel spacing (fs / num_channels).
///
/// The analysis bank loads block sample k into branch k and runs an
/// inverse FFT across the branch outputs, so a tone at +rel lands in
/// bin (-rel) mod N.
pub fn chan_idx(num_channels: usize, rel: i32) -> usize {
    (-rel).rem_euclid(num_channels as i32) as usize
}

/// Polyphase Filter Bank Channelizer (analysis, type 2)
///
/// Takes wideband input at rate N*fs_chan and produces N narrowband
/// channels each at rate fs_chan, using a polyphase decomposition of a
/// Kaiser prototype lowpass followed by an N-point inverse FFT.
pub struct PolyphaseChannelizer {
    num_channels: usize,
    taps_per_channel: usize,
    /// Filter coefficients: [num_channels][taps_per_channel]
    coeffs: Vec<Vec<f32>>,
    /// Delay line: [num_channels][taps_per_channel], circular
    delay: Vec<Vec<Complex32>>,
    /// Current write position in delay line
    delay_pos: usize,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl PolyphaseChannelizer {
    pub fn new(num_channels: usize) -> Self {
        let prototype = window::pfb_prototype(num_channels, 4);
        let taps_per_channel = prototype.len() / num_channels;

        // Decompose prototype into polyphase branches:
        // branch k gets taps at indices k, k+N, k+2N, ...
        let mut coeffs = vec![vec![0f32; taps_per_channel]; num_channels];
        for k in 0..num_channels {
            for t in 0..taps_per_channel {
                coeffs[k][t] = prototype[k + t * num_channels];
            }
        }

        let delay = vec![vec![Complex32::new(0.0, 0.0); taps_per_channel]; num_channels];

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_inverse(num_channels);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        log::debug!(
            "channelizer: {} channels, {} taps per branch",
            num_channels,
            taps_per_channel
        );

        Self {
            num_channels,
            taps_per_channel,
            coeffs,
            delay,
            delay_pos: 0,
            fft,
            scratch,
        }
    }

    /// Bin index for a relative channel offset (see [`chan_idx`]).
    pub fn bin_for_offset(&self, rel: i32) -> usize {
        chan_idx(self.num_channels, rel)
    }

    /// Split one wideband buffer into N per-channel decimated buffers.
    /// Trailing samples that do not fill a whole block are dropped.
    pub fn process(&mut self, samples: &[Complex32]) -> Vec<Vec<Complex32>> {
        let n = self.num_channels;
        let blocks = samples.len() / n;
        let mut out = vec![Vec::with_capacity(blocks); n];
        let mut bins = vec![Complex32::new(0.0, 0.0); n];

        // rustfft leaves the inverse unnormalized; 1/N restores unity gain
        let scale = 1.0 / n as f32;
        for b in 0..blocks {
            self.push_block(&samples[b * n..(b + 1) * n]);
            self.filter_into(&mut bins);
            self.fft.process_with_scratch(&mut bins, &mut self.scratch);
            for (k, &v) in bins.iter().enumerate() {
                out[k].push(v * scale);
            }
        }
        out
    }

    /// Push N new samples into the branch delay lines.
    fn push_block(&mut self, block: &[Complex32]) {
        let pos = self.delay_pos;
        for k in 0..self.num_channels {
            self.delay[k][pos] = block[k];
        }
        self.delay_pos = (self.delay_pos + 1) % self.taps_per_channel;
    }

    /// Per-branch dot product across the delay line, newest sample first.
    fn filter_into(&self, out: &mut [Complex32]) {
        let t = self.taps_per_channel;
        for k in 0..self.num_channels {
            let mut sum = Complex32::new(0.0, 0.0);
            for tap in 0..t {
                let delay_idx = (self.delay_pos + t - 1 - tap) % t;
                sum += self.delay[k][delay_idx] * self.coeffs[k][tap];
            }
            out[k] = sum;
        }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn taps_per_channel(&self) -> usize {
        self.taps_per_channel
    }
}
