use num_complex::Complex32;

use crate::window;

const FIR_LEN: usize = 65;
const CUTOFF_HZ: f64 = 1.6e6;

/// Streaming /8 decimator for single-channel capture: a coarse stride-4
/// pre-decimation followed by a FIR lowpass decimate-by-2. Filter state
/// (tap history and decimation phase) is carried across calls so block
/// boundaries are seamless.
pub struct Decimator {
    init_decim: usize,
    filt_decim: usize,
    taps: Vec<f32>,
    /// Last taps-1 strided samples from the previous call
    hist: Vec<Complex32>,
    /// Strided samples consumed so far, for decimation phase continuity
    count: u64,
}

impl Decimator {
    /// `fs` is the raw capture rate; output rate is fs / 8.
    pub fn new(fs: f64) -> Self {
        let init_decim = 4;
        let filt_decim = 2;
        // Cutoff normalized to the post-stride rate fs/4
        let fc = CUTOFF_HZ * init_decim as f64 / fs;
        let taps = window::lowpass(FIR_LEN, fc, 60.0);
        Self {
            init_decim,
            filt_decim,
            hist: vec![Complex32::new(0.0, 0.0); taps.len() - 1],
            taps,
            count: 0,
        }
    }

    pub fn ratio(&self) -> usize {
        self.init_decim * self.filt_decim
    }

    /// Decimate one buffer. Output length is roughly samples.len() / 8.
    pub fn process(&mut self, samples: &[Complex32]) -> Vec<Complex32> {
        let strided: Vec<Complex32> = samples
            .iter()
            .step_by(self.init_decim)
            .copied()
            .collect();

        let t = self.taps.len();
        let mut buf = std::mem::take(&mut self.hist);
        let hist_len = buf.len();
        buf.extend_from_slice(&strided);

        let mut out = Vec::with_capacity(strided.len() / self.filt_decim + 1);
        for k in 0..strided.len() {
            if (self.count + k as u64) % self.filt_decim as u64 != 0 {
                continue;
            }
            let mut acc = Complex32::new(0.0, 0.0);
            for (j, &tap) in self.taps.iter().enumerate() {
                acc += buf[hist_len + k - j] * tap;
            }
            out.push(acc);
        }

        self.count += strided.len() as u64;
        let keep = buf.len().saturating_sub(t - 1);
        self.hist = buf.split_off(keep);
        out
    }
}

/// Resample a burst up to `fs_target` by linear interpolation. Bursts
/// already at or above the target rate pass through untouched. Returns
/// the effective rate alongside the samples.
pub fn resample(samples: &[Complex32], fs: f64, fs_target: f64) -> (f64, Vec<Complex32>) {
    if fs >= fs_target || samples.is_empty() {
        return (fs, samples.to_vec());
    }

    let step = fs / fs_target;
    let n_out = (samples.len() as f64 * fs_target / fs) as usize;
    let mut out = Vec::with_capacity(n_out);
    for n in 0..n_out {
        let pos = n as f64 * step;
        let i = pos as usize;
        let frac = (pos - i as f64) as f32;
        if i + 1 < samples.len() {
            out.push(samples[i] * (1.0 - frac) + samples[i + 1] * frac);
        } else if i < samples.len() {
            out.push(samples[i]);
        } else {
            break;
        }
    }
    (fs_target, out)
}
