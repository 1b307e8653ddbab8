pub mod burst;
pub mod channelizer;
pub mod filter;
pub mod fsk;
pub mod window;

use num_complex::Complex32;

/// Mean burst power in dB relative to full scale.
pub fn calc_rssi(samples: &[Complex32]) -> f32 {
    if samples.is_empty() {
        return -127.0;
    }
    let mean: f32 =
        samples.iter().map(|s| s.norm_sqr()).sum::<f32>() / samples.len() as f32;
    10.0 * mean.max(1e-12).log10()
}
