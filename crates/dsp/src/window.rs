use std::f64::consts::PI;

/// Modified Bessel function of the first kind, order 0 (for Kaiser window)
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_sq_over_4 = x * x / 4.0;
    for k in 1..=30 {
        term *= x_sq_over_4 / (k * k) as f64;
        sum += term;
        if term < sum * 1e-12 {
            break;
        }
    }
    sum
}

/// Kaiser beta from stopband attenuation in dB
fn kaiser_beta(as_db: f64) -> f64 {
    if as_db > 50.0 {
        0.1102 * (as_db - 8.7)
    } else if as_db > 21.0 {
        0.5842 * (as_db - 21.0).powf(0.4) + 0.07886 * (as_db - 21.0)
    } else {
        0.0
    }
}

/// Generate Kaiser window coefficients
///
/// - `n`: window length
/// - `beta`: shape parameter (higher = narrower mainlobe, lower sidelobes)
pub fn kaiser(n: usize, beta: f64) -> Vec<f64> {
    let mut w = Vec::with_capacity(n);
    let n_f = n as f64;
    let denom = bessel_i0(beta);

    for i in 0..n {
        let x = 2.0 * i as f64 / (n_f - 1.0) - 1.0;
        let arg = beta * (1.0 - x * x).max(0.0).sqrt();
        w.push(bessel_i0(arg) / denom);
    }
    w
}

/// Kaiser-windowed sinc lowpass.
///
/// - `h_len`: filter length (odd for a symmetric linear-phase filter)
/// - `fc`: cutoff as a fraction of the sample rate
/// - `as_db`: stopband attenuation
///
/// Coefficients are normalized to unity DC gain.
pub fn lowpass(h_len: usize, fc: f64, as_db: f64) -> Vec<f32> {
    let beta = kaiser_beta(as_db);
    let win = kaiser(h_len, beta);
    let half = (h_len as f64 - 1.0) / 2.0;
    let mut h = Vec::with_capacity(h_len);

    for n in 0..h_len {
        let t = n as f64 - half;
        let sinc_val = if t.abs() < 1e-12 {
            1.0
        } else {
            let x = 2.0 * fc * t;
            (PI * x).sin() / (PI * x)
        };
        h.push(sinc_val * win[n]);
    }

    let sum: f64 = h.iter().sum();
    h.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Prototype lowpass for the polyphase channelizer.
///
/// Kaiser lowpass of length `2 * num_channels * semi_len` with cutoff
/// 0.75 / num_channels and 60 dB stopband attenuation, scaled so each
/// polyphase branch has roughly unity DC gain.
pub fn pfb_prototype(num_channels: usize, semi_len: usize) -> Vec<f32> {
    let mut h = lowpass(2 * num_channels * semi_len + 1, 0.75 / num_channels as f64, 60.0);
    // Drop the trailing tap so the length divides evenly into branches
    h.pop();
    h.iter_mut().for_each(|v| *v *= num_channels as f32);
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kaiser_window() {
        let w = kaiser(64, 7.0);
        assert_eq!(w.len(), 64);
        // Should be symmetric
        for i in 0..32 {
            assert!(
                (w[i] - w[63 - i]).abs() < 1e-10,
                "asymmetry at index {}: {} != {}",
                i,
                w[i],
                w[63 - i]
            );
        }
        // Peak at center
        assert!(w[31] > 0.99);
        // Edges should be small
        assert!(w[0] < 0.1);
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        let h = lowpass(65, 0.2, 60.0);
        assert_eq!(h.len(), 65);
        let sum: f32 = h.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "DC gain = {}", sum);
        // Symmetric (linear phase)
        for i in 0..32 {
            assert!((h[i] - h[64 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pfb_prototype_branch_gain() {
        let m = 16;
        let semi_len = 4;
        let h = pfb_prototype(m, semi_len);
        assert_eq!(h.len(), 2 * m * semi_len);
        // Each branch (taps k, k+M, k+2M, ...) should sum to roughly 1
        for k in 0..m {
            let branch_sum: f32 = h.iter().skip(k).step_by(m).sum();
            assert!(
                (branch_sum - 1.0).abs() < 0.05,
                "branch {} gain = {}",
                k,
                branch_sum
            );
        }
    }
}
