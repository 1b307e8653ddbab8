use num_complex::Complex32;
use std::f64::consts::TAU;

/// FSK demodulation of one burst into soft symbols.
///
/// Mixes out the residual carrier offset `cfo` (Hz), runs an FM frequency
/// discriminator `arg(y[n] * conj(y[n-1]))`, then picks the sampling phase
/// with the strongest mean deviation and slices one soft symbol per
/// symbol period. Positive symbol values are ones.
///
/// Returns the chosen sample offset into the burst and the soft symbols.
/// Deterministic for identical inputs.
pub fn fsk_decode(
    burst: &[Complex32],
    fs: f64,
    symbol_rate: f64,
    cfo: f64,
) -> (usize, Vec<f32>) {
    let sps = (fs / symbol_rate).round().max(1.0) as usize;
    if burst.len() < sps * 2 {
        return (0, Vec::new());
    }

    // Mix down by the residual offset, then discriminate
    let demod = if cfo != 0.0 {
        let mixed: Vec<Complex32> = burst
            .iter()
            .enumerate()
            .map(|(n, &s)| {
                let phase = -TAU * cfo * n as f64 / fs;
                s * Complex32::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();
        freq_discriminate(&mixed)
    } else {
        freq_discriminate(burst)
    };

    // Best sampling phase: strongest mean |deviation|
    let mut best_offset = 0;
    let mut best_score = -1.0f32;
    for phase in 0..sps {
        let mut sum = 0.0f32;
        let mut count = 0u32;
        let mut i = phase;
        while i < demod.len() {
            sum += demod[i].abs();
            count += 1;
            i += sps;
        }
        if count > 0 {
            let score = sum / count as f32;
            if score > best_score {
                best_score = score;
                best_offset = phase;
            }
        }
    }

    let mut syms = Vec::with_capacity(demod.len() / sps + 1);
    let mut i = best_offset;
    while i < demod.len() {
        syms.push(demod[i]);
        i += sps;
    }

    (best_offset, syms)
}

/// FM frequency discriminator: arg(y[n] * conj(y[n-1])) / pi.
/// The first output is zero (no previous sample).
fn freq_discriminate(burst: &[Complex32]) -> Vec<f32> {
    const KF_NORM: f32 = std::f32::consts::FRAC_1_PI;
    let mut prev = Complex32::new(0.0, 0.0);
    let mut demod = Vec::with_capacity(burst.len());
    for &sample in burst {
        let product = sample * prev.conj();
        demod.push(product.arg() * KF_NORM);
        prev = sample;
    }
    demod
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-level FSK modulator: +deviation for a one bit, -deviation for
    /// a zero, `sps` samples per bit, continuous phase.
    fn fsk_modulate(bits: &[u8], sps: usize, deviation: f64, fs: f64) -> Vec<Complex32> {
        let mut phase = 0.0f64;
        let mut out = Vec::with_capacity(bits.len() * sps);
        for &bit in bits {
            let f = if bit == 1 { deviation } else { -deviation };
            for _ in 0..sps {
                phase += TAU * f / fs;
                out.push(Complex32::new(phase.cos() as f32, phase.sin() as f32));
            }
        }
        out
    }

    #[test]
    fn test_discriminator_constant_tone() {
        let fs = 4e6;
        let burst = fsk_modulate(&[1; 64], 4, 250e3, fs);
        let demod = freq_discriminate(&burst);
        // 250 kHz at 4 Msps: phase step = 2*pi*250e3/4e6, normalized by pi
        let expected = 2.0 * 250e3 / 4e6;
        for &val in &demod[1..] {
            assert!((val - expected as f32).abs() < 0.01, "got {}", val);
        }
    }

    #[test]
    fn test_fsk_decode_recovers_bits() {
        let fs = 4e6;
        let bits: Vec<u8> = (0..96).map(|i| ((i * 7 + 3) % 5 == 0) as u8).collect();
        let burst = fsk_modulate(&bits, 4, 250e3, fs);
        let (_, syms) = fsk_decode(&burst, fs, 1e6, 0.0);
        assert!(syms.len() >= bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            let got = (syms[i] > 0.0) as u8;
            assert_eq!(got, bit, "symbol {} mismatch", i);
        }
    }

    #[test]
    fn test_fsk_decode_with_cfo_correction() {
        let fs = 4e6;
        let cfo = 30e3;
        let bits: Vec<u8> = (0..64).map(|i| (i % 3 == 0) as u8).collect();
        let mut burst = fsk_modulate(&bits, 4, 250e3, fs);
        // Shift the whole burst up by the offset
        for (n, s) in burst.iter_mut().enumerate() {
            let phase = TAU * cfo * n as f64 / fs;
            *s *= Complex32::new(phase.cos() as f32, phase.sin() as f32);
        }
        let (_, syms) = fsk_decode(&burst, fs, 1e6, cfo);
        for (i, &bit) in bits.iter().enumerate() {
            assert_eq!((syms[i] > 0.0) as u8, bit, "symbol {} mismatch", i);
        }
    }

    #[test]
    fn test_fsk_decode_short_burst() {
        let burst = vec![Complex32::new(1.0, 0.0); 3];
        let (offset, syms) = fsk_decode(&burst, 4e6, 1e6, 0.0);
        assert_eq!(offset, 0);
        assert!(syms.is_empty());
    }
}
