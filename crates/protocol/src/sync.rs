/// Locate a 32-bit access address in a soft symbol sequence.
///
/// Symbols are sliced by sign (positive = one) and matched LSB-first,
/// the transmit order of the access address. Returns the symbol offset
/// of the first access-address bit, or None if the word never appears.
pub fn find_sync32(syms: &[f32], aa: u32) -> Option<usize> {
    if syms.len() < 32 {
        return None;
    }
    let mut word: u32 = 0;
    for (i, &s) in syms.iter().enumerate() {
        let bit = (s > 0.0) as u32;
        word = (word >> 1) | (bit << 31);
        if i >= 31 && word == aa {
            return Some(i - 31);
        }
    }
    None
}

/// Pack soft symbols into bytes starting at `offset`, LSB first within
/// each byte. Trailing symbols that do not fill a byte are dropped.
pub fn unpack_syms(syms: &[f32], offset: usize) -> Vec<u8> {
    let n = syms.len().saturating_sub(offset) / 8;
    let mut out = Vec::with_capacity(n);
    for b in 0..n {
        let mut byte = 0u8;
        for j in 0..8 {
            if syms[offset + b * 8 + j] > 0.0 {
                byte |= 1 << j;
            }
        }
        out.push(byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLE_ADV_AA;

    fn bits_to_syms(bits: &[u8]) -> Vec<f32> {
        bits.iter().map(|&b| if b == 1 { 1.0 } else { -1.0 }).collect()
    }

    fn word_bits(word: u32) -> Vec<u8> {
        (0..32).map(|i| ((word >> i) & 1) as u8).collect()
    }

    #[test]
    fn test_find_sync32_at_offset() {
        let mut bits = vec![0u8, 1, 0, 1, 0, 1, 0]; // 7 bits of preamble junk
        bits.extend(word_bits(BLE_ADV_AA));
        bits.extend([1, 0, 0, 1]);
        let syms = bits_to_syms(&bits);
        assert_eq!(find_sync32(&syms, BLE_ADV_AA), Some(7));
    }

    #[test]
    fn test_find_sync32_absent() {
        let bits = vec![0u8; 64];
        let syms = bits_to_syms(&bits);
        assert_eq!(find_sync32(&syms, BLE_ADV_AA), None);
    }

    #[test]
    fn test_find_sync32_too_short() {
        let syms = bits_to_syms(&word_bits(BLE_ADV_AA)[..20]);
        assert_eq!(find_sync32(&syms, BLE_ADV_AA), None);
    }

    #[test]
    fn test_unpack_syms_roundtrip() {
        let bytes = [0xD6u8, 0xBE, 0x89, 0x8E, 0x42];
        let mut bits = vec![1u8, 1, 0]; // leading junk
        for &byte in &bytes {
            for j in 0..8 {
                bits.push((byte >> j) & 1);
            }
        }
        bits.push(1); // trailing partial byte, dropped
        let syms = bits_to_syms(&bits);
        assert_eq!(unpack_syms(&syms, 3), bytes);
    }
}
