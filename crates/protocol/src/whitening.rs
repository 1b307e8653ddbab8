// Pre-computed 127-bit whitening sequence (7-bit maximal-length LFSR, period 127)
// All 40 BLE channels use the same sequence at different offsets
static WHITENING: [u8; 127] = [
    1, 1, 1, 1, 0, 1, 0, 1, 0, 1, 0, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 1, 0, 0,
    1, 1, 1, 0, 0, 1, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0, 1, 1, 0, 1, 1,
    0, 1, 0, 1, 1, 1, 0, 1, 0, 0, 0, 1, 1, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0,
    0, 1, 0, 0, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1, 1, 1, 1, 0, 1, 1, 1, 0, 0, 0, 0,
    1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 1, 1, 1, 0, 1, 1, 0, 0, 0, 1, 0, 1, 0, 0, 1,
    0, 1,
];

// Per-channel starting offset into the whitening sequence
static WHITENING_INDEX: [u8; 40] = [
    70, 62, 120, 111, 77, 46, 15, 101, 66, 39, 31, 26, 80, 83, 125, 89, 10, 35,
    8, 54, 122, 17, 33, 0, 58, 115, 6, 94, 86, 49, 52, 20, 40, 27, 84, 90, 63,
    112, 47, 102,
];

/// Whitening bit for a channel at a bit position counted from the start
/// of the PDU (first bit after the access address).
#[inline]
pub fn whitening_bit(channel: u32, bit_position: u32) -> u8 {
    WHITENING[((WHITENING_INDEX[channel as usize] as u32 + bit_position) % 127) as usize]
}

/// De-whiten a PDU byte sequence for the given BLE channel. Whitening is
/// a self-inverse XOR stream, so the same call also whitens.
pub fn le_dewhiten(data: &[u8], channel: u32) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, &byte)| {
            let mut out = 0u8;
            for j in 0..8u32 {
                let bit = (byte >> j) & 1;
                out |= (bit ^ whitening_bit(channel, i as u32 * 8 + j)) << j;
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitening_bit_range() {
        // All values should be 0 or 1
        for ch in 0..40 {
            for bit in 0..256 {
                let wb = whitening_bit(ch, bit);
                assert!(wb <= 1, "whitening_bit({}, {}) = {}", ch, bit, wb);
            }
        }
    }

    #[test]
    fn test_dewhiten_is_involution() {
        let data: Vec<u8> = (0..64).map(|i| (i * 37 + 11) as u8).collect();
        for ch in [0, 17, 37, 38, 39] {
            let once = le_dewhiten(&data, ch);
            assert_ne!(once, data, "whitening on channel {} was a no-op", ch);
            let twice = le_dewhiten(&once, ch);
            assert_eq!(twice, data, "dewhitening not self-inverse on channel {}", ch);
        }
    }

    #[test]
    fn test_channels_whiten_differently() {
        let data = vec![0u8; 16];
        assert_ne!(le_dewhiten(&data, 37), le_dewhiten(&data, 38));
    }
}
