/// Reflect (bit-reverse) a 24-bit value
pub fn rbit24(mut v: u32) -> u32 {
    let mut result: u32 = 0;
    for _ in 0..24 {
        result = (result << 1) | (v & 1);
        v >>= 1;
    }
    result
}

/// BLE CRC-24 over `data`, computed in the reflected domain.
///
/// Polynomial: x^24 + x^10 + x^9 + x^6 + x^4 + x^3 + x + 1
/// (reflected form 0xDA6000 for the right-shifting register).
///
/// `init_rev` is the session CRC init value already bit-reversed with
/// [`rbit24`]; the result compares directly against the received CRC
/// bytes assembled little-endian.
pub fn crc_ble_reverse(init_rev: u32, data: &[u8]) -> u32 {
    let mut crc = init_rev & 0xFFFFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xDA6000;
            } else {
                crc >>= 1;
            }
        }
    }
    crc & 0xFFFFFF
}
