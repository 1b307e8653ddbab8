use crate::PhyMode;

/// A validated link-layer packet recovered from one burst.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    /// Microsecond timestamp truncated to 30 bits. Wraps roughly every
    /// 1073 seconds; consumers needing absolute time must unwrap it.
    pub ts32: u32,
    /// Body length (header + payload)
    pub len: usize,
    /// Received signal strength in dBm
    pub rssi: i32,
    /// BLE channel number (0-39)
    pub chan: u32,
    pub phy: PhyMode,
    /// De-whitened header + payload bytes
    pub body: Vec<u8>,
    /// Received CRC assembled little-endian (bit-reversed domain)
    pub crc_rev: u32,
    /// True when the received CRC did not match the computed one
    pub crc_err: bool,
}

impl RawPacket {
    /// Truncate an absolute time in seconds to the 30-bit microsecond
    /// timestamp carried on the wire format.
    pub fn ts32_from_secs(t: f64) -> u32 {
        ((t * 1e6) as u64 & 0x3FFF_FFFF) as u32
    }
}
