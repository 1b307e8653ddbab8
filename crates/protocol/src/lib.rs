pub mod crc;
pub mod decoder;
pub mod packet;
pub mod sync;
pub mod whitening;

/// BLE advertising access address
pub const BLE_ADV_AA: u32 = 0x8E89BED6;
/// BLE advertising CRC init value
pub const BLE_ADV_CRCI: u32 = 0x555555;

/// BLE channel number to RF channel index (frequency order, 0..40)
pub fn ble_to_rf_chan(chan: u32) -> u32 {
    match chan {
        37 => 0,
        38 => 12,
        39 => 39,
        c if c < 11 => c + 1,
        c => c + 2,
    }
}

/// RF channel index to BLE channel number
pub fn rf_to_ble_chan(rf: u32) -> u32 {
    match rf {
        0 => 37,
        12 => 38,
        39 => 39,
        c if c < 12 => c - 1,
        c => c - 2,
    }
}

/// Center frequency in Hz of a BLE channel
pub fn freq_from_chan(chan: u32) -> f64 {
    2402e6 + ble_to_rf_chan(chan) as f64 * 2e6
}

/// BLE channel number at a center frequency
pub fn chan_from_freq(freq: f64) -> u32 {
    rf_to_ble_chan(((freq - 2402e6) / 2e6) as u32)
}

/// BLE physical layer variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhyMode {
    Phy1M,
    Phy2M,
    PhyCodedS8,
    PhyCodedS2,
}

impl PhyMode {
    /// Symbol rate in symbols per second. Coded PHYs signal at 1 Msym/s;
    /// only 2M differs.
    pub fn symbol_rate(self) -> f64 {
        match self {
            PhyMode::Phy2M => 2e6,
            _ => 1e6,
        }
    }
}

/// Sniffing mode requested at session setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnifferMode {
    ConnFollow,
    PassiveScan,
    ActiveScan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_maps_are_inverse() {
        for chan in 0..40 {
            assert_eq!(rf_to_ble_chan(ble_to_rf_chan(chan)), chan);
        }
    }

    #[test]
    fn test_advertising_channel_frequencies() {
        assert_eq!(freq_from_chan(37), 2402e6);
        assert_eq!(freq_from_chan(38), 2426e6);
        assert_eq!(freq_from_chan(39), 2480e6);
        assert_eq!(freq_from_chan(0), 2404e6);
        assert_eq!(freq_from_chan(17), 2440e6);
    }

    #[test]
    fn test_chan_from_freq() {
        assert_eq!(chan_from_freq(2402e6), 37);
        assert_eq!(chan_from_freq(2426e6), 38);
        assert_eq!(chan_from_freq(2480e6), 39);
        assert_eq!(chan_from_freq(2440e6), 17);
    }

    #[test]
    fn test_symbol_rates() {
        assert_eq!(PhyMode::Phy1M.symbol_rate(), 1e6);
        assert_eq!(PhyMode::Phy2M.symbol_rate(), 2e6);
        assert_eq!(PhyMode::PhyCodedS8.symbol_rate(), 1e6);
        assert_eq!(PhyMode::PhyCodedS2.symbol_rate(), 1e6);
    }
}
