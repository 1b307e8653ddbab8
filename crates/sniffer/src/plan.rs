use bls_dsp::channelizer::chan_idx;
use bls_protocol::freq_from_chan;

pub const BLE_CHANNEL_SPACING: f64 = 2e6;

/// One channelizer output bin: which BLE RF channel it carries (if any)
/// and the residual carrier offset to remove before demodulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanEntry {
    pub chan: Option<u32>,
    pub cfo: f64,
}

/// Maps capture bandwidth onto BLE RF channels.
///
/// Wideband captures split into N = round(fs / 2 MHz) bins. N is almost
/// never an exact divisor of fs, so each bin's rate lands slightly off
/// 2 Msps and every channel k bins from center picks up a residual
/// offset of k times that error. The plan records the correction per bin.
#[derive(Debug, Clone)]
pub struct ChannelPlan {
    pub num_channels: usize,
    pub fs_decim: f64,
    pub entries: Vec<PlanEntry>,
}

impl ChannelPlan {
    /// Single-channel plan: the whole capture is one BLE channel,
    /// decimated by 8 downstream.
    pub fn single(fs: f64, chan: u32) -> Self {
        ChannelPlan {
            num_channels: 1,
            fs_decim: fs / 8.0,
            entries: vec![PlanEntry {
                chan: Some(chan),
                cfo: 0.0,
            }],
        }
    }

    /// Wideband plan for a capture centered on `center_chan`. Every BLE
    /// channel whose frequency falls inside the captured bandwidth gets
    /// an entry; bins carrying no BLE channel stay unmapped.
    pub fn wideband(fs: f64, center_chan: u32) -> Self {
        let n = (fs / BLE_CHANNEL_SPACING).round() as usize;
        let fs_decim = fs / n as f64;
        let chan_err = fs_decim - BLE_CHANNEL_SPACING;
        let center_freq = freq_from_chan(center_chan);

        let mut entries = vec![PlanEntry { chan: None, cfo: 0.0 }; n];
        for chan in 0..40u32 {
            let rel =
                ((freq_from_chan(chan) - center_freq) / BLE_CHANNEL_SPACING).round() as i32;
            // the two half-rate edge offsets alias into one bin, so
            // only strictly-interior channels are usable
            if rel.unsigned_abs() as usize * 2 >= n {
                continue;
            }
            entries[chan_idx(n, rel)] = PlanEntry {
                chan: Some(chan),
                cfo: -(rel as f64) * chan_err,
            };
        }

        log::debug!(
            "wideband plan: {} bins at {:.1} ksps, channel error {:.1} Hz",
            n,
            fs_decim / 1e3,
            chan_err
        );
        ChannelPlan {
            num_channels: n,
            fs_decim,
            entries,
        }
    }
}
