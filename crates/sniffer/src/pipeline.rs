use bls_dsp::burst::Burst;
use bls_dsp::calc_rssi;
use bls_dsp::filter::resample;
use bls_dsp::fsk::fsk_decode;
use bls_protocol::crc::crc_ble_reverse;
use bls_protocol::decoder::DecodedPacket;
use bls_protocol::packet::RawPacket;
use bls_protocol::sync::{find_sync32, unpack_syms};
use bls_protocol::whitening::le_dewhiten;
use bls_protocol::PhyMode;

/// Everything one burst needs to become a packet: channel identity,
/// demodulation parameters, and the acceptance gates.
#[derive(Debug, Clone)]
pub struct BurstParams {
    pub chan: u32,
    pub phy: PhyMode,
    pub aa: u32,
    /// Bit-reversed CRC init value
    pub crci_rev: u32,
    /// Residual carrier offset to remove, Hz
    pub cfo: f64,
    /// Sample rate of the burst, Hz
    pub fs: f64,
    /// Front-end gain to subtract from measured power, dB
    pub gain_db: f64,
    pub rssi_min: i32,
    pub validate_crc: bool,
}

/// Demodulate one burst into at most one packet.
///
/// Gates in order: RSSI floor, access-address sync, minimum length,
/// CRC (when validation is on). Any failed gate drops the burst.
/// `t_start` anchors the burst's sample offset to capture time.
/// Rates below this get linearly interpolated up before demodulation
const RESAMPLE_TARGET_FS: f64 = 4e6;

pub fn process_burst(burst: &Burst, params: &BurstParams, t_start: f64) -> Option<RawPacket> {
    let rssi = (calc_rssi(&burst.samples) - params.gain_db as f32) as i32;
    if rssi < params.rssi_min {
        return None;
    }

    // channelizer bins run near 2 Msps, too coarse for the discriminator
    let symbol_rate = params.phy.symbol_rate();
    let (fs, samples) = resample(&burst.samples, params.fs, RESAMPLE_TARGET_FS);
    let (sample_offset, syms) = fsk_decode(&samples, fs, symbol_rate, params.cfo);
    let sync = find_sync32(&syms, params.aa)?;
    let data = unpack_syms(&syms, sync);
    if data.len() < 4 {
        return None;
    }

    // Strip the access address, dewhiten the rest
    let data_dw = le_dewhiten(&data[4..], params.chan);
    if data_dw.len() < 2 {
        return None;
    }
    let body_len = data_dw[1] as usize + 2;
    if data_dw.len() < body_len + 3 {
        return None;
    }
    let body = data_dw[..body_len].to_vec();

    let crc_rx = data_dw[body_len] as u32
        | (data_dw[body_len + 1] as u32) << 8
        | (data_dw[body_len + 2] as u32) << 16;
    let crc_err = crc_rx != crc_ble_reverse(params.crci_rev, &body);
    if params.validate_crc && crc_err {
        return None;
    }

    // time of the first access-address symbol, not of the burst itself
    let t_sync = t_start
        + burst.start as f64 / params.fs
        + sample_offset as f64 / fs
        + sync as f64 / symbol_rate;
    Some(RawPacket {
        ts32: RawPacket::ts32_from_secs(t_sync),
        len: body.len(),
        rssi,
        chan: params.chan,
        phy: params.phy,
        body,
        crc_rev: crc_rx,
        crc_err,
    })
}

/// Advertiser-address filter. Data-channel traffic always passes, and
/// so does an advertisement carrying no address at all; only a present
/// address that differs from the wanted one is dropped.
pub fn passes_mac_filter(msg: &DecodedPacket, filter: Option<&[u8; 6]>) -> bool {
    let want = match filter {
        Some(w) => w,
        None => return true,
    };
    match msg {
        DecodedPacket::Data(_) => true,
        DecodedPacket::Advert(m) => match &m.adv_addr {
            Some(addr) => addr == want,
            None => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls_protocol::crc::rbit24;
    use bls_protocol::decoder::{AdvPduType, AdvertMessage};
    use bls_protocol::{BLE_ADV_AA, BLE_ADV_CRCI};
    use num_complex::Complex32;
    use std::f64::consts::TAU;

    const FS: f64 = 4e6;
    const SPS: usize = 4;
    const F_DEV: f64 = 250e3;

    fn byte_bits(bytes: &[u8]) -> Vec<u8> {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for &b in bytes {
            for i in 0..8 {
                bits.push((b >> i) & 1);
            }
        }
        bits
    }

    /// Continuous-phase GFSK-ish modulator, one tone per bit
    fn modulate(bits: &[u8], amp: f32) -> Vec<Complex32> {
        let mut samples = Vec::with_capacity(bits.len() * SPS);
        let mut phase = 0.0f64;
        for &bit in bits {
            let freq = if bit == 1 { F_DEV } else { -F_DEV };
            for _ in 0..SPS {
                phase += TAU * freq / FS;
                samples.push(Complex32::new(
                    amp * phase.cos() as f32,
                    amp * phase.sin() as f32,
                ));
            }
        }
        samples
    }

    fn wire_bytes(body: &[u8], chan: u32) -> Vec<u8> {
        let crc = crc_ble_reverse(rbit24(BLE_ADV_CRCI), body);
        let mut clear = body.to_vec();
        clear.push((crc & 0xFF) as u8);
        clear.push((crc >> 8 & 0xFF) as u8);
        clear.push((crc >> 16 & 0xFF) as u8);

        let mut wire = vec![0xAA]; // preamble
        wire.extend_from_slice(&BLE_ADV_AA.to_le_bytes());
        wire.extend_from_slice(&le_dewhiten(&clear, chan)); // whitening is an involution
        wire
    }

    fn params() -> BurstParams {
        BurstParams {
            chan: 37,
            phy: PhyMode::Phy1M,
            aa: BLE_ADV_AA,
            crci_rev: rbit24(BLE_ADV_CRCI),
            cfo: 0.0,
            fs: FS,
            gain_db: 10.0,
            rssi_min: -128,
            validate_crc: true,
        }
    }

    fn adv_body() -> Vec<u8> {
        vec![0x00, 0x06, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]
    }

    #[test]
    fn test_burst_round_trip() {
        let body = adv_body();
        let burst = Burst {
            start: 400_000,
            samples: modulate(&byte_bits(&wire_bytes(&body, 37)), 1.0),
        };

        let pkt = process_burst(&burst, &params(), 0.0).expect("packet recovered");
        assert_eq!(pkt.body, body);
        assert_eq!(pkt.len, body.len());
        assert!(!pkt.crc_err);
        assert_eq!(pkt.chan, 37);
        assert_eq!(pkt.rssi, -10); // 0 dBFS minus 10 dB gain
        // 400000 samples at 4 Msps plus the 8-symbol preamble before sync
        assert_eq!(pkt.ts32, 100_008);
    }

    #[test]
    fn test_ts32_tracks_sync_position() {
        let wire = byte_bits(&wire_bytes(&adv_body(), 37));
        let early = Burst {
            start: 0,
            samples: modulate(&wire, 1.0),
        };
        // same burst start, but the frame begins 500 symbols later
        let mut delayed: Vec<u8> = (0..500).map(|i| (i & 1) as u8).collect();
        delayed.extend_from_slice(&wire);
        let late = Burst {
            start: 0,
            samples: modulate(&delayed, 1.0),
        };

        let a = process_burst(&early, &params(), 0.0).expect("early packet");
        let b = process_burst(&late, &params(), 0.0).expect("late packet");
        let delta = b.ts32 as i64 - a.ts32 as i64;
        assert!((498..=502).contains(&delta), "sync delay {} us", delta);
    }

    #[test]
    fn test_burst_deterministic() {
        let burst = Burst {
            start: 0,
            samples: modulate(&byte_bits(&wire_bytes(&adv_body(), 37)), 1.0),
        };
        let a = process_burst(&burst, &params(), 0.0);
        let b = process_burst(&burst, &params(), 0.0);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_cfo_correction() {
        let samples = modulate(&byte_bits(&wire_bytes(&adv_body(), 37)), 1.0);
        let offset_hz = 30e3;
        let shifted: Vec<Complex32> = samples
            .iter()
            .enumerate()
            .map(|(n, &s)| {
                let ph = TAU * offset_hz * n as f64 / FS;
                s * Complex32::new(ph.cos() as f32, ph.sin() as f32)
            })
            .collect();
        let burst = Burst { start: 0, samples: shifted };

        let mut p = params();
        p.cfo = offset_hz;
        let pkt = process_burst(&burst, &p, 0.0).expect("packet recovered after mixing");
        assert_eq!(pkt.body, adv_body());
    }

    #[test]
    fn test_crc_corruption() {
        let mut wire = wire_bytes(&adv_body(), 37);
        wire[7] ^= 0x10; // flip a bit inside the whitened body
        let burst = Burst {
            start: 0,
            samples: modulate(&byte_bits(&wire), 1.0),
        };

        assert!(process_burst(&burst, &params(), 0.0).is_none());

        let mut p = params();
        p.validate_crc = false;
        let pkt = process_burst(&burst, &p, 0.0).expect("bad-CRC packet kept");
        assert!(pkt.crc_err);
    }

    #[test]
    fn test_rssi_floor_is_inclusive() {
        let samples = modulate(&byte_bits(&wire_bytes(&adv_body(), 37)), 1.0);
        // same truncation the pipeline applies
        let rssi = (bls_dsp::calc_rssi(&samples) - 10.0) as i32;
        let burst = Burst { start: 0, samples };

        let mut p = params();
        p.rssi_min = rssi;
        assert!(process_burst(&burst, &p, 0.0).is_some());
        p.rssi_min = rssi + 1;
        assert!(process_burst(&burst, &p, 0.0).is_none());
    }

    #[test]
    fn test_no_sync_no_packet() {
        // Alternating bits never match the access address
        let bits: Vec<u8> = (0..600).map(|i| (i & 1) as u8).collect();
        let burst = Burst { start: 0, samples: modulate(&bits, 1.0) };
        assert!(process_burst(&burst, &params(), 0.0).is_none());
    }

    fn advert_with(addr: Option<[u8; 6]>) -> DecodedPacket {
        DecodedPacket::Advert(AdvertMessage {
            pkt: RawPacket {
                ts32: 0,
                len: 8,
                rssi: -40,
                chan: 37,
                phy: PhyMode::Phy1M,
                body: vec![0; 8],
                crc_rev: 0,
                crc_err: false,
            },
            pdu_type: AdvPduType::AdvInd,
            adv_addr: addr,
        })
    }

    #[test]
    fn test_mac_filter() {
        let addr = [1, 2, 3, 4, 5, 6];
        let other = [9, 9, 9, 9, 9, 9];

        assert!(passes_mac_filter(&advert_with(Some(addr)), None));
        assert!(passes_mac_filter(&advert_with(Some(addr)), Some(&addr)));
        assert!(!passes_mac_filter(&advert_with(Some(addr)), Some(&other)));
        // an advert with no address at all is not the filter's business
        assert!(passes_mac_filter(&advert_with(None), Some(&addr)));
    }
}
