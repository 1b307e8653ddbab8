use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam::channel::Sender;
use num_complex::Complex32;

use bls_dsp::burst::BurstDetector;
use bls_dsp::channelizer::PolyphaseChannelizer;
use bls_dsp::filter::Decimator;
use bls_protocol::crc::rbit24;
use bls_protocol::decoder::{decode, DecoderState};
use bls_protocol::{freq_from_chan, PhyMode, SnifferMode, BLE_ADV_AA, BLE_ADV_CRCI};
use bls_sdr::{CaptureSource, ReadStatus};

use crate::pipeline::{passes_mac_filter, process_burst, BurstParams};
use crate::plan::ChannelPlan;
use crate::session::{SessionConfig, WIDEBAND_CENTER_CHAN};
use crate::SnifferEvent;

/// Samples requested per source read
const READ_CHUNK: usize = 1 << 20;
/// Pre/post-trigger pad for burst detection, seconds
const BURST_PAD_SECS: f64 = 8e-6;

/// Handle on a spawned capture worker. Dropping it without `cancel`
/// detaches the thread; `cancel` reaps it and recovers the source.
pub struct WorkerHandle {
    running: Arc<AtomicBool>,
    join: JoinHandle<Option<Box<dyn CaptureSource>>>,
}

impl WorkerHandle {
    /// Ask the worker to stop and wait for it. Returns the capture
    /// source unless the worker already drained it to end of stream.
    pub fn cancel(self) -> Option<Box<dyn CaptureSource>> {
        self.running.store(false, Ordering::SeqCst);
        match self.join.join() {
            Ok(source) => source,
            Err(_) => {
                log::error!("capture worker panicked");
                None
            }
        }
    }
}

/// Start a capture worker that reads the source, demodulates bursts
/// and reports events on `tx` until cancelled or out of samples. The
/// final event on `tx` is always `EndOfStream`.
pub fn spawn(
    source: Box<dyn CaptureSource>,
    config: Arc<Mutex<SessionConfig>>,
    wideband: bool,
    tx: Sender<SnifferEvent>,
) -> WorkerHandle {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let join = thread::spawn(move || run(source, config, wideband, tx, flag));
    WorkerHandle { running, join }
}

fn run(
    mut source: Box<dyn CaptureSource>,
    config: Arc<Mutex<SessionConfig>>,
    wideband: bool,
    tx: Sender<SnifferEvent>,
    running: Arc<AtomicBool>,
) -> Option<Box<dyn CaptureSource>> {
    let fs = source.sample_rate();
    let t_start = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let mut decoder = DecoderState::new();
    let mut frontend = if wideband {
        Frontend::wide(fs)
    } else {
        Frontend::single(fs, config.lock().unwrap().chan)
    };
    let mut buf: Vec<Complex32> = Vec::new();
    let mut exhausted = false;

    log::info!(
        "capture worker started: {:.2} Msps, {}",
        fs / 1e6,
        if wideband { "wideband" } else { "single channel" }
    );

    while running.load(Ordering::SeqCst) {
        match source.read(&mut buf, READ_CHUNK) {
            ReadStatus::Samples(_) => {}
            ReadStatus::Timeout => {
                // a stalled source is unrecoverable from here; hand it
                // back to the session and go idle
                log::error!("capture read timed out");
                break;
            }
            ReadStatus::EndOfStream => {
                exhausted = true;
                break;
            }
        }

        let cfg = config.lock().unwrap().clone();
        let stale_chan = matches!(&frontend, Frontend::Single { chan, .. } if *chan != cfg.chan);
        if stale_chan {
            if let Err(e) = source.set_freq(freq_from_chan(cfg.chan)) {
                log::warn!("retune to channel {} failed: {}", cfg.chan, e);
            }
            frontend = Frontend::single(fs, cfg.chan);
        }

        if !frontend.feed(&buf, &cfg, t_start, &mut decoder, &tx) {
            // consumer went away
            break;
        }
    }

    let _ = tx.send(SnifferEvent::EndOfStream);
    if exhausted {
        log::info!("capture source exhausted");
        source.close();
        None
    } else {
        Some(source)
    }
}

/// Samples-to-bursts stage: one decimator per configured channel, or a
/// channelizer fanning the band out to per-bin detectors.
enum Frontend {
    Single {
        chan: u32,
        decim: Decimator,
        detector: BurstDetector,
        fs_decim: f64,
    },
    Wide {
        plan: ChannelPlan,
        channelizer: PolyphaseChannelizer,
        detectors: Vec<BurstDetector>,
        leftover: Vec<Complex32>,
    },
}

fn burst_pad(fs_decim: f64) -> usize {
    (fs_decim * BURST_PAD_SECS).round() as usize
}

impl Frontend {
    fn single(fs: f64, chan: u32) -> Self {
        let decim = Decimator::new(fs);
        let fs_decim = fs / decim.ratio() as f64;
        Frontend::Single {
            chan,
            decim,
            detector: BurstDetector::new(burst_pad(fs_decim)),
            fs_decim,
        }
    }

    fn wide(fs: f64) -> Self {
        let plan = ChannelPlan::wideband(fs, WIDEBAND_CENTER_CHAN);
        let pad = burst_pad(plan.fs_decim);
        let detectors = (0..plan.num_channels)
            .map(|_| BurstDetector::new(pad))
            .collect();
        Frontend::Wide {
            channelizer: PolyphaseChannelizer::new(plan.num_channels),
            plan,
            detectors,
            leftover: Vec::new(),
        }
    }

    /// Run one chunk through the frontend, reporting packets on `tx`.
    /// Returns false once the event channel is disconnected.
    fn feed(
        &mut self,
        samples: &[Complex32],
        cfg: &SessionConfig,
        t_start: f64,
        decoder: &mut DecoderState,
        tx: &Sender<SnifferEvent>,
    ) -> bool {
        match self {
            Frontend::Single {
                chan,
                decim,
                detector,
                fs_decim,
            } => {
                let narrow = decim.process(samples);
                let params = BurstParams {
                    chan: *chan,
                    phy: cfg.phy,
                    aa: cfg.aa,
                    crci_rev: cfg.crci_rev,
                    cfo: 0.0,
                    fs: *fs_decim,
                    gain_db: cfg.gain_db,
                    rssi_min: cfg.rssi_min,
                    validate_crc: cfg.validate_crc,
                };
                for burst in detector.feed(&narrow) {
                    if let Some(raw) = process_burst(&burst, &params, t_start) {
                        if !report(raw, cfg, decoder, tx) {
                            return false;
                        }
                    }
                }
                true
            }
            Frontend::Wide {
                plan,
                channelizer,
                detectors,
                leftover,
            } => {
                leftover.extend_from_slice(samples);
                let n = plan.num_channels;
                let whole = leftover.len() - leftover.len() % n;
                let bins = channelizer.process(&leftover[..whole]);
                leftover.drain(..whole);

                for (idx, entry) in plan.entries.iter().enumerate() {
                    let chan = match entry.chan {
                        Some(c) => c,
                        None => continue,
                    };
                    // advertising bins are always watched; a data bin
                    // only once a connection points the session at it
                    let params = if chan >= 37 {
                        BurstParams {
                            chan,
                            phy: PhyMode::Phy1M,
                            aa: BLE_ADV_AA,
                            crci_rev: rbit24(BLE_ADV_CRCI),
                            cfo: entry.cfo,
                            fs: plan.fs_decim,
                            gain_db: cfg.gain_db,
                            rssi_min: cfg.rssi_min,
                            validate_crc: cfg.validate_crc,
                        }
                    } else if cfg.mode == SnifferMode::ConnFollow && chan == cfg.chan {
                        BurstParams {
                            chan,
                            phy: cfg.phy,
                            aa: cfg.aa,
                            crci_rev: cfg.crci_rev,
                            cfo: entry.cfo,
                            fs: plan.fs_decim,
                            gain_db: cfg.gain_db,
                            rssi_min: cfg.rssi_min,
                            validate_crc: cfg.validate_crc,
                        }
                    } else {
                        continue;
                    };

                    for burst in detectors[idx].feed(&bins[idx]) {
                        if let Some(raw) = process_burst(&burst, &params, t_start) {
                            if !report(raw, cfg, decoder, tx) {
                                return false;
                            }
                        }
                    }
                }
                true
            }
        }
    }
}

/// Decode a recovered packet and push the right event. Returns false
/// when the event channel is disconnected.
fn report(
    raw: bls_protocol::packet::RawPacket,
    cfg: &SessionConfig,
    decoder: &mut DecoderState,
    tx: &Sender<SnifferEvent>,
) -> bool {
    match decode(&raw, decoder) {
        Ok(msg) => {
            if passes_mac_filter(&msg, cfg.mac_filter.as_ref()) {
                tx.send(SnifferEvent::Packet(msg)).is_ok()
            } else {
                true
            }
        }
        Err(e) => {
            log::debug!("packet on channel {} not decodable: {}", raw.chan, e);
            tx.send(SnifferEvent::Raw(raw, e)).is_ok()
        }
    }
}
