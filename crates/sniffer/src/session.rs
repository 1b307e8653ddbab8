use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use bls_protocol::crc::rbit24;
use bls_protocol::{freq_from_chan, PhyMode, SnifferMode, BLE_ADV_AA, BLE_ADV_CRCI};
use bls_sdr::CaptureSource;

use crate::worker::{self, WorkerHandle};
use crate::SnifferEvent;

/// Wideband captures are tuned to the middle of the 2.4 GHz band
/// (channel 17, 2440 MHz) so the whole band fits symmetrically.
pub const WIDEBAND_CENTER_CHAN: u32 = 17;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("channel {0} out of range (0-39)")]
    ChannelOutOfRange(u32),
    #[error("channel {0} is not an advertising channel (37-39)")]
    InvalidAdvChannel(u32),
    #[error("MAC filter must be 6 bytes, got {0}")]
    BadMacLength(usize),
    #[error("IRK must be 16 bytes, got {0}")]
    BadIrkLength(usize),
    #[error("MAC and IRK target filters are mutually exclusive")]
    ConflictingTargetFilters,
    #[error("advertising channel hop requires a MAC or IRK target")]
    HopWithoutTarget,
    #[error("coded PHY capture requires extended advertising")]
    CodedPhyWithoutExtAdv,
}

/// Live-tunable capture parameters. Shared with the worker thread
/// behind a mutex; the worker snapshots it once per read chunk.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: SnifferMode,
    pub chan: u32,
    pub aa: u32,
    pub phy: PhyMode,
    /// Bit-reversed CRC init for the current access address
    pub crci_rev: u32,
    /// Front-end gain subtracted from measured power for RSSI, dB
    pub gain_db: f64,
    pub rssi_min: i32,
    pub mac_filter: Option<[u8; 6]>,
    pub validate_crc: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            mode: SnifferMode::ConnFollow,
            chan: 37,
            aa: BLE_ADV_AA,
            phy: PhyMode::Phy1M,
            crci_rev: rbit24(BLE_ADV_CRCI),
            gain_db: 10.0,
            rssi_min: -128,
            mac_filter: None,
            validate_crc: true,
        }
    }
}

/// One-shot session setup, validated as a whole before any of it is
/// applied.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub mode: SnifferMode,
    pub adv_chan: u32,
    pub rssi_min: i32,
    pub mac_filter: Option<Vec<u8>>,
    pub irk_filter: Option<Vec<u8>>,
    /// Hop 37/38/39 along with the advertiser
    pub hop3: bool,
    pub ext_adv: bool,
    pub coded_phy: bool,
    pub validate_crc: bool,
}

impl Default for SetupRequest {
    fn default() -> Self {
        SetupRequest {
            mode: SnifferMode::ConnFollow,
            adv_chan: 37,
            rssi_min: -128,
            mac_filter: None,
            irk_filter: None,
            hop3: false,
            ext_adv: false,
            coded_phy: false,
            validate_crc: true,
        }
    }
}

/// A sniffing session: owns the capture source when no worker is
/// running, and the event channel the worker reports into.
pub struct Sniffer {
    config: Arc<Mutex<SessionConfig>>,
    wideband: bool,
    source: Option<Box<dyn CaptureSource>>,
    worker: Option<WorkerHandle>,
    tx: Sender<SnifferEvent>,
    rx: Receiver<SnifferEvent>,
}

impl Sniffer {
    pub fn new(source: Box<dyn CaptureSource>, wideband: bool) -> Self {
        let (tx, rx) = channel::unbounded();
        Sniffer {
            config: Arc::new(Mutex::new(SessionConfig::default())),
            wideband,
            source: Some(source),
            worker: None,
            tx,
            rx,
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> SessionConfig {
        self.config.lock().unwrap().clone()
    }

    /// Validate a whole setup request, then commit it atomically. A
    /// failed request leaves the previous configuration untouched.
    pub fn setup_sniffer(&mut self, req: &SetupRequest) -> Result<(), ConfigError> {
        // a wideband capture watches the whole band from its fixed
        // center, so the primary-channel restriction only binds a
        // single-channel session
        if !self.wideband && !(37..=39).contains(&req.adv_chan) {
            return Err(ConfigError::InvalidAdvChannel(req.adv_chan));
        }
        let mac = match &req.mac_filter {
            Some(m) if m.len() != 6 => return Err(ConfigError::BadMacLength(m.len())),
            Some(m) => {
                let mut a = [0u8; 6];
                a.copy_from_slice(m);
                Some(a)
            }
            None => None,
        };
        if let Some(irk) = &req.irk_filter {
            if irk.len() != 16 {
                return Err(ConfigError::BadIrkLength(irk.len()));
            }
            if mac.is_some() {
                return Err(ConfigError::ConflictingTargetFilters);
            }
        }
        if req.hop3 && mac.is_none() && req.irk_filter.is_none() {
            return Err(ConfigError::HopWithoutTarget);
        }
        if req.coded_phy && !req.ext_adv {
            return Err(ConfigError::CodedPhyWithoutExtAdv);
        }

        let chan = if self.wideband {
            WIDEBAND_CENTER_CHAN
        } else {
            req.adv_chan
        };
        {
            let mut cfg = self.config.lock().unwrap();
            cfg.mode = req.mode;
            cfg.chan = chan;
            cfg.aa = BLE_ADV_AA;
            cfg.phy = if req.coded_phy {
                PhyMode::PhyCodedS8
            } else {
                PhyMode::Phy1M
            };
            cfg.crci_rev = rbit24(BLE_ADV_CRCI);
            cfg.rssi_min = req.rssi_min;
            cfg.mac_filter = mac;
            cfg.validate_crc = req.validate_crc;
        }

        if req.irk_filter.is_some() {
            log::info!("IRK target noted; address resolution is not applied to captures");
        }
        if req.hop3 {
            log::info!(
                "advertising hop requested; staying on channel {} as captured",
                chan
            );
        }
        if req.mode == SnifferMode::ActiveScan {
            log::warn!("receive-only capture cannot transmit scan requests");
        }

        self.retune_idle_source(chan);
        Ok(())
    }

    /// Point the demodulator at a channel, access address and PHY.
    /// Typically called when following a connection announced by a
    /// CONNECT_IND.
    pub fn set_chan_aa_phy(
        &mut self,
        chan: u32,
        aa: u32,
        phy: PhyMode,
        crc_init: u32,
    ) -> Result<(), ConfigError> {
        if chan > 39 {
            return Err(ConfigError::ChannelOutOfRange(chan));
        }
        {
            let mut cfg = self.config.lock().unwrap();
            cfg.chan = chan;
            cfg.aa = aa;
            cfg.phy = phy;
            cfg.crci_rev = rbit24(crc_init);
        }
        self.retune_idle_source(chan);
        Ok(())
    }

    pub fn set_rssi_min(&self, rssi_min: i32) {
        self.config.lock().unwrap().rssi_min = rssi_min;
    }

    pub fn set_mac_filter(&self, mac: Option<&[u8]>) -> Result<(), ConfigError> {
        let filter = match mac {
            Some(m) if m.len() != 6 => return Err(ConfigError::BadMacLength(m.len())),
            Some(m) => {
                let mut a = [0u8; 6];
                a.copy_from_slice(m);
                Some(a)
            }
            None => None,
        };
        self.config.lock().unwrap().mac_filter = filter;
        Ok(())
    }

    pub fn set_crc_validation(&self, validate: bool) {
        self.config.lock().unwrap().validate_crc = validate;
    }

    pub fn set_gain(&self, gain_db: f64) {
        self.config.lock().unwrap().gain_db = gain_db;
    }

    /// Retune a source the session still owns. A running worker
    /// retunes itself from the config snapshot instead.
    fn retune_idle_source(&mut self, chan: u32) {
        if self.wideband {
            return;
        }
        if let Some(src) = self.source.as_mut() {
            if let Err(e) = src.set_freq(freq_from_chan(chan)) {
                log::warn!("retune to channel {} failed: {}", chan, e);
            }
        }
    }

    /// Spawn the capture worker if one is not already running. A
    /// no-op when the source has been exhausted.
    pub fn ensure_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        if let Some(source) = self.source.take() {
            self.worker = Some(worker::spawn(
                source,
                Arc::clone(&self.config),
                self.wideband,
                self.tx.clone(),
            ));
        }
    }

    /// True while a worker has been spawned and not yet reaped by
    /// `cancel`. A worker that already drained its source still counts
    /// until it is joined, so its final events are not lost.
    pub fn worker_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Next event, blocking. Spawns the worker on first use.
    pub fn recv(&mut self) -> SnifferEvent {
        self.ensure_worker();
        // the session keeps a sender, so the channel cannot disconnect
        match self.rx.recv() {
            Ok(ev) => ev,
            Err(_) => SnifferEvent::EndOfStream,
        }
    }

    /// Next event with a wait budget. Returns None on timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<SnifferEvent> {
        self.ensure_worker();
        self.rx.recv_timeout(timeout).ok()
    }

    /// A second handle on the event stream, for consumers that drain
    /// it from their own thread.
    pub fn events(&self) -> Receiver<SnifferEvent> {
        self.rx.clone()
    }

    /// Stop the worker and reclaim the source if it is still usable.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.source = handle.cancel();
        }
    }
}

impl Drop for Sniffer {
    fn drop(&mut self) {
        self.cancel();
    }
}
