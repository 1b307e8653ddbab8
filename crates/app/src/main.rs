use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use bls_protocol::decoder::DecodedPacket;
use bls_protocol::SnifferMode;
use bls_sdr::FileSource;
use bls_sniffer::session::SetupRequest;
use bls_sniffer::{Sniffer, SnifferEvent};

/// Passive BLE sniffer for wideband SDR captures
#[derive(Parser, Debug)]
#[command(name = "blesniff", version, about)]
struct Cli {
    /// CF32 capture file to replay
    #[arg(short = 'f', long)]
    file: PathBuf,

    /// Capture sample rate in Hz
    #[arg(short = 'r', long, default_value_t = 122_880_000.0)]
    sample_rate: f64,

    /// Channelize the whole 2.4 GHz band instead of one channel
    #[arg(short = 'W', long)]
    wideband: bool,

    /// Advertising channel to sniff (37-39)
    #[arg(short = 'c', long, default_value_t = 37)]
    channel: u32,

    /// Drop packets below this RSSI (dBm)
    #[arg(long, default_value_t = -128)]
    rssi: i32,

    /// Only report the advertiser with this MAC (aa:bb:cc:dd:ee:ff)
    #[arg(short = 'm', long)]
    mac: Option<String>,

    /// Keep packets that fail the CRC check
    #[arg(long)]
    no_crc: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let source = FileSource::open(&cli.file, cli.sample_rate)?;
    let mut sniffer = Sniffer::new(Box::new(source), cli.wideband);

    let mac = cli.mac.as_deref().map(parse_mac).transpose()?;
    let req = SetupRequest {
        mode: SnifferMode::ConnFollow,
        adv_chan: cli.channel,
        rssi_min: cli.rssi,
        mac_filter: mac.map(|m| m.to_vec()),
        validate_crc: !cli.no_crc,
        ..Default::default()
    };
    sniffer.setup_sniffer(&req).map_err(|e| e.to_string())?;

    loop {
        match sniffer.recv_timeout(Duration::from_millis(500)) {
            Some(SnifferEvent::Packet(msg)) => print_packet(&msg),
            Some(SnifferEvent::Raw(raw, err)) => {
                println!(
                    "ts={:>10} ch={:>2} rssi={:>4} undecoded ({}): {}",
                    raw.ts32,
                    raw.chan,
                    raw.rssi,
                    err,
                    hex(&raw.body)
                );
            }
            Some(SnifferEvent::EndOfStream) => break,
            None => {
                if !sniffer.worker_running() {
                    break;
                }
            }
        }
    }
    sniffer.cancel();
    Ok(())
}

fn print_packet(msg: &DecodedPacket) {
    match msg {
        DecodedPacket::Advert(m) => {
            let addr = m
                .adv_addr
                .map(|a| fmt_mac(&a))
                .unwrap_or_else(|| "--".into());
            println!(
                "ts={:>10} ch={:>2} rssi={:>4} {:?} adv={} len={} {}",
                m.pkt.ts32,
                m.pkt.chan,
                m.pkt.rssi,
                m.pdu_type,
                addr,
                m.pkt.len,
                hex(&m.pkt.body)
            );
        }
        DecodedPacket::Data(m) => {
            println!(
                "ts={:>10} ch={:>2} rssi={:>4} DATA llid={} sn={} nesn={} md={} len={} {}",
                m.pkt.ts32,
                m.pkt.chan,
                m.pkt.rssi,
                m.llid,
                m.sn as u8,
                m.nesn as u8,
                m.md as u8,
                m.pkt.len,
                hex(&m.pkt.body)
            );
        }
    }
}

/// Parse a display-order MAC (aa:bb:cc:dd:ee:ff) into the on-air
/// little-endian byte order used by address filtering.
fn parse_mac(s: &str) -> Result<[u8; 6], String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(format!("bad MAC address '{}'", s));
    }
    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[5 - i] =
            u8::from_str_radix(part, 16).map_err(|_| format!("bad MAC address '{}'", s))?;
    }
    Ok(mac)
}

fn fmt_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .rev()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
