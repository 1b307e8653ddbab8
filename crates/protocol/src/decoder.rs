use thiserror::Error;

use crate::packet::RawPacket;

pub const MAX_TRACKED_CONNECTIONS: usize = 128;

/// Advertising PDU types (BLE link layer, primary channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvPduType {
    AdvInd,
    AdvDirectInd,
    AdvNonconnInd,
    ScanReq,
    ScanRsp,
    ConnectInd,
    AdvScanInd,
    AdvExtInd,
}

impl AdvPduType {
    fn from_nibble(t: u8) -> Option<Self> {
        match t {
            0 => Some(AdvPduType::AdvInd),
            1 => Some(AdvPduType::AdvDirectInd),
            2 => Some(AdvPduType::AdvNonconnInd),
            3 => Some(AdvPduType::ScanReq),
            4 => Some(AdvPduType::ScanRsp),
            5 => Some(AdvPduType::ConnectInd),
            6 => Some(AdvPduType::AdvScanInd),
            7 => Some(AdvPduType::AdvExtInd),
            _ => None,
        }
    }
}

/// Why a structurally-valid RawPacket could not be interpreted.
/// Decode failures are tolerated upstream: the raw packet is forwarded
/// to the consumer instead of being dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("body too short for a link-layer header")]
    Truncated,
    #[error("reserved advertising PDU type {0}")]
    ReservedPduType(u8),
    #[error("body is {got} bytes but the header declares {declared}")]
    LengthMismatch { declared: usize, got: usize },
}

/// Decoded advertising-channel PDU
#[derive(Debug, Clone)]
pub struct AdvertMessage {
    pub pkt: RawPacket,
    pub pdu_type: AdvPduType,
    /// Advertiser address, for PDU types that carry one
    pub adv_addr: Option<[u8; 6]>,
}

/// Decoded data-channel PDU header
#[derive(Debug, Clone)]
pub struct DataMessage {
    pub pkt: RawPacket,
    pub llid: u8,
    pub nesn: bool,
    pub sn: bool,
    pub md: bool,
}

#[derive(Debug, Clone)]
pub enum DecodedPacket {
    Advert(AdvertMessage),
    Data(DataMessage),
}

impl DecodedPacket {
    pub fn raw(&self) -> &RawPacket {
        match self {
            DecodedPacket::Advert(m) => &m.pkt,
            DecodedPacket::Data(m) => &m.pkt,
        }
    }
}

/// Connection parameters learned from a CONNECT_IND PDU
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub aa: u32,
    pub crc_init: u32,
    pub hop_increment: u8,
    pub interval: u16,
    pub init_addr: [u8; 6],
    pub adv_addr: [u8; 6],
}

/// Accumulated decoder state for one sniffing session. Owned and
/// mutated exclusively by the capture worker.
#[derive(Debug, Default)]
pub struct DecoderState {
    connections: Vec<ConnectionInfo>,
}

impl DecoderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_for_aa(&self, aa: u32) -> Option<&ConnectionInfo> {
        self.connections.iter().find(|c| c.aa == aa)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn note_connection(&mut self, info: ConnectionInfo) {
        if let Some(existing) = self.connections.iter_mut().find(|c| c.aa == info.aa) {
            *existing = info;
            return;
        }
        if self.connections.len() >= MAX_TRACKED_CONNECTIONS {
            self.connections.remove(0);
        }
        self.connections.push(info);
    }
}

/// Interpret one RawPacket as a typed link-layer message, updating the
/// session decoder state along the way (currently: connection parameters
/// from CONNECT_IND).
pub fn decode(pkt: &RawPacket, state: &mut DecoderState) -> Result<DecodedPacket, DecodeError> {
    if pkt.body.len() < 2 {
        return Err(DecodeError::Truncated);
    }
    let declared = pkt.body[1] as usize + 2;
    if pkt.body.len() != declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            got: pkt.body.len(),
        });
    }

    if pkt.chan >= 37 {
        decode_advert(pkt, state)
    } else {
        Ok(DecodedPacket::Data(decode_data(pkt)))
    }
}

fn decode_advert(
    pkt: &RawPacket,
    state: &mut DecoderState,
) -> Result<DecodedPacket, DecodeError> {
    let header = pkt.body[0];
    let nibble = header & 0x0F;
    let pdu_type =
        AdvPduType::from_nibble(nibble).ok_or(DecodeError::ReservedPduType(nibble))?;
    let payload = &pkt.body[2..];

    let adv_addr = match pdu_type {
        AdvPduType::AdvInd
        | AdvPduType::AdvDirectInd
        | AdvPduType::AdvNonconnInd
        | AdvPduType::AdvScanInd
        | AdvPduType::ScanRsp => Some(addr_at(payload, 0)?),
        // ScanA comes first in SCAN_REQ; InitA comes first in CONNECT_IND
        AdvPduType::ScanReq | AdvPduType::ConnectInd => Some(addr_at(payload, 6)?),
        AdvPduType::AdvExtInd => ext_adv_addr(payload),
    };

    if pdu_type == AdvPduType::ConnectInd {
        if let Some(info) = parse_connect_ind(payload) {
            log::debug!(
                "CONNECT_IND: aa={:08X} hop={} interval={}",
                info.aa,
                info.hop_increment,
                info.interval
            );
            state.note_connection(info);
        }
    }

    Ok(DecodedPacket::Advert(AdvertMessage {
        pkt: pkt.clone(),
        pdu_type,
        adv_addr,
    }))
}

fn decode_data(pkt: &RawPacket) -> DataMessage {
    let header = pkt.body[0];
    DataMessage {
        pkt: pkt.clone(),
        llid: header & 0x03,
        nesn: header & 0x04 != 0,
        sn: header & 0x08 != 0,
        md: header & 0x10 != 0,
    }
}

fn addr_at(payload: &[u8], offset: usize) -> Result<[u8; 6], DecodeError> {
    payload
        .get(offset..offset + 6)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::Truncated)
}

/// Advertiser address from the ADV_EXT_IND common extended header,
/// when the AdvA flag bit is set.
fn ext_adv_addr(payload: &[u8]) -> Option<[u8; 6]> {
    // payload[0] = ext header length (6 bits) | AdvMode (2 bits)
    // payload[1] = flags; bit 0 = AdvA present, first optional field
    if payload.len() < 2 {
        return None;
    }
    let ext_hdr_len = (payload[0] & 0x3F) as usize;
    if ext_hdr_len < 7 || payload[1] & 0x01 == 0 {
        return None;
    }
    payload.get(2..8).and_then(|s| s.try_into().ok())
}

/// CONNECT_IND payload: InitA(6) + AdvA(6) + LLData(22) = 34 bytes.
fn parse_connect_ind(payload: &[u8]) -> Option<ConnectionInfo> {
    if payload.len() != 34 {
        return None;
    }
    let init_addr: [u8; 6] = payload[0..6].try_into().ok()?;
    let adv_addr: [u8; 6] = payload[6..12].try_into().ok()?;
    let aa = u32::from_le_bytes(payload[12..16].try_into().ok()?);
    let crc_init =
        payload[16] as u32 | ((payload[17] as u32) << 8) | ((payload[18] as u32) << 16);
    // payload[19]: WinSize; [20..22]: WinOffset
    let interval = u16::from_le_bytes(payload[22..24].try_into().ok()?);
    // [24..26]: Latency; [26..28]: Timeout; [28..33]: ChM
    let hop_increment = payload[33] & 0x1F;

    Some(ConnectionInfo {
        aa,
        crc_init,
        hop_increment,
        interval,
        init_addr,
        adv_addr,
    })
}
