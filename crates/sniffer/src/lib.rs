pub mod pipeline;
pub mod plan;
pub mod session;
pub mod worker;

use bls_protocol::decoder::{DecodeError, DecodedPacket};
use bls_protocol::packet::RawPacket;

pub use session::{ConfigError, SessionConfig, Sniffer};
pub use worker::WorkerHandle;

/// What the capture worker hands to the consumer.
#[derive(Debug, Clone)]
pub enum SnifferEvent {
    /// CRC-valid packet that decoded into a typed link-layer message.
    Packet(DecodedPacket),
    /// CRC-valid packet that could not be interpreted; forwarded raw
    /// with the reason decoding failed.
    Raw(RawPacket, DecodeError),
    /// Sentinel: the worker has drained its source and exited. No
    /// further events follow on this channel.
    EndOfStream,
}
