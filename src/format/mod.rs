//! Built-in format bodies: clients of the decoding engine.
//!
//! Each submodule holds the decode body and descriptor of one format family,
//! mirroring the wire layouts they decode. Formats talk to the engine only through
//! the cursor; this module adds what they share: format and group name constants,
//! the per-group in/out argument records, common symbol tables, and the static
//! [`FORMATS`] table the standard registry is built from.

pub mod flac;
pub mod inet;
pub mod mp4;
pub mod pcap;
pub mod vorbis;

use crate::registry::Format;
use crate::scalar::mappers::UToSymStr;

/// Format name constants.
pub mod names {
    /// Ethernet 802.3 frame
    pub const ETHER8023_FRAME: &str = "ether8023_frame";
    /// Internet protocol v4 packet
    pub const IPV4_PACKET: &str = "ipv4_packet";
    /// Transmission control protocol segment
    pub const TCP_SEGMENT: &str = "tcp_segment";
    /// User datagram protocol datagram
    pub const UDP_DATAGRAM: &str = "udp_datagram";
    /// PCAP packet capture
    pub const PCAP: &str = "pcap";
    /// FLAC metadata block
    pub const FLAC_METADATABLOCK: &str = "flac_metadatablock";
    /// FLAC stream info block
    pub const FLAC_STREAMINFO: &str = "flac_streaminfo";
    /// Vorbis comment header
    pub const VORBIS_COMMENT: &str = "vorbis_comment";
    /// PlayReady PSSH data
    pub const PSSH_PLAYREADY: &str = "pssh_playready";
}

/// Group name constants.
pub mod groups {
    /// Formats tried by auto-detection
    pub const PROBE: &str = "probe";
    /// Link-layer frames inside packet captures
    pub const LINK_FRAME: &str = "link_frame";
    /// Packets addressed by an ether type
    pub const INET_PACKET: &str = "inet_packet";
    /// Packets addressed by an IP protocol number
    pub const IP_PACKET: &str = "ip_packet";
    /// Reassembled TCP stream payloads
    pub const TCP_STREAM: &str = "tcp_stream";
}

/// Link type of an Ethernet capture.
pub const LINK_TYPE_ETHERNET: u64 = 1;
/// Ether type of IPv4.
pub const ETHER_TYPE_IPV4: u64 = 0x0800;
/// IP protocol number of TCP.
pub const IP_PROTOCOL_TCP: u64 = 6;
/// IP protocol number of UDP.
pub const IP_PROTOCOL_UDP: u64 = 17;

/// Common link types of packet captures.
pub static LINK_TYPES: UToSymStr = UToSymStr(&[
    (0, "null"),
    (1, "ethernet"),
    (101, "raw"),
    (105, "ieee802_11"),
    (113, "linux_sll"),
    (276, "linux_sll2"),
]);

/// Common ether types.
pub static ETHER_TYPES: UToSymStr = UToSymStr(&[
    (0x0800, "ipv4"),
    (0x0806, "arp"),
    (0x8100, "vlan"),
    (0x86dd, "ipv6"),
]);

/// Common IP protocol numbers.
pub static IP_PROTOCOLS: UToSymStr = UToSymStr(&[
    (1, "icmp"),
    (2, "igmp"),
    (6, "tcp"),
    (17, "udp"),
    (41, "ipv6"),
    (89, "ospf"),
    (132, "sctp"),
]);

/// Well-known TCP ports.
pub static TCP_PORTS: UToSymStr = UToSymStr(&[
    (20, "ftp_data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "domain"),
    (80, "http"),
    (110, "pop3"),
    (143, "imap"),
    (443, "https"),
]);

/// Well-known UDP ports.
pub static UDP_PORTS: UToSymStr = UToSymStr(&[
    (53, "domain"),
    (67, "bootps"),
    (68, "bootpc"),
    (123, "ntp"),
    (161, "snmp"),
    (443, "https"),
]);

/// In-argument of `link_frame` formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFrameIn {
    /// Capture link type the frame came from
    pub link_type: u64,
    /// The enclosing capture is little-endian
    pub is_little_endian: bool,
}

/// In-argument of `inet_packet` formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct InetPacketIn {
    /// Ether type of the enclosing frame
    pub ether_type: u64,
}

/// In-argument of `ip_packet` formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpPacketIn {
    /// IP protocol number of the enclosing packet
    pub protocol: u64,
}

/// In-argument of `tcp_stream` formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpStreamIn {
    /// This direction was initiated by the client
    pub is_client: bool,
    /// The stream starts at its true beginning
    pub has_start: bool,
    /// The stream's end was captured
    pub has_end: bool,
    /// Bytes lost to sequence gaps
    pub skipped_bytes: u64,
    /// Sending port of this direction
    pub source_port: u16,
    /// Receiving port of this direction
    pub destination_port: u16,
}

/// Stream parameters decoded from a FLAC stream info block.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlacStreamInfo {
    /// Sample rate in Hz
    pub sample_rate: u64,
    /// Bits per sample
    pub bits_per_sample: u64,
    /// Total samples, 0 when unknown
    pub total_samples_in_stream: u64,
}

/// Out-argument of `flac_streaminfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlacStreaminfoOut {
    /// The decoded stream parameters
    pub stream_info: FlacStreamInfo,
}

/// Out-argument of `flac_metadatablock`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlacMetadatablockOut {
    /// This was the last metadata block before the frames
    pub is_last_block: bool,
    /// Stream parameters, when the block was a stream info block
    pub stream_info: Option<FlacStreamInfo>,
}

/// Every built-in format, the table [`crate::Registry::standard`] registers.
pub static FORMATS: &[&Format] = &[
    &flac::metadatablock::FORMAT,
    &flac::streaminfo::FORMAT,
    &inet::ether8023_frame::FORMAT,
    &inet::ipv4_packet::FORMAT,
    &inet::tcp_segment::FORMAT,
    &inet::udp_datagram::FORMAT,
    &mp4::pssh_playready::FORMAT,
    &pcap::FORMAT,
    &vorbis::comment::FORMAT,
];
