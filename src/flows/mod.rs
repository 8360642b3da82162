//! Flow reassembly collaborator for packet-capture formats.
//!
//! A [`FlowAssembler`] consumes raw link-layer frames as a capture decode walks its
//! packets and accumulates two result sets: complete (unfragmented) IPv4 datagrams
//! and per-direction TCP payload streams. Capture formats then decode the
//! reassembled buffers as nested packets and streams.
//!
//! Reassembly is purely additive: a frame the assembler cannot parse is skipped
//! silently and never fails the enclosing decode. Segments arriving out of order
//! are not reordered; a sequence gap is recorded as skipped bytes and the stream
//! continues from the gap's far side.

use bitflags::bitflags;
use std::net::Ipv4Addr;

bitflags! {
    /// TCP header flags, low nine bits of the flags word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TcpFlags: u16 {
        /// No more data from sender
        const FIN = 0x001;
        /// Synchronize sequence numbers
        const SYN = 0x002;
        /// Reset the connection
        const RST = 0x004;
        /// Push function
        const PSH = 0x008;
        /// Acknowledgment field is significant
        const ACK = 0x010;
        /// Urgent pointer field is significant
        const URG = 0x020;
        /// ECN-echo
        const ECE = 0x040;
        /// Congestion window reduced
        const CWR = 0x080;
        /// ECN nonce
        const NS = 0x100;
    }
}

/// A complete IPv4 packet captured off the wire, decodable as `ipv4_packet`.
#[derive(Debug, Clone)]
pub struct Ipv4Datagram {
    /// Source address
    pub source: Ipv4Addr,
    /// Destination address
    pub destination: Ipv4Addr,
    /// IP protocol number
    pub protocol: u8,
    /// The full packet bytes, header included
    pub packet: Vec<u8>,
}

/// One endpoint of a TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpEndpoint {
    /// IPv4 address
    pub ip: Ipv4Addr,
    /// TCP port
    pub port: u16,
}

/// One direction of a TCP connection and its accumulated payload.
#[derive(Debug, Clone)]
pub struct TcpDirection {
    /// The sending endpoint of this direction
    pub endpoint: TcpEndpoint,
    /// A SYN was seen, so the stream starts at its true beginning
    pub has_start: bool,
    /// A FIN was seen
    pub has_end: bool,
    /// Bytes lost to sequence gaps
    pub skipped_bytes: u64,
    /// The reassembled payload
    pub buffer: Vec<u8>,
    next_seq: Option<u32>,
}

impl TcpDirection {
    fn new(endpoint: TcpEndpoint) -> Self {
        TcpDirection {
            endpoint,
            has_start: false,
            has_end: false,
            skipped_bytes: 0,
            buffer: Vec::new(),
            next_seq: None,
        }
    }

    fn segment(&mut self, seq: u32, flags: TcpFlags, payload: &[u8]) {
        if flags.contains(TcpFlags::SYN) {
            self.has_start = true;
            self.next_seq = Some(seq.wrapping_add(1));
            return;
        }
        if flags.contains(TcpFlags::FIN) {
            self.has_end = true;
        }
        if payload.is_empty() {
            return;
        }

        let expected = match self.next_seq {
            Some(expected) => expected,
            None => {
                // stream captured mid-flight, accept the first seq as the base
                self.next_seq = Some(seq);
                seq
            }
        };

        let delta = seq.wrapping_sub(expected);
        if delta == 0 {
            self.buffer.extend_from_slice(payload);
            self.next_seq = Some(seq.wrapping_add(payload.len() as u32));
        } else if delta < 0x8000_0000 {
            // gap ahead of us: count it and resume from the segment
            self.skipped_bytes += u64::from(delta);
            self.buffer.extend_from_slice(payload);
            self.next_seq = Some(seq.wrapping_add(payload.len() as u32));
        } else {
            // retransmission or overlap: keep only the unseen tail
            let overlap = expected.wrapping_sub(seq) as usize;
            if overlap < payload.len() {
                self.buffer.extend_from_slice(&payload[overlap..]);
                self.next_seq = Some(seq.wrapping_add(payload.len() as u32));
            }
        }
    }
}

/// A TCP connection with a client and a server direction.
///
/// The direction that sent the first observed segment is the client.
#[derive(Debug, Clone)]
pub struct TcpConnection {
    /// Direction initiated by the first observed segment
    pub client: TcpDirection,
    /// The opposite direction
    pub server: TcpDirection,
}

/// Accumulates IPv4 datagrams and TCP streams from raw link-layer frames.
#[derive(Debug, Default)]
pub struct FlowAssembler {
    ipv4: Vec<Ipv4Datagram>,
    connections: Vec<TcpConnection>,
}

impl FlowAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        FlowAssembler::default()
    }

    /// Feed one raw Ethernet frame. Non-IPv4 frames and frames too short to
    /// parse are skipped.
    pub fn ethernet_frame(&mut self, frame: &[u8]) {
        if frame.len() < 14 {
            return;
        }
        let ether_type = u16::from_be_bytes([frame[12], frame[13]]);
        if ether_type == 0x0800 {
            self.ipv4_packet(&frame[14..]);
        }
    }

    /// Feed one raw IPv4 packet. Fragmented packets are skipped; complete ones
    /// are recorded and their TCP payloads folded into connection streams.
    pub fn ipv4_packet(&mut self, packet: &[u8]) {
        if packet.len() < 20 || packet[0] >> 4 != 4 {
            return;
        }
        let ihl = usize::from(packet[0] & 0x0f) * 4;
        let total_len = usize::from(u16::from_be_bytes([packet[2], packet[3]]));
        if ihl < 20 || total_len < ihl || packet.len() < total_len {
            return;
        }
        let flags_frag = u16::from_be_bytes([packet[6], packet[7]]);
        let more_fragments = flags_frag & 0x2000 != 0;
        let fragment_offset = flags_frag & 0x1fff;
        if more_fragments || fragment_offset != 0 {
            return;
        }

        let protocol = packet[9];
        let source = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
        let destination = Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]);
        self.ipv4.push(Ipv4Datagram {
            source,
            destination,
            protocol,
            packet: packet[..total_len].to_vec(),
        });

        if protocol == 6 {
            self.tcp_segment(source, destination, &packet[ihl..total_len]);
        }
    }

    fn tcp_segment(&mut self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, segment: &[u8]) {
        if segment.len() < 20 {
            return;
        }
        let src = TcpEndpoint {
            ip: src_ip,
            port: u16::from_be_bytes([segment[0], segment[1]]),
        };
        let dst = TcpEndpoint {
            ip: dst_ip,
            port: u16::from_be_bytes([segment[2], segment[3]]),
        };
        let seq = u32::from_be_bytes([segment[4], segment[5], segment[6], segment[7]]);
        let data_offset = usize::from(segment[12] >> 4) * 4;
        if data_offset < 20 || segment.len() < data_offset {
            return;
        }
        let flags =
            TcpFlags::from_bits_truncate(u16::from_be_bytes([segment[12], segment[13]]) & 0x1ff);
        let payload = &segment[data_offset..];

        let index = self
            .connections
            .iter()
            .position(|c| {
                (c.client.endpoint, c.server.endpoint) == (src, dst)
                    || (c.client.endpoint, c.server.endpoint) == (dst, src)
            })
            .unwrap_or_else(|| {
                self.connections.push(TcpConnection {
                    client: TcpDirection::new(src),
                    server: TcpDirection::new(dst),
                });
                self.connections.len() - 1
            });

        let connection = &mut self.connections[index];
        let direction = if connection.client.endpoint == src {
            &mut connection.client
        } else {
            &mut connection.server
        };
        direction.segment(seq, flags, payload);
    }

    /// Finalize accumulation. Present for contract parity with streaming
    /// captures; in-order accumulation has nothing left to do.
    pub fn flush(&mut self) {}

    /// Complete IPv4 datagrams, in capture order.
    #[must_use]
    pub fn ipv4_reassembled(&self) -> &[Ipv4Datagram] {
        &self.ipv4
    }

    /// TCP connections, in first-seen order.
    #[must_use]
    pub fn tcp_connections(&self) -> &[TcpConnection] {
        &self.connections
    }
}
