//! Integration tests for the internet format family: IPv4 header checksum
//! validation, Ethernet payload dispatch, and the raw fallback on probe misses.

use std::io::Write;

use bitscope::{
    checksum::Ipv4Checksum, BitBuf, DecodeOptions, Decoded, InArg, NodeKind, Registry,
};
use bitscope::scalar::Validation;

fn decode(format: &str, bytes: Vec<u8>) -> Decoded {
    let registry = Registry::standard().unwrap();
    registry
        .decode(
            BitBuf::from(bytes),
            format,
            InArg::NONE,
            DecodeOptions::default(),
        )
        .unwrap()
}

/// 20-byte TCP header: port 4000 -> 80, seq/ack 0, data offset 5, ACK set.
fn tcp_header() -> Vec<u8> {
    let mut tcp = Vec::new();
    tcp.extend_from_slice(&4000u16.to_be_bytes());
    tcp.extend_from_slice(&80u16.to_be_bytes());
    tcp.extend_from_slice(&0u32.to_be_bytes());
    tcp.extend_from_slice(&0u32.to_be_bytes());
    tcp.push(0x50);
    tcp.push(0x10);
    tcp.extend_from_slice(&1024u16.to_be_bytes());
    tcp.extend_from_slice(&[0, 0, 0, 0]);
    tcp
}

/// IPv4 packet 10.0.0.1 -> 10.0.0.2 with a correct header checksum.
fn ipv4_packet(protocol: u8, payload: &[u8]) -> Vec<u8> {
    let total_length = (20 + payload.len()) as u16;
    let mut header = vec![0x45, 0x00];
    header.extend_from_slice(&total_length.to_be_bytes());
    header.extend_from_slice(&[0x00, 0x00]); // identification
    header.extend_from_slice(&[0x00, 0x00]); // flags + fragment offset
    header.push(64); // ttl
    header.push(protocol);
    header.extend_from_slice(&[0x00, 0x00]); // checksum, patched below
    header.extend_from_slice(&[10, 0, 0, 1]);
    header.extend_from_slice(&[10, 0, 0, 2]);

    let mut checksum = Ipv4Checksum::new();
    checksum.write_all(&header).unwrap();
    let sum = checksum.sum();
    header[10] = sum[0];
    header[11] = sum[1];

    header.extend_from_slice(payload);
    header
}

fn ethernet_frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
    frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

#[test]
fn ipv4_checksum_validates_and_ips_are_symbolic() {
    let decoded = decode("ipv4_packet", ipv4_packet(6, &tcp_header()));
    assert!(decoded.error.is_none());

    let root = &decoded.root;
    let source = root.child("source_ip").unwrap().scalar().unwrap();
    assert_eq!(source.sym.as_deref(), Some("10.0.0.1"));
    let destination = root.child("destination_ip").unwrap().scalar().unwrap();
    assert_eq!(destination.sym.as_deref(), Some("10.0.0.2"));

    let checksum = root.child("header_checksum").unwrap().scalar().unwrap();
    assert_eq!(checksum.validation, Some(Validation::Valid));
    assert_eq!(checksum.validation.unwrap().to_string(), "valid");
}

#[test]
fn corrupted_checksum_is_marked_invalid_not_fatal() {
    let mut packet = ipv4_packet(6, &tcp_header());
    packet[10] ^= 0xff;
    let decoded = decode("ipv4_packet", packet);
    assert!(decoded.error.is_none());

    let checksum = decoded.root.child("header_checksum").unwrap().scalar().unwrap();
    assert_eq!(checksum.validation, Some(Validation::Invalid));
}

#[test]
fn ipv4_payload_dispatches_to_tcp() {
    let decoded = decode("ipv4_packet", ipv4_packet(6, &tcp_header()));
    let payload = decoded.root.child("payload").unwrap();
    assert_eq!(payload.kind(), NodeKind::Struct);
    let sport = payload.child("source_port").unwrap().scalar().unwrap();
    assert_eq!(sport.actual_u(), Some(4000));
    assert!(payload.child("syn").is_some());
}

#[test]
fn ipv4_payload_dispatches_to_udp() {
    let mut udp = Vec::new();
    udp.extend_from_slice(&53u16.to_be_bytes());
    udp.extend_from_slice(&53u16.to_be_bytes());
    udp.extend_from_slice(&12u16.to_be_bytes());
    udp.extend_from_slice(&[0x00, 0x00]);
    udp.extend_from_slice(b"ping");

    let decoded = decode("ipv4_packet", ipv4_packet(17, &udp));
    let payload = decoded.root.child("payload").unwrap();
    let sport = payload.child("source_port").unwrap().scalar().unwrap();
    assert_eq!(sport.actual_u(), Some(53));
    assert_eq!(sport.sym.as_deref(), Some("domain"));
}

#[test]
fn udp_trailing_padding_is_excluded_from_payload() {
    let mut udp = Vec::new();
    udp.extend_from_slice(&53u16.to_be_bytes());
    udp.extend_from_slice(&53u16.to_be_bytes());
    udp.extend_from_slice(&12u16.to_be_bytes());
    udp.extend_from_slice(&[0x00, 0x00]);
    udp.extend_from_slice(b"ping");
    udp.extend_from_slice(&[0x00, 0x00]); // padding past the declared length

    let decoded = decode("ipv4_packet", ipv4_packet(17, &udp));
    assert!(decoded.error.is_none());

    let datagram = decoded.root.child("payload").unwrap();
    let payload = datagram.child("payload").unwrap();
    assert_eq!(payload.range().len, 32);
    assert_eq!(payload.scalar().unwrap().actual.as_bytes(), Some(&b"ping"[..]));

    let unknown = datagram.child("unknown").unwrap();
    assert_eq!(unknown.range().len, 16);
}

#[test]
fn ipv4_unknown_protocol_payload_stays_raw() {
    let decoded = decode("ipv4_packet", ipv4_packet(253, &[0xde, 0xad]));
    let payload = decoded.root.child("payload").unwrap();
    assert_eq!(payload.kind(), NodeKind::Leaf);
    assert_eq!(payload.range().len, 16);
}

#[test]
fn ethernet_dispatches_ipv4_payload() {
    let frame = ethernet_frame(0x0800, &ipv4_packet(6, &tcp_header()));
    let decoded = decode("ether8023_frame", frame);
    assert!(decoded.error.is_none());

    let root = &decoded.root;
    for name in ["destination", "source", "ether_type", "payload"] {
        assert!(root.child(name).is_some(), "missing field {name}");
    }
    let destination = root.child("destination").unwrap().scalar().unwrap();
    assert_eq!(destination.sym.as_deref(), Some("ff:ff:ff:ff:ff:ff"));
    let source = root.child("source").unwrap().scalar().unwrap();
    assert_eq!(source.sym.as_deref(), Some("00:11:22:33:44:55"));

    let payload = root.child("payload").unwrap();
    assert_eq!(payload.kind(), NodeKind::Struct);
    assert!(payload.child("source_ip").is_some());
}

#[test]
fn ethernet_probe_miss_falls_back_to_raw() {
    let frame = ethernet_frame(0xffff, &[0x01, 0x02, 0x03, 0x04]);
    let decoded = decode("ether8023_frame", frame);
    assert!(decoded.error.is_none());

    let payload = decoded.root.child("payload").unwrap();
    assert_eq!(payload.kind(), NodeKind::Leaf);
    assert_eq!(payload.range().len, 32);
    assert_eq!(
        payload.scalar().unwrap().actual.as_bytes(),
        Some(&[0x01, 0x02, 0x03, 0x04][..])
    );
}

#[test]
fn redecoding_the_payload_range_matches_the_nested_tree() {
    let registry = Registry::standard().unwrap();
    let frame = ethernet_frame(0x0800, &ipv4_packet(253, &[1, 2, 3, 4]));
    let buf = BitBuf::from(frame);
    let decoded = registry
        .decode(buf.clone(), "ether8023_frame", InArg::NONE, DecodeOptions::default())
        .unwrap();

    let payload = decoded.root.child("payload").unwrap();
    let range = payload.range();
    let sub = buf.sub(range.start, range.len).unwrap();
    let redecoded = registry
        .decode(sub, "ipv4_packet", InArg::NONE, DecodeOptions::default())
        .unwrap();
    assert!(redecoded.error.is_none());

    // same shape modulo the coordinate shift of the sub-range
    fn same_shifted(a: &bitscope::Node, b: &bitscope::Node, shift: u64) -> bool {
        a.name() == b.name()
            && a.kind() == b.kind()
            && a.range().start == b.range().start + shift
            && a.range().len == b.range().len
            && a.children().len() == b.children().len()
            && a.children()
                .iter()
                .zip(b.children())
                .all(|(a, b)| same_shifted(a, b, shift))
    }
    assert_eq!(payload.children().len(), redecoded.root.children().len());
    for (nested, fresh) in payload.children().iter().zip(redecoded.root.children()) {
        assert!(same_shifted(nested, fresh, range.start));
    }
}
