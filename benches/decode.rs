//! Benchmarks for the decoding engine.
//!
//! Measures the cursor and tree-construction overhead on small fixed inputs:
//! - Raw bit reads through the bit source
//! - An Ethernet frame carrying an IPv4 packet with checksum validation
//! - A FLAC metadata block dispatching into a vorbis comment

extern crate bitscope;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use bitscope::{BitBuf, DecodeOptions, Decoder, InArg, Registry};

fn ethernet_ipv4_frame() -> Vec<u8> {
    let mut frame = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
    frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    frame.extend_from_slice(&[0x08, 0x00]);
    // 10.0.0.1 -> 10.0.0.2, protocol 253, 4 payload bytes
    frame.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00, 0x40, 0xfd, 0x00, 0x00, 10, 0, 0, 1, 10,
        0, 0, 2, 0xde, 0xad, 0xbe, 0xef,
    ]);
    frame
}

fn flac_vorbis_comment_block() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&8u32.to_le_bytes());
    body.extend_from_slice(b"bitscope");
    body.extend_from_slice(&1u32.to_le_bytes());
    body.extend_from_slice(&11u32.to_le_bytes());
    body.extend_from_slice(b"TITLE=bench");

    let mut block = vec![0x04]; // not last, type 4
    block.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]); // u24 length
    block.extend_from_slice(&body);
    block
}

/// Benchmark raw bit reads without tree construction.
fn bench_bit_reads(c: &mut Criterion) {
    let buf = BitBuf::from(vec![0xa5; 64]);

    c.bench_function("bitbuf_read_unaligned", |b| {
        b.iter(|| {
            let mut total = 0u64;
            let mut pos = 0;
            while pos + 13 <= buf.len_bits() {
                total = total.wrapping_add(buf.read_bits(black_box(pos), 13).unwrap());
                pos += 13;
            }
            black_box(total)
        });
    });
}

/// Benchmark a cursor-only decode of an IPv4-style header.
fn bench_cursor_fields(c: &mut Criterion) {
    let bytes = ethernet_ipv4_frame();

    c.bench_function("cursor_header_fields", |b| {
        b.iter(|| {
            let mut d = Decoder::new(BitBuf::from(black_box(bytes.clone())));
            d.field_u("dst", 48, &[]).unwrap();
            d.field_u("src", 48, &[]).unwrap();
            d.field_u("ether_type", 16, &[]).unwrap();
            d.field_u("version", 4, &[]).unwrap();
            d.field_u("ihl", 4, &[]).unwrap();
            black_box(d.finish())
        });
    });
}

/// Benchmark the full Ethernet -> IPv4 dispatch including checksum validation.
fn bench_ethernet_decode(c: &mut Criterion) {
    let registry = Registry::standard().unwrap();
    let frame = ethernet_ipv4_frame();
    let buf = BitBuf::from(frame);

    c.bench_function("decode_ether_ipv4", |b| {
        b.iter(|| {
            let decoded = registry
                .decode(
                    black_box(buf.clone()),
                    "ether8023_frame",
                    InArg::NONE,
                    DecodeOptions::default(),
                )
                .unwrap();
            black_box(decoded.root)
        });
    });
}

/// Benchmark the FLAC metadata block dispatch into a vorbis comment.
fn bench_flac_decode(c: &mut Criterion) {
    let registry = Registry::standard().unwrap();
    let buf = BitBuf::from(flac_vorbis_comment_block());

    c.bench_function("decode_flac_metadatablock", |b| {
        b.iter(|| {
            let decoded = registry
                .decode(
                    black_box(buf.clone()),
                    "flac_metadatablock",
                    InArg::NONE,
                    DecodeOptions::default(),
                )
                .unwrap();
            black_box(decoded.root)
        });
    });
}

criterion_group!(
    benches,
    bench_bit_reads,
    bench_cursor_fields,
    bench_ethernet_decode,
    bench_flac_decode
);
criterion_main!(benches);
