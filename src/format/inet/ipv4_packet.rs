//! IPv4 packet: header fields, options, ones-complement checksum validation,
//! and payload dispatch by protocol number.

use std::net::Ipv4Addr;

use crate::{
    checksum::Ipv4Checksum,
    decode::Decoder,
    format::{groups, names, InetPacketIn, IpPacketIn, ETHER_TYPE_IPV4, IP_PROTOCOLS},
    registry::{Dependency, Format, InArg, OutArg},
    scalar::{
        mappers::{ActualHex, SymEntry, UToScalar, ValidateUBytes},
        Scalar,
    },
    Result,
};

/// Internet protocol v4 packet.
pub static FORMAT: Format = Format {
    name: names::IPV4_PACKET,
    description: "Internet protocol v4 packet",
    probe_order: 0,
    groups: &[groups::INET_PACKET],
    dependencies: &[Dependency {
        names: &[groups::IP_PACKET],
    }],
    decode_fn: decode_ipv4,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

const OPTION_END: u64 = 0;
const OPTION_NOP: u64 = 1;

static OPTIONS: UToScalar = UToScalar(&[
    (
        OPTION_END,
        SymEntry {
            sym: Some("end"),
            description: Some("End of options list"),
        },
    ),
    (
        OPTION_NOP,
        SymEntry {
            sym: Some("nop"),
            description: Some("No operation"),
        },
    ),
    (
        2,
        SymEntry {
            sym: None,
            description: Some("Security"),
        },
    ),
    (
        3,
        SymEntry {
            sym: None,
            description: Some("Loose Source Routing"),
        },
    ),
    (
        4,
        SymEntry {
            sym: None,
            description: Some("Internet Timestamp"),
        },
    ),
    (
        7,
        SymEntry {
            sym: None,
            description: Some("Record Route"),
        },
    ),
    (
        8,
        SymEntry {
            sym: None,
            description: Some("Stream ID"),
        },
    ),
    (
        9,
        SymEntry {
            sym: None,
            description: Some("Strict Source Routing"),
        },
    ),
]);

fn map_u_to_ipv4_sym(mut s: Scalar) -> Result<Scalar> {
    if let Some(u) = s.actual.as_u64() {
        s.sym = Some(Ipv4Addr::from((u as u32).to_be_bytes()).to_string());
    }
    Ok(s)
}

fn decode_ipv4(d: &mut Decoder<'_>, in_arg: InArg<'_>) -> Result<OutArg> {
    if let Some(ipi) = in_arg.get::<InetPacketIn>() {
        if ipi.ether_type != ETHER_TYPE_IPV4 {
            return Err(d.reject(format!("incorrect ethertype {}", ipi.ether_type)));
        }
    }

    let header_start = d.pos();
    d.field_u("version", 4, &[])?;
    let ihl = d.field_u("ihl", 4, &[])?;
    d.field_u("dscp", 6, &[])?;
    d.field_u("ecn", 2, &[])?;
    let total_length = d.field_u("total_length", 16, &[])?;
    d.field_u("identification", 16, &[])?;
    d.field_u("reserved", 1, &[])?;
    d.field_bool("dont_fragment", &[])?;
    let more_fragments = d.field_bool("more_fragments", &[])?;
    let fragment_offset = d.field_u("fragment_offset", 13, &[])?;
    d.field_u("ttl", 8, &[])?;
    let protocol = d.field_u("protocol", 8, &[&IP_PROTOCOLS])?;
    let checksum_start = d.pos();
    d.field_u("header_checksum", 16, &[&ActualHex])?;
    let checksum_end = d.pos();
    d.field_u("source_ip", 32, &[&map_u_to_ipv4_sym, &ActualHex])?;
    d.field_u("destination_ip", 32, &[&map_u_to_ipv4_sym, &ActualHex])?;

    if ihl < 5 {
        return Err(d.fatal(format!("invalid ihl {ihl}")));
    }
    let options_len = (ihl - 5) * 8 * 4;
    if options_len > 0 {
        d.framed(options_len, |d| {
            d.field_array("options", |d| {
                while !d.end() {
                    d.field_struct("option", |d| {
                        d.field_bool("copied", &[])?;
                        d.field_u("class", 2, &[])?;
                        let kind = d.field_u("number", 5, &[&OPTIONS])?;
                        match kind {
                            OPTION_END | OPTION_NOP => {}
                            _ => {
                                let len = d.field_u("length", 8, &[])?;
                                d.field_raw_len("data", len.saturating_sub(2) * 8, &[])?;
                            }
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })
        })?;
    }
    let header_end = d.pos();

    let mut checksum = Ipv4Checksum::new();
    d.copy(
        &mut checksum,
        &d.bit_buf_range(header_start, checksum_start - header_start)?,
    )?;
    d.copy(
        &mut checksum,
        &d.bit_buf_range(checksum_end, header_end - checksum_end)?,
    )?;
    d.rewrite_scalar(
        "header_checksum",
        &[&ValidateUBytes(checksum.sum().to_vec()), &ActualHex],
    )?;

    let Some(data_bytes) = total_length.checked_sub(ihl * 4) else {
        return Err(d.fatal(format!(
            "total_length {total_length} smaller than header {} bytes",
            ihl * 4
        )));
    };
    let data_len = data_bytes * 8;

    if more_fragments || fragment_offset > 0 {
        d.field_raw_len("payload", data_len, &[])?;
    } else {
        let ip_in = IpPacketIn { protocol };
        d.field_format_or_raw_len("payload", data_len, groups::IP_PACKET, InArg::of(&ip_in))?;
    }

    Ok(None)
}
