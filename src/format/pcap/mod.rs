//! PCAP packet capture format.
//!
//! The global header's magic decides the byte order of everything that follows.
//! After the packet records are decoded, reassembled IPv4 datagrams and TCP
//! streams collected by the [`FlowAssembler`] are decoded as nested trees from
//! their own buffers.

use crate::{
    bitbuf::BitBuf,
    decode::{Decoder, Endian},
    flows::{FlowAssembler, TcpDirection},
    format::{
        groups, names, LinkFrameIn, TcpStreamIn, LINK_TYPES, LINK_TYPE_ETHERNET, TCP_PORTS,
    },
    registry::{Dependency, Format, FormatHelp, HelpReference, InArg, OutArg},
    scalar::mappers::{ActualHex, AssertU, UToSymStr},
    Result,
};

/// PCAP packet capture.
pub static FORMAT: Format = Format {
    name: names::PCAP,
    description: "PCAP packet capture",
    probe_order: 0,
    groups: &[groups::PROBE],
    dependencies: &[
        Dependency {
            names: &[groups::LINK_FRAME],
        },
        Dependency {
            names: &[groups::TCP_STREAM],
        },
        Dependency {
            names: &[names::IPV4_PACKET],
        },
    ],
    decode_fn: decode_pcap,
    root_array: false,
    root_name: None,
    functions: &[],
    help: Some(&HELP),
};

static HELP: FormatHelp = FormatHelp {
    notes: "The nested packets, ipv4_reassembled and tcp_connections trees are \
            decoded from the capture's raw frames.",
    functions: &[],
    references: &[HelpReference {
        title: "Libpcap File Format",
        url: "https://wiki.wireshark.org/Development/LibpcapFileFormat",
    }],
};

const BIG_ENDIAN: u64 = 0xa1b2_c3d4;
const LITTLE_ENDIAN: u64 = 0xd4c3_b2a1;

static ENDIAN_NAMES: UToSymStr = UToSymStr(&[
    (BIG_ENDIAN, "big_endian"),
    (LITTLE_ENDIAN, "little_endian"),
]);

fn decode_pcap(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    let magic = d.field_u(
        "magic",
        32,
        &[&AssertU(&[BIG_ENDIAN, LITTLE_ENDIAN]), &ENDIAN_NAMES, &ActualHex],
    )?;
    match magic {
        BIG_ENDIAN => d.endian = Endian::Big,
        LITTLE_ENDIAN => d.endian = Endian::Little,
        _ => return Err(d.fatal(format!("unknown endian {magic}"))),
    }

    d.field_u("version_major", 16, &[])?;
    d.field_u("version_minor", 16, &[])?;
    d.field_s("thiszone", 32, &[])?;
    d.field_u("sigfigs", 32, &[])?;
    d.field_u("snaplen", 32, &[])?;
    let link_type = d.field_u("network", 32, &[&LINK_TYPES])?;

    let mut assembler = FlowAssembler::new();

    d.field_array("packets", |d| {
        while !d.end() {
            d.field_struct("packet", |d| {
                d.field_u("ts_sec", 32, &[])?;
                d.field_u("ts_usec", 32, &[])?;
                let incl_len = d.field_u("incl_len", 32, &[])?;
                let orig_len = d.field_u("orig_len", 32, &[])?;
                if incl_len > orig_len {
                    d.warn(format!("incl_len {incl_len} > orig_len {orig_len}"));
                }

                if link_type == LINK_TYPE_ETHERNET {
                    let frame = d.bit_buf_range(d.pos(), incl_len * 8)?.to_bytes()?;
                    assembler.ethernet_frame(&frame);
                }

                let link_in = LinkFrameIn {
                    link_type,
                    is_little_endian: d.endian == Endian::Little,
                };
                d.field_format_or_raw_len(
                    "packet",
                    incl_len * 8,
                    groups::LINK_FRAME,
                    InArg::of(&link_in),
                )?;
                Ok(())
            })?;
        }
        Ok(())
    })?;
    assembler.flush();

    field_flows(d, &assembler)?;

    Ok(None)
}

fn field_flows(d: &mut Decoder<'_>, assembler: &FlowAssembler) -> Result<()> {
    d.field_array("ipv4_reassembled", |d| {
        for datagram in assembler.ipv4_reassembled() {
            let buf = BitBuf::from(datagram.packet.clone());
            if d.try_field_format_bit_buf(
                "ipv4_packet",
                buf.clone(),
                names::IPV4_PACKET,
                InArg::NONE,
            )
            .is_err()
            {
                d.field_root_bit_buf("ipv4_packet", buf)?;
            }
        }
        Ok(())
    })?;

    d.field_array("tcp_connections", |d| {
        for connection in assembler.tcp_connections() {
            d.field_struct("tcp_connection", |d| {
                d.field_struct("client", |d| {
                    field_direction(
                        d,
                        &connection.client,
                        TcpStreamIn {
                            is_client: true,
                            has_start: connection.client.has_start,
                            has_end: connection.client.has_end,
                            skipped_bytes: connection.client.skipped_bytes,
                            source_port: connection.client.endpoint.port,
                            destination_port: connection.server.endpoint.port,
                        },
                    )
                })?;
                d.field_struct("server", |d| {
                    field_direction(
                        d,
                        &connection.server,
                        TcpStreamIn {
                            is_client: false,
                            has_start: connection.server.has_start,
                            has_end: connection.server.has_end,
                            skipped_bytes: connection.server.skipped_bytes,
                            source_port: connection.server.endpoint.port,
                            destination_port: connection.client.endpoint.port,
                        },
                    )
                })?;
                Ok(())
            })?;
        }
        Ok(())
    })
}

fn field_direction(
    d: &mut Decoder<'_>,
    direction: &TcpDirection,
    stream_in: TcpStreamIn,
) -> Result<()> {
    d.field_value_str("ip", &direction.endpoint.ip.to_string(), &[])?;
    d.field_value_u("port", u64::from(direction.endpoint.port), &[&TCP_PORTS])?;
    d.field_value_bool("has_start", direction.has_start, &[])?;
    d.field_value_bool("has_end", direction.has_end, &[])?;
    d.field_value_u("skipped_bytes", direction.skipped_bytes, &[])?;

    let buf = BitBuf::from(direction.buffer.clone());
    if d.try_field_format_bit_buf("stream", buf.clone(), groups::TCP_STREAM, InArg::of(&stream_in))
        .is_err()
    {
        d.field_root_bit_buf("stream", buf)?;
    }
    Ok(())
}
