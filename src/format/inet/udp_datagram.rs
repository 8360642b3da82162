//! UDP datagram: ports, length, checksum, and payload.

use crate::{
    decode::Decoder,
    format::{groups, names, IpPacketIn, IP_PROTOCOL_UDP, UDP_PORTS},
    registry::{Format, InArg, OutArg},
    scalar::mappers::ActualHex,
    Result,
};

/// User datagram protocol datagram.
pub static FORMAT: Format = Format {
    name: names::UDP_DATAGRAM,
    description: "User datagram protocol datagram",
    probe_order: 0,
    groups: &[groups::IP_PACKET],
    dependencies: &[],
    decode_fn: decode_udp,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn decode_udp(d: &mut Decoder<'_>, in_arg: InArg<'_>) -> Result<OutArg> {
    if let Some(ipp) = in_arg.get::<IpPacketIn>() {
        if ipp.protocol != IP_PROTOCOL_UDP {
            return Err(d.reject(format!("incorrect protocol {}", ipp.protocol)));
        }
    }

    d.field_u("source_port", 16, &[&UDP_PORTS])?;
    d.field_u("destination_port", 16, &[&UDP_PORTS])?;
    let length = d.field_u("length", 16, &[])?;
    if length < 8 {
        return Err(d.fatal(format!("invalid length {length}")));
    }
    d.field_u("checksum", 16, &[&ActualHex])?;
    // the length header bounds the payload, excluding any trailing padding
    let payload_len = (length - 8) * 8;
    d.field_raw_len("payload", payload_len, &[])?;

    Ok(None)
}
