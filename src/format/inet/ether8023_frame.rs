//! Ethernet 802.3 frame: MAC addresses, ether type, and payload dispatch.

use crate::{
    decode::Decoder,
    format::{groups, names, InetPacketIn, LinkFrameIn, ETHER_TYPES, LINK_TYPE_ETHERNET},
    registry::{Dependency, Format, InArg, OutArg},
    scalar::{mappers::ActualHex, Scalar},
    Result,
};

/// Ethernet 802.3 frame.
pub static FORMAT: Format = Format {
    name: names::ETHER8023_FRAME,
    description: "Ethernet 802.3 frame",
    probe_order: 0,
    groups: &[groups::LINK_FRAME],
    dependencies: &[Dependency {
        names: &[groups::INET_PACKET],
    }],
    decode_fn: decode_ethernet_frame,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn map_u_to_ether_sym(mut s: Scalar) -> Result<Scalar> {
    if let Some(u) = s.actual.as_u64() {
        let b = u.to_be_bytes();
        s.sym = Some(format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        ));
    }
    Ok(s)
}

fn decode_ethernet_frame(d: &mut Decoder<'_>, in_arg: InArg<'_>) -> Result<OutArg> {
    if let Some(lfi) = in_arg.get::<LinkFrameIn>() {
        if lfi.link_type != LINK_TYPE_ETHERNET {
            return Err(d.reject(format!("wrong link type {}", lfi.link_type)));
        }
    }

    d.field_u("destination", 48, &[&map_u_to_ether_sym, &ActualHex])?;
    d.field_u("source", 48, &[&map_u_to_ether_sym, &ActualHex])?;
    let ether_type = d.field_u("ether_type", 16, &[&ETHER_TYPES, &ActualHex])?;

    let inet_in = InetPacketIn { ether_type };
    d.field_format_or_raw_len(
        "payload",
        d.bits_left(),
        groups::INET_PACKET,
        InArg::of(&inet_in),
    )?;

    Ok(None)
}
