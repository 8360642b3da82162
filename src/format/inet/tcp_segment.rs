//! TCP segment: ports, sequence numbers, flag bits, options, and payload.

use crate::{
    decode::Decoder,
    format::{groups, names, IpPacketIn, IP_PROTOCOL_TCP, TCP_PORTS},
    registry::{Format, InArg, OutArg},
    scalar::mappers::{ActualHex, SymEntry, UToScalar},
    Result,
};

/// Transmission control protocol segment.
pub static FORMAT: Format = Format {
    name: names::TCP_SEGMENT,
    description: "Transmission control protocol segment",
    probe_order: 0,
    groups: &[groups::IP_PACKET],
    dependencies: &[],
    decode_fn: decode_tcp,
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
            sym: Some("maxseg"),
            description: Some("Maximum segment size"),
        },
    ),
    (
        3,
        SymEntry {
            sym: Some("wscale"),
            description: Some("Window scale"),
        },
    ),
    (
        4,
        SymEntry {
            sym: Some("sack_permitted"),
            description: None,
        },
    ),
    (
        5,
        SymEntry {
            sym: Some("sack"),
            description: None,
        },
    ),
    (
        8,
        SymEntry {
            sym: Some("timestamp"),
            description: None,
        },
    ),
]);

fn decode_tcp(d: &mut Decoder<'_>, in_arg: InArg<'_>) -> Result<OutArg> {
    if let Some(ipp) = in_arg.get::<IpPacketIn>() {
        if ipp.protocol != IP_PROTOCOL_TCP {
            return Err(d.reject(format!("incorrect protocol {}", ipp.protocol)));
        }
    }

    d.field_u("source_port", 16, &[&TCP_PORTS])?;
    d.field_u("destination_port", 16, &[&TCP_PORTS])?;
    d.field_u("sequence_number", 32, &[])?;
    d.field_u("acknowledgment_number", 32, &[])?;
    let data_offset = d.field_u("data_offset", 4, &[])?;
    d.field_u("reserved", 3, &[])?;
    d.field_bool("ns", &[])?;
    d.field_bool("cwr", &[])?;
    d.field_bool("ece", &[])?;
    d.field_bool("urg", &[])?;
    d.field_bool("ack", &[])?;
    d.field_bool("psh", &[])?;
    d.field_bool("rst", &[])?;
    d.field_bool("syn", &[])?;
    d.field_bool("fin", &[])?;
    d.field_u("window_size", 16, &[])?;
    d.field_u("checksum", 16, &[&ActualHex])?;
    d.field_u("urgent_pointer", 16, &[])?;

    if data_offset < 5 {
        return Err(d.fatal(format!("invalid data_offset {data_offset}")));
    }
    let options_len = (data_offset - 5) * 32;
    if options_len > 0 {
        d.framed(options_len, |d| {
            d.field_array("options", |d| {
                while !d.end() {
                    d.field_struct("option", |d| {
                        let kind = d.field_u("kind", 8, &[&OPTIONS])?;
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

    d.field_raw_len("payload", d.bits_left(), &[])?;

    Ok(None)
}
