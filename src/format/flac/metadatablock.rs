//! FLAC metadata block: header plus a body dispatched on the block type.

use crate::{
    decode::Decoder,
    format::{names, FlacMetadatablockOut, FlacStreaminfoOut},
    registry::{Dependency, Format, InArg, OutArg},
    scalar::mappers::{SymEntry, UToScalar, UToSymStr},
    Result,
};

/// FLAC metadata block.
pub static FORMAT: Format = Format {
    name: names::FLAC_METADATABLOCK,
    description: "FLAC metadatablock",
    probe_order: 0,
    groups: &[],
    dependencies: &[
        Dependency {
            names: &[names::FLAC_STREAMINFO],
        },
        Dependency {
            names: &[names::VORBIS_COMMENT],
        },
    ],
    decode_fn: decode_metadatablock,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

const BLOCK_STREAMINFO: u64 = 0;
const BLOCK_PADDING: u64 = 1;
const BLOCK_APPLICATION: u64 = 2;
const BLOCK_SEEKTABLE: u64 = 3;
const BLOCK_VORBIS_COMMENT: u64 = 4;
const BLOCK_CUESHEET: u64 = 5;
const BLOCK_PICTURE: u64 = 6;

static BLOCK_NAMES: UToSymStr = UToSymStr(&[
    (BLOCK_STREAMINFO, "streaminfo"),
    (BLOCK_PADDING, "padding"),
    (BLOCK_APPLICATION, "application"),
    (BLOCK_SEEKTABLE, "seektable"),
    (BLOCK_VORBIS_COMMENT, "vorbis_comment"),
    (BLOCK_CUESHEET, "cuesheet"),
    (BLOCK_PICTURE, "picture"),
]);

static SAMPLE_NUMBER: UToScalar = UToScalar(&[(
    0xffff_ffff_ffff_ffff,
    SymEntry {
        sym: None,
        description: Some("Placeholder"),
    },
)]);

fn decode_metadatablock(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    let is_last_block = d.field_bool("last_block", &[])?;
    let block_type = d.field_u("type", 7, &[&BLOCK_NAMES])?;
    let length = d.field_u("length", 24, &[])?;

    let mut stream_info = None;
    match block_type {
        BLOCK_STREAMINFO => {
            let out = d.format(names::FLAC_STREAMINFO, InArg::NONE)?;
            let out = out
                .and_then(|out| out.downcast::<FlacStreaminfoOut>().ok())
                .ok_or_else(|| d.fatal("expected a stream info out-argument"))?;
            stream_info = Some(out.stream_info);
        }
        BLOCK_VORBIS_COMMENT => {
            d.field_format_len("comment", length * 8, names::VORBIS_COMMENT, InArg::NONE)?;
        }
        BLOCK_SEEKTABLE => {
            let seekpoint_count = length / 18;
            d.field_array("seekpoints", |d| {
                for _ in 0..seekpoint_count {
                    d.field_struct("seekpoint", |d| {
                        d.field_u("sample_number", 64, &[&SAMPLE_NUMBER])?;
                        d.field_u("offset", 64, &[])?;
                        d.field_u("number_of_samples", 16, &[])?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        BLOCK_APPLICATION => {
            if length < 4 {
                return Err(d.fatal(format!("application block length {length} too short")));
            }
            d.field_utf8("id", 4, &[])?;
            d.field_raw_len("data", (length - 4) * 8, &[])?;
        }
        _ => {
            d.field_raw_len("data", length * 8, &[])?;
        }
    }

    Ok(Some(Box::new(FlacMetadatablockOut {
        is_last_block,
        stream_info,
    })))
}
