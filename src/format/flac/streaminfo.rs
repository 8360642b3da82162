//! FLAC stream info block, returning the stream parameters as an out-argument.

use crate::{
    decode::Decoder,
    format::{names, FlacStreamInfo, FlacStreaminfoOut},
    registry::{Format, InArg, OutArg},
    Result,
};

/// FLAC stream info block.
pub static FORMAT: Format = Format {
    name: names::FLAC_STREAMINFO,
    description: "FLAC streaminfo",
    probe_order: 0,
    groups: &[],
    dependencies: &[],
    decode_fn: decode_streaminfo,
    root_array: false,
    root_name: None,
    functions: &[],
    help: None,
};

fn decode_streaminfo(d: &mut Decoder<'_>, _in_arg: InArg<'_>) -> Result<OutArg> {
    d.field_u("minimum_block_size", 16, &[])?;
    d.field_u("maximum_block_size", 16, &[])?;
    d.field_u("minimum_frame_size", 24, &[])?;
    d.field_u("maximum_frame_size", 24, &[])?;
    let sample_rate = d.field_u("sample_rate", 20, &[])?;
    // channels and bits per sample are stored off by one
    d.field_u_fn("channels", |d| Ok(d.u(3)? + 1), &[])?;
    let bits_per_sample = d.field_u_fn("bits_per_sample", |d| Ok(d.u(5)? + 1), &[])?;
    let total_samples_in_stream = d.field_u("total_samples_in_stream", 36, &[])?;
    d.field_raw_len("md5", 16 * 8, &[])?;

    Ok(Some(Box::new(FlacStreaminfoOut {
        stream_info: FlacStreamInfo {
            sample_rate,
            bits_per_sample,
            total_samples_in_stream,
        },
    })))
}
