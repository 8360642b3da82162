//! FLAC formats: the metadata block container and the stream info block.

pub mod metadatablock;
pub mod streaminfo;
