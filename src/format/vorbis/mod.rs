//! Vorbis formats: the comment header shared by Vorbis and FLAC streams.

pub mod comment;
