//! MP4 formats: PlayReady PSSH box data.

pub mod pssh_playready;
