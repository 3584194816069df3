mod config;
mod format;
mod guids;
mod library;
mod raw_encoder;

pub use library::Library;
pub use raw_encoder::RawEncoder;
