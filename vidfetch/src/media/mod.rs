pub mod ffmpeg;
pub mod probe;
pub mod transcode;

#[cfg(all(test, unix))]
pub(crate) mod testing;

pub use transcode::Transcoder;
