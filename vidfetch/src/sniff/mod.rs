pub mod collector;
pub mod sniffer;

pub use sniffer::StreamSniffer;
