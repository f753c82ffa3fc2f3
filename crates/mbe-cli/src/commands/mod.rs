//! Command implementations for mbe

pub mod bcast;
pub mod fake;
pub mod scan;
pub mod ver;

pub use bcast::bcast;
pub use fake::fake;
pub use scan::{scan, ScanOptions};
pub use ver::ver;
