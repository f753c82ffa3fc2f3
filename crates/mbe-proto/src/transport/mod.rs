//! Transport layer for raw CAN frames
//!
//! This module provides the bus abstraction the connection is built on:
//! - SocketCAN transport for real hardware (Linux only)
//! - Mock transport with a simulated ECU for testing
//!
//! # Example
//!
//! ```ignore
//! use mbe_proto::transport::{CanTransport, MockTransport};
//!
//! let transport = MockTransport::default();
//! let mut handle = transport.open("vcan0").await?;
//! let frame = handle.recv().await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::{CanHandle, CanTransport};
pub use error::TransportError;
pub use mock::{MockHandle, MockTransport};
