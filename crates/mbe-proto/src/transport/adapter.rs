//! Transport traits

use async_trait::async_trait;

use super::TransportError;
use crate::frame::Frame;

/// Opens handles onto a CAN bus
///
/// A transport is a factory: the connection keeps it around so that a
/// broken handle can be replaced by a fresh one on the same device.
#[async_trait]
pub trait CanTransport: Send + Sync {
    type Handle: CanHandle;

    /// Open the named device (e.g. "can0")
    async fn open(&self, device: &str) -> Result<Self::Handle, TransportError>;
}

/// An open CAN bus handle
///
/// Handles see every frame on the bus; filtering by identifier happens
/// in the connection.
#[async_trait]
pub trait CanHandle: Send {
    /// Transmit one frame
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Wait for the next frame
    ///
    /// Deadlines are applied by the caller; implementations may wait
    /// indefinitely but must be cancel-safe.
    async fn recv(&mut self) -> Result<Frame, TransportError>;

    /// Release the handle
    async fn close(&mut self) -> Result<(), TransportError>;
}
