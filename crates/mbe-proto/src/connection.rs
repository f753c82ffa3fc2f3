//! Connection manager
//!
//! Owns the transport handle, the receive/transmit identifiers and the
//! per-call timeout. Messages go through the codec on the way out and are
//! reassembled from frames on the way in.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codec::{self, Reassembler};
use crate::error::{MbeError, MbeResult};
use crate::frame::Frame;
use crate::transport::{CanHandle, CanTransport, TransportError};

/// Timeout applied to each send and each receive unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// A half-duplex message connection to one ECU
///
/// Every operation takes `&mut self`, so one connection can only have a
/// single exchange in flight. Share it across tasks behind a mutex.
pub struct Connection<T: CanTransport> {
    transport: T,
    device: String,
    /// Identifier to accept frames from
    rx_id: u32,
    /// Identifier to send frames as
    tx_id: u32,
    timeout: Duration,
    handle: Option<T::Handle>,
}

impl<T: CanTransport> Connection<T> {
    /// Open `device` and bind the connection to a pair of identifiers
    pub async fn open(
        transport: T,
        device: impl Into<String>,
        rx_id: u32,
        tx_id: u32,
    ) -> MbeResult<Self> {
        let device = device.into();
        let handle = transport.open(&device).await?;

        info!(
            device = %device,
            rx_id = format!("0x{:08X}", rx_id),
            tx_id = format!("0x{:08X}", tx_id),
            "Connection opened"
        );

        Ok(Self {
            transport,
            device,
            rx_id,
            tx_id,
            timeout: DEFAULT_TIMEOUT,
            handle: Some(handle),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn rx_id(&self) -> u32 {
        self.rx_id
    }

    pub fn tx_id(&self) -> u32 {
        self.tx_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Set the deadline applied to each subsequent send and receive
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Close the transport handle
    pub async fn close(&mut self) -> MbeResult<()> {
        if let Some(mut handle) = self.handle.take() {
            handle.close().await?;
            debug!(device = %self.device, "Connection closed");
        }
        Ok(())
    }

    /// Close and open again on the same device with the same identifiers
    ///
    /// Any partially received message is discarded with the old handle.
    pub async fn reopen(&mut self) -> MbeResult<()> {
        if let Err(e) = self.close().await {
            warn!(device = %self.device, error = %e, "Error closing connection before reopen");
        }
        let handle = self.transport.open(&self.device).await?;
        self.handle = Some(handle);
        info!(device = %self.device, "Connection reopened");
        Ok(())
    }

    fn handle(&mut self) -> MbeResult<&mut T::Handle> {
        self.handle
            .as_mut()
            .ok_or(MbeError::Transport(TransportError::ConnectionClosed))
    }

    /// Send one message, split into as many frames as it needs
    ///
    /// Fails with [`MbeError::Size`] before touching the bus if the message
    /// is empty or longer than 4095 bytes.
    pub async fn send(&mut self, message: &[u8]) -> MbeResult<()> {
        let frames = codec::encode(message)?;
        let tx_id = self.tx_id;
        let timeout = self.timeout;
        let handle = self.handle()?;

        debug!(
            request = %hex::encode(message),
            frames = frames.len(),
            "Sending message"
        );

        tokio::time::timeout(timeout, async {
            for payload in frames {
                handle.send(&Frame::new(tx_id, payload)).await?;
            }
            Ok::<_, TransportError>(())
        })
        .await
        .map_err(|_| MbeError::Timeout)??;

        Ok(())
    }

    /// Receive one complete message from the receive identifier
    ///
    /// Frames from other identifiers are skipped. Reassembly starts fresh on
    /// every call.
    pub async fn recv(&mut self) -> MbeResult<Vec<u8>> {
        let rx_id = self.rx_id;
        let timeout = self.timeout;
        let handle = self.handle()?;
        let mut reassembler = Reassembler::new();

        let message = tokio::time::timeout(timeout, async {
            loop {
                let frame = handle.recv().await?;
                if frame.id != rx_id {
                    continue;
                }
                if let Some(message) = reassembler.feed(&frame.data)? {
                    return Ok::<_, MbeError>(message);
                }
            }
        })
        .await
        .map_err(|_| MbeError::Timeout)??;

        debug!(response = %hex::encode(&message), "Received message");
        Ok(message)
    }
}
