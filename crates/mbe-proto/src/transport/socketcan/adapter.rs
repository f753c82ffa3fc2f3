//! Raw SocketCAN transport
//!
//! The socket is opened non-blocking and polled from the runtime, so a
//! pending receive can be abandoned by the caller's timeout at any point.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame as _, Socket, StandardId};
use tracing::debug;

use crate::frame::Frame;
use crate::transport::{CanHandle, CanTransport, TransportError};

/// How long to back off when the socket has nothing to read
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Opens raw CAN sockets by interface name
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketCanTransport;

#[async_trait]
impl CanTransport for SocketCanTransport {
    type Handle = SocketCanHandle;

    async fn open(&self, device: &str) -> Result<SocketCanHandle, TransportError> {
        let socket = CanSocket::open(device).map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to open CAN socket on {}: {}",
                device, e
            ))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;

        debug!(device, "Opened raw CAN socket");
        Ok(SocketCanHandle {
            socket: Some(socket),
        })
    }
}

/// An open raw CAN socket
pub struct SocketCanHandle {
    socket: Option<CanSocket>,
}

impl SocketCanHandle {
    fn socket(&self) -> Result<&CanSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::ConnectionClosed)
    }
}

#[async_trait]
impl CanHandle for SocketCanHandle {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let can_frame = to_can_frame(frame)?;
        loop {
            match self.socket()?.write_frame(&can_frame) {
                Ok(()) => return Ok(()),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    // Transmit queue full
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(TransportError::SendFailed(e.to_string())),
            }
        }
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.socket()?.read_frame() {
                Ok(CanFrame::Data(f)) => {
                    return Ok(Frame::from_bytes(f.raw_id(), f.is_extended(), f.data()));
                }
                Ok(other) => {
                    debug!(
                        can_id = format!("0x{:08X}", other.raw_id()),
                        "Skipping non-data frame"
                    );
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the socket closes the file descriptor
        self.socket.take();
        Ok(())
    }
}

fn to_can_frame(frame: &Frame) -> Result<CanFrame, TransportError> {
    let can_frame = if frame.extended {
        let id = ExtendedId::new(frame.id).ok_or_else(|| {
            TransportError::InvalidConfig(format!("Invalid extended CAN ID: 0x{:X}", frame.id))
        })?;
        CanFrame::new(id, frame.payload())
    } else {
        let id = u16::try_from(frame.id)
            .ok()
            .and_then(StandardId::new)
            .ok_or_else(|| {
                TransportError::InvalidConfig(format!("Invalid standard CAN ID: 0x{:X}", frame.id))
            })?;
        CanFrame::new(id, frame.payload())
    };

    can_frame.ok_or_else(|| {
        TransportError::SendFailed(format!("Invalid CAN frame length: {}", frame.len))
    })
}
