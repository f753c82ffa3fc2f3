//! Mock transport adapter for testing
//!
//! An in-memory bus with a simulated ECU attached. Frames the tool sends on
//! [`TOOL_ID`] are reassembled, answered by a [`FakeEcu`] and the reply is
//! queued as frames from [`ECU_ID`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{CanHandle, CanTransport, TransportError};
use crate::codec::{self, Reassembler};
use crate::frame::Frame;
use crate::protocol::{ECU_ID, TOOL_ID};
use crate::simulator::FakeEcu;

struct MockState {
    /// `None` simulates an ECU that never answers
    ecu: Option<FakeEcu>,
    ecu_rx: Reassembler,
    inbound: VecDeque<Frame>,
    sent: Vec<Frame>,
    requests: Vec<Vec<u8>>,
    opens: usize,
    fail_opens: usize,
    fail_sends: usize,
}

struct MockBus {
    state: Mutex<MockState>,
    inbound_ready: Notify,
}

/// Mock transport adapter for testing
///
/// Clones share the same bus, so a test can keep one clone to inspect and
/// script the bus while the connection owns another.
#[derive(Clone)]
pub struct MockTransport {
    bus: Arc<MockBus>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(FakeEcu::default())
    }
}

impl MockTransport {
    pub fn new(ecu: FakeEcu) -> Self {
        Self::with_ecu(Some(ecu))
    }

    /// A bus with no ECU attached; every receive waits forever
    pub fn silent() -> Self {
        Self::with_ecu(None)
    }

    fn with_ecu(ecu: Option<FakeEcu>) -> Self {
        Self {
            bus: Arc::new(MockBus {
                state: Mutex::new(MockState {
                    ecu,
                    ecu_rx: Reassembler::new(),
                    inbound: VecDeque::new(),
                    sent: Vec::new(),
                    requests: Vec::new(),
                    opens: 0,
                    fail_opens: 0,
                    fail_sends: 0,
                }),
                inbound_ready: Notify::new(),
            }),
        }
    }

    /// Queue a raw frame for the tool to receive
    pub fn inject(&self, frame: Frame) {
        self.bus.state.lock().inbound.push_back(frame);
        self.bus.inbound_ready.notify_one();
    }

    /// Queue a raw frame from the ECU identifier
    pub fn inject_from_ecu(&self, bytes: &[u8]) {
        self.inject(Frame::from_bytes(ECU_ID, true, bytes));
    }

    /// Update a value in the simulated ECU's memory
    pub fn set_value(&self, page: u8, offset: u8, value: u8) {
        if let Some(ecu) = self.bus.state.lock().ecu.as_mut() {
            ecu.set_value(page, offset, value);
        }
    }

    /// Make the next `n` opens fail
    pub fn fail_next_opens(&self, n: usize) {
        self.bus.state.lock().fail_opens = n;
    }

    /// Make the next `n` frame transmissions fail
    pub fn fail_next_sends(&self, n: usize) {
        self.bus.state.lock().fail_sends = n;
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.bus.state.lock().opens
    }

    /// Every frame the tool has transmitted
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.bus.state.lock().sent.clone()
    }

    /// Every complete request the simulated ECU has received, in order
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.bus.state.lock().requests.clone()
    }
}

#[async_trait]
impl CanTransport for MockTransport {
    type Handle = MockHandle;

    async fn open(&self, device: &str) -> Result<MockHandle, TransportError> {
        let mut state = self.bus.state.lock();
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(TransportError::ConnectionFailed(format!(
                "Mock device {} unavailable",
                device
            )));
        }

        // A fresh socket does not see frames queued for the previous one
        state.opens += 1;
        state.inbound.clear();
        state.ecu_rx = Reassembler::new();
        tracing::debug!(device, opens = state.opens, "Mock transport: opened");

        Ok(MockHandle {
            bus: self.bus.clone(),
            open: true,
        })
    }
}

/// Handle onto a [`MockTransport`] bus
pub struct MockHandle {
    bus: Arc<MockBus>,
    open: bool,
}

#[async_trait]
impl CanHandle for MockHandle {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::ConnectionClosed);
        }

        let mut state = self.bus.state.lock();
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return Err(TransportError::SendFailed("Mock send failure".to_string()));
        }
        state.sent.push(*frame);

        if frame.id != TOOL_ID {
            return Ok(());
        }

        let request = match state.ecu_rx.feed(&frame.data) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Mock transport: ECU could not reassemble frame");
                return Ok(());
            }
        };
        state.requests.push(request.clone());

        let reply = state.ecu.as_ref().and_then(|ecu| ecu.respond(&request));
        if let Some(reply) = reply {
            let frames = codec::encode(&reply)
                .map_err(|e| TransportError::SendFailed(format!("Mock ECU reply: {}", e)))?;
            state
                .inbound
                .extend(frames.into_iter().map(|p| Frame::new(ECU_ID, p)));
            self.bus.inbound_ready.notify_one();
        }

        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            if !self.open {
                return Err(TransportError::ConnectionClosed);
            }
            let next = self.bus.state.lock().inbound.pop_front();
            if let Some(frame) = next {
                return Ok(frame);
            }
            self.bus.inbound_ready.notified().await;
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open = false;
        Ok(())
    }
}
