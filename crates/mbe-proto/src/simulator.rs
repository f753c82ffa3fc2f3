//! Simulated MBE ECU
//!
//! Answers identify and data-read requests from an in-memory page map.
//! Used by the mock transport and by `mbe fake` to stand in for a real ECU.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::protocol::{
    parse_data_request, DATA_RESPONSE_PREFIX, VERSION_REQUEST, VERSION_RESPONSE_PREFIX,
};

/// Serial reported by a simulated ECU unless configured otherwise
pub const DEFAULT_SERIAL: &[u8] = b"#959bd804\0";

/// An ECU simulator
///
/// Offsets with no configured value read back as the offset byte itself,
/// which makes it easy to see which address a value came from.
#[derive(Debug, Clone)]
pub struct FakeEcu {
    serial: Vec<u8>,
    memory: HashMap<(u8, u8), u8>,
}

impl Default for FakeEcu {
    fn default() -> Self {
        Self {
            serial: DEFAULT_SERIAL.to_vec(),
            memory: HashMap::new(),
        }
    }
}

impl FakeEcu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serial(mut self, serial: impl Into<Vec<u8>>) -> Self {
        self.serial = serial.into();
        self
    }

    pub fn with_value(mut self, page: u8, offset: u8, value: u8) -> Self {
        self.set_value(page, offset, value);
        self
    }

    pub fn set_value(&mut self, page: u8, offset: u8, value: u8) {
        self.memory.insert((page, offset), value);
    }

    /// Value stored at (page, offset)
    pub fn value(&self, page: u8, offset: u8) -> u8 {
        self.memory.get(&(page, offset)).copied().unwrap_or(offset)
    }

    /// Build the reply to one request, or `None` if the request is not understood
    pub fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        if request == VERSION_REQUEST {
            debug!("Simulated ECU: version request");
            let mut response = VERSION_RESPONSE_PREFIX.to_vec();
            response.extend_from_slice(&self.serial);
            return Some(response);
        }

        if let Some(req) = parse_data_request(request) {
            debug!(
                page = format!("0x{:02X}", req.page),
                offsets = %hex::encode(req.offsets),
                "Simulated ECU: data request"
            );
            let mut response = DATA_RESPONSE_PREFIX.to_vec();
            response.extend(req.offsets.iter().map(|&o| self.value(req.page, o)));
            return Some(response);
        }

        warn!(request = %hex::encode(request), "Simulated ECU: unknown request");
        None
    }
}
