//! MBE request/response dialect
//!
//! Byte constants and pure helpers for building requests and checking
//! responses. Nothing here touches the bus.

use std::fmt;

use thiserror::Error;

/// CAN identifier the ECU transmits as
pub const ECU_ID: u32 = 0x0CBE0111;

/// CAN identifier of the diagnostic tool
pub const TOOL_ID: u32 = 0x0CBE1101;

/// CAN identifier of the ECU's unsolicited broadcast frames
pub const BROADCAST_ID: u32 = 0x0CBB0001;

/// Identify (version) request
pub const VERSION_REQUEST: [u8; 3] = [0x04, 0x00, 0x0D];

/// Prefix of a positive identify response
pub const VERSION_RESPONSE_PREFIX: [u8; 3] = [0xE4, 0x00, 0x0D];

/// Prefix of a data-read request, followed by the page and offsets
pub const DATA_REQUEST_PREFIX: [u8; 5] = [0x01, 0x00, 0x00, 0x00, 0x00];

/// Prefix of a positive data-read response
pub const DATA_RESPONSE_PREFIX: [u8; 1] = [0x81];

/// Which exchange a response belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Version,
    Data,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Version => write!(f, "version"),
            ResponseKind::Data => write!(f, "data"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Bad {kind} response: {data}")]
    BadResponse {
        kind: ResponseKind,
        /// Hex dump of the offending response
        data: String,
    },
}

impl ProtocolError {
    fn bad_response(kind: ResponseKind, data: &[u8]) -> Self {
        ProtocolError::BadResponse {
            kind,
            data: hex::encode(data),
        }
    }
}

/// Strip the prefix from an identify response
///
/// Everything after the prefix is returned verbatim, including any
/// trailing NUL.
pub fn parse_version_response(data: &[u8]) -> Result<&[u8], ProtocolError> {
    data.strip_prefix(&VERSION_RESPONSE_PREFIX[..])
        .ok_or_else(|| ProtocolError::bad_response(ResponseKind::Version, data))
}

/// Build a data-read request for `offsets` on `page`
pub fn data_request(page: u8, offsets: &[u8]) -> Vec<u8> {
    let mut request = Vec::with_capacity(DATA_REQUEST_PREFIX.len() + 1 + offsets.len());
    request.extend_from_slice(&DATA_REQUEST_PREFIX);
    request.push(page);
    request.extend_from_slice(offsets);
    request
}

/// Strip the prefix from a data-read response
///
/// The returned bytes line up positionally with the requested offsets.
pub fn parse_data_response(data: &[u8]) -> Result<&[u8], ProtocolError> {
    data.strip_prefix(&DATA_RESPONSE_PREFIX[..])
        .ok_or_else(|| ProtocolError::bad_response(ResponseKind::Data, data))
}

/// A data-read request as seen by the ECU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest<'a> {
    pub page: u8,
    pub offsets: &'a [u8],
}

/// Parse a data-read request (ECU side)
pub fn parse_data_request(data: &[u8]) -> Option<DataRequest<'_>> {
    let rest = data.strip_prefix(&DATA_REQUEST_PREFIX[..])?;
    let (&page, offsets) = rest.split_first()?;
    Some(DataRequest { page, offsets })
}
