//! mbe-proto - MBE ECU diagnostic protocol over CAN
//!
//! This crate talks to MBE engine control units using the vendor
//! request/response dialect carried over extended-ID CAN frames.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Session                               │
//! │  identify / read_page / poll_all / recover                  │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │ Param       │  │ ParamSet    │  │ decode              │ │
//! │  │ (YAML)      │  │ (pages)     │  │ (scale/bits/plain)  │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! │                          │                                  │
//! │                    ┌─────┴─────┐                            │
//! │                    │Connection │                            │
//! │                    │(codec+ids)│                            │
//! │                    └─────┬─────┘                            │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │  CanTransport   │                         │
//! │                 │(SocketCAN/mock) │                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod connection;
pub mod decode;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod simulator;
pub mod transport;

pub use broadcast::Broadcast;
pub use codec::{CodecError, Reassembler, MAX_MESSAGE_SIZE};
pub use config::{load_params, parse_params, ConfigError, Decode, Param, Scale};
pub use connection::{Connection, DEFAULT_TIMEOUT};
pub use decode::{decode, decode_all, page_requests, PageData, PageRequest, ParamSet, ParamValue};
pub use error::{MbeError, MbeResult};
pub use frame::{Frame, FramePayload};
pub use protocol::{ProtocolError, ResponseKind, BROADCAST_ID, ECU_ID, TOOL_ID};
pub use session::{Session, Snapshot, DEFAULT_REQUEST_DELAY, STALE_AFTER};
pub use simulator::FakeEcu;
pub use transport::{CanHandle, CanTransport, MockTransport, TransportError};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use transport::socketcan::SocketCanTransport;
