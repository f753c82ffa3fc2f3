//! SocketCAN transport (Linux only)

mod adapter;

pub use adapter::{SocketCanHandle, SocketCanTransport};
