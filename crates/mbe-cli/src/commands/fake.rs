//! Fake command - answer requests as a simulated ECU

use anyhow::{Context, Result};
use mbe_proto::{CanTransport, Connection, FakeEcu, MbeError};
use tracing::{debug, warn};

use crate::output::OutputContext;

/// Serve `ecu` on the connection until Ctrl+C
///
/// The connection must be opened with the identifiers swapped: receiving
/// from the tool and transmitting as the ECU.
pub async fn fake<T: CanTransport>(
    conn: &mut Connection<T>,
    ecu: &FakeEcu,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Simulating ECU on {}", conn.device()));
    ctx.info("Press Ctrl+C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let request = tokio::select! {
            result = conn.recv() => result,
            _ = &mut shutdown => {
                ctx.info("\nStopping simulator");
                return Ok(());
            }
        };

        match serve_one(conn, ecu, request).await {
            Ok(()) => {}
            Err(MbeError::Timeout) => {}
            Err(e) if e.is_retriable() => {
                warn!(error = %e, "Bus error, reopening");
                conn.reopen().await.context("Failed to reopen CAN device")?;
            }
            Err(e) => warn!(error = %e, "Ignoring request"),
        }
    }
}

/// Answer one received request
async fn serve_one<T: CanTransport>(
    conn: &mut Connection<T>,
    ecu: &FakeEcu,
    request: Result<Vec<u8>, MbeError>,
) -> Result<(), MbeError> {
    let request = request?;
    match ecu.respond(&request) {
        Some(reply) => conn.send(&reply).await,
        None => {
            debug!("No reply for request");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbe_proto::{MockTransport, ECU_ID, TOOL_ID};

    #[tokio::test]
    async fn test_serve_one_replies_as_ecu() {
        // Frames sent as the ECU are not answered by the mock bus
        let transport = MockTransport::silent();
        let mut conn = Connection::open(transport.clone(), "vcan0", TOOL_ID, ECU_ID)
            .await
            .unwrap();

        serve_one(&mut conn, &FakeEcu::new(), Ok(vec![0x04, 0x00, 0x0D]))
            .await
            .unwrap();

        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|f| f.id == ECU_ID));
        assert_eq!(&sent[0].data[..5], &[0x10, 13, 0xE4, 0x00, 0x0D]);
    }

    #[tokio::test]
    async fn test_serve_one_ignores_unknown_requests() {
        let transport = MockTransport::silent();
        let mut conn = Connection::open(transport.clone(), "vcan0", TOOL_ID, ECU_ID)
            .await
            .unwrap();

        serve_one(&mut conn, &FakeEcu::new(), Ok(vec![0x22, 0xF1, 0x90]))
            .await
            .unwrap();
        assert!(transport.sent_frames().is_empty());
    }
}
