//! Bcast command - print decoded broadcast frames

use anyhow::{Context, Result};
use mbe_proto::{Broadcast, CanHandle, CanTransport};
use tracing::debug;

use crate::output::{broadcast_rows, OutputContext};

/// Listen on `device` and print every broadcast page until Ctrl+C
pub async fn bcast<T: CanTransport>(
    transport: &T,
    device: &str,
    ctx: &OutputContext,
) -> Result<()> {
    let mut handle = transport
        .open(device)
        .await
        .with_context(|| format!("Failed to open CAN device {}", device))?;

    ctx.info(&format!("Listening for broadcast frames on {}", device));
    ctx.info("Press Ctrl+C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let frame = tokio::select! {
            frame = handle.recv() => frame.context("Failed to receive CAN frame")?,
            _ = &mut shutdown => break,
        };

        match Broadcast::decode(&frame) {
            Some(broadcast) => ctx.print(&broadcast_rows(&broadcast)),
            None => debug!(can_id = format!("0x{:08X}", frame.id), "Ignoring frame"),
        }
    }

    handle.close().await.context("Failed to close CAN device")?;
    ctx.info("\nStopped");
    Ok(())
}
