//! Ver command - identify the ECU

use anyhow::{Context, Result};
use mbe_proto::{CanTransport, Session};

use crate::output::OutputContext;

/// Ask the ECU for its serial and print it
pub async fn ver<T: CanTransport>(session: &mut Session<T>, ctx: &OutputContext) -> Result<String> {
    let serial = session
        .identify()
        .await
        .context("Failed to identify ECU")?;

    let printable = serial.trim_end_matches('\0').to_string();
    ctx.print_kv(&[
        ("Device", session.connection().device().to_string()),
        ("ECU version", printable.clone()),
    ]);
    Ok(printable)
}
