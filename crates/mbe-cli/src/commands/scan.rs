//! Scan command - poll parameters and print them as a table

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use mbe_proto::{CanTransport, MbeError, ParamSet, Session, Snapshot};
use tracing::warn;

use crate::output::{value_rows, OutputContext, ValueRow};

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Show the raw hex column
    pub raw: bool,
    /// Stop after one poll cycle
    pub once: bool,
    /// Pause between cycles
    pub interval: Duration,
}

/// Identify, then poll `params` until Ctrl+C
///
/// Errors are logged and followed by a reopen and re-identify; the loop
/// keeps going. With `once`, the first error is returned instead.
pub async fn scan<T: CanTransport>(
    session: &mut Session<T>,
    params: &ParamSet,
    opts: ScanOptions,
    ctx: &OutputContext,
) -> Result<()> {
    scan_until(session, params, opts, ctx, tokio::signal::ctrl_c()).await
}

/// Like [`scan`], stopping as soon as `shutdown` completes
///
/// `shutdown` is watched for the whole run, including while an exchange
/// is in flight. An interrupted exchange is abandoned.
pub async fn scan_until<T, F>(
    session: &mut Session<T>,
    params: &ParamSet,
    opts: ScanOptions,
    ctx: &OutputContext,
    shutdown: F,
) -> Result<()>
where
    T: CanTransport,
    F: Future,
{
    if params.is_empty() {
        ctx.warn("No parameters to scan");
        return Ok(());
    }

    let cycles = poll_cycles(session, params, opts, ctx);
    tokio::select! {
        result = cycles => result,
        _ = shutdown => {
            ctx.info("\nStopping scan");
            Ok(())
        }
    }
}

async fn poll_cycles<T: CanTransport>(
    session: &mut Session<T>,
    params: &ParamSet,
    opts: ScanOptions,
    ctx: &OutputContext,
) -> Result<()> {
    match session.identify().await {
        Ok(serial) => ctx.info(&format!("ECU version {}", serial.trim_end_matches('\0'))),
        Err(e) if opts.once => return Err(e).context("Failed to identify ECU"),
        Err(e) => recover(session, &e, ctx).await,
    }

    if !opts.once {
        ctx.info("Press Ctrl+C to stop");
    }

    let mut last: Option<Snapshot> = None;
    loop {
        match session.poll_all(params).await {
            Ok(snapshot) => {
                print_snapshot(params, &snapshot, opts.raw, ctx);
                last = Some(snapshot);
            }
            Err(e) if opts.once => return Err(e).context("Failed to read parameters"),
            Err(e) => {
                recover(session, &e, ctx).await;
                // Blanked once older than STALE_AFTER
                if let Some(snapshot) = &last {
                    print_snapshot(params, snapshot, opts.raw, ctx);
                }
            }
        }

        if opts.once {
            return Ok(());
        }
        tokio::time::sleep(opts.interval).await;
    }
}

async fn recover<T: CanTransport>(session: &mut Session<T>, err: &MbeError, ctx: &OutputContext) {
    ctx.error(&format!("! {}", err));
    match session.recover().await {
        Ok(serial) => ctx.info(&format!("ECU version {}", serial.trim_end_matches('\0'))),
        Err(e) => warn!(error = %e, "Reconnect failed"),
    }
}

fn print_snapshot(params: &ParamSet, snapshot: &Snapshot, raw: bool, ctx: &OutputContext) {
    let rows = value_rows(params.params(), snapshot);
    if raw {
        ctx.print(&rows);
    } else {
        let rows: Vec<ValueRow> = rows.into_iter().map(ValueRow::from).collect();
        ctx.print(&rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbe_proto::{Connection, MockTransport, Param, ECU_ID, TOOL_ID};
    use tokio::time::Instant;

    async fn session(transport: &MockTransport) -> Session<MockTransport> {
        let conn = Connection::open(transport.clone(), "vcan0", ECU_ID, TOOL_ID)
            .await
            .unwrap();
        Session::new(conn).with_request_delay(Duration::ZERO)
    }

    fn once() -> ScanOptions {
        ScanOptions {
            raw: true,
            once: true,
            interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_scan_once_reads_each_page() {
        let transport = MockTransport::default();
        let mut session = session(&transport).await;
        let params = ParamSet::new(vec![
            Param::new("a", 2, &[1]),
            Param::new("b", 1, &[4, 3]),
        ]);

        scan(&mut session, &params, once(), &OutputContext::new(true, true))
            .await
            .unwrap();

        // Identify, then one read per page
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1][5..], [1, 3, 4]);
        assert_eq!(requests[2][5..], [2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_once_returns_first_error() {
        let transport = MockTransport::silent();
        let mut session = session(&transport).await;
        let params = ParamSet::new(vec![Param::new("a", 1, &[1])]);

        let err = scan(&mut session, &params, once(), &OutputContext::new(true, true))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<MbeError>(), Some(&MbeError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_poll_stops_scan() {
        let transport = MockTransport::default();
        let conn = Connection::open(transport.clone(), "vcan0", ECU_ID, TOOL_ID)
            .await
            .unwrap();
        let mut session = Session::new(conn).with_request_delay(Duration::from_millis(300));
        let params = ParamSet::new(vec![Param::new("a", 1, &[1])]);
        let opts = ScanOptions {
            raw: false,
            once: false,
            interval: Duration::from_millis(10),
        };

        // Identify ends at 300 ms, the first poll at 600 ms, and the second
        // poll is still in its request delay at 750 ms
        let start = Instant::now();
        let shutdown = tokio::time::sleep(Duration::from_millis(750));
        scan_until(
            &mut session,
            &params,
            opts,
            &OutputContext::new(true, true),
            shutdown,
        )
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(750));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_without_params_does_nothing() {
        let transport = MockTransport::default();
        let mut session = session(&transport).await;

        scan(
            &mut session,
            &ParamSet::new(Vec::new()),
            once(),
            &OutputContext::new(true, true),
        )
        .await
        .unwrap();
        assert!(transport.requests().is_empty());
    }
}
