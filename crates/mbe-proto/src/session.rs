//! Request/response session
//!
//! Drives one exchange at a time over a [`Connection`]: identify, page
//! reads and full parameter polls.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::decode::{decode_all, PageData, ParamSet, ParamValue};
use crate::error::MbeResult;
use crate::protocol::{data_request, parse_data_response, parse_version_response, VERSION_REQUEST};
use crate::transport::CanTransport;

/// Pause before each request unless overridden
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(50);

/// Age after which a snapshot should no longer be shown
pub const STALE_AFTER: Duration = Duration::from_secs(3);

/// Decoded values from one poll cycle
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// When the last page read of the cycle completed
    pub taken_at: Instant,
    /// Decoded values keyed by parameter id
    pub values: HashMap<String, ParamValue>,
    /// Raw bytes the values were decoded from
    pub data: PageData,
}

impl Snapshot {
    pub fn get(&self, id: &str) -> Option<&ParamValue> {
        self.values.get(id)
    }

    pub fn age(&self) -> Duration {
        self.taken_at.elapsed()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// A diagnostic session with one ECU
///
/// Exchanges are strictly sequential. The session never retries on its own;
/// callers decide when to [`recover`](Session::recover).
pub struct Session<T: CanTransport> {
    conn: Connection<T>,
    request_delay: Duration,
}

impl<T: CanTransport> Session<T> {
    pub fn new(conn: Connection<T>) -> Self {
        Self {
            conn,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }

    pub fn into_connection(self) -> Connection<T> {
        self.conn
    }

    async fn exchange(&mut self, request: &[u8]) -> MbeResult<Vec<u8>> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        self.conn.send(request).await?;
        self.conn.recv().await
    }

    /// Ask the ECU for its serial, as the bytes it sent
    pub async fn identify_raw(&mut self) -> MbeResult<Vec<u8>> {
        let response = self.exchange(&VERSION_REQUEST).await?;
        let serial = parse_version_response(&response)?.to_vec();
        info!(
            serial = %String::from_utf8_lossy(&serial).trim_end_matches('\0'),
            "ECU identified"
        );
        Ok(serial)
    }

    /// Ask the ECU for its serial as text
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD; use
    /// [`identify_raw`](Self::identify_raw) for the exact bytes.
    pub async fn identify(&mut self) -> MbeResult<String> {
        let serial = self.identify_raw().await?;
        Ok(String::from_utf8_lossy(&serial).into_owned())
    }

    /// Read `offsets` from `page`
    ///
    /// The returned bytes line up with `offsets`. The ECU may return fewer
    /// bytes than requested; no length check is made here.
    pub async fn read_page(&mut self, page: u8, offsets: &[u8]) -> MbeResult<Vec<u8>> {
        let response = self.exchange(&data_request(page, offsets)).await?;
        let values = parse_data_response(&response)?;
        if values.len() != offsets.len() {
            debug!(
                page,
                requested = offsets.len(),
                received = values.len(),
                "Short or long page read"
            );
        }
        Ok(values.to_vec())
    }

    /// Read every page `params` needs, one request at a time, and decode
    pub async fn poll_all(&mut self, params: &ParamSet) -> MbeResult<Snapshot> {
        let mut data = PageData::new();
        for request in params.pages() {
            let values = self.read_page(request.page, &request.offsets).await?;
            for (&offset, &value) in request.offsets.iter().zip(values.iter()) {
                data.insert(request.page, offset, value);
            }
        }

        let values = decode_all(params.params(), &data);
        debug!(
            pages = params.pages().len(),
            params = values.len(),
            "Poll cycle complete"
        );

        Ok(Snapshot {
            taken_at: Instant::now(),
            values,
            data,
        })
    }

    /// Reopen the connection and identify again
    pub async fn recover(&mut self) -> MbeResult<String> {
        warn!(device = %self.conn.device(), "Recovering ECU session");
        self.conn.reopen().await?;
        self.identify().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Param;
    use crate::protocol::{ECU_ID, TOOL_ID};
    use crate::simulator::FakeEcu;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    async fn session(transport: &MockTransport) -> Session<MockTransport> {
        let conn = Connection::open(transport.clone(), "vcan0", ECU_ID, TOOL_ID)
            .await
            .unwrap();
        Session::new(conn).with_request_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_identify_returns_serial_verbatim() {
        let transport = MockTransport::default();
        let mut session = session(&transport).await;
        assert_eq!(session.identify().await.unwrap(), "#959bd804\0");
    }

    #[tokio::test]
    async fn test_identify_raw_keeps_non_utf8_bytes() {
        let serial = vec![0x41, 0xFF, 0xC3, 0x00];
        let transport = MockTransport::new(FakeEcu::new().with_serial(serial.clone()));
        let mut session = session(&transport).await;

        assert_eq!(session.identify_raw().await.unwrap(), serial);
        assert_eq!(session.identify().await.unwrap(), "A\u{FFFD}\u{FFFD}\0");
    }

    #[tokio::test]
    async fn test_read_page_sends_request_and_strips_prefix() {
        let transport = MockTransport::new(FakeEcu::new().with_value(0xF8, 0x10, 0xAB));
        let mut session = session(&transport).await;

        let values = session.read_page(0xF8, &[0x10, 0x11]).await.unwrap();
        assert_eq!(values, vec![0xAB, 0x11]);
        assert_eq!(
            transport.requests(),
            vec![vec![0x01, 0x00, 0x00, 0x00, 0x00, 0xF8, 0x10, 0x11]]
        );
    }

    #[tokio::test]
    async fn test_poll_all_decodes_every_param() {
        let transport = MockTransport::new(
            FakeEcu::new()
                .with_value(0xF8, 0x7D, 0x0B)
                .with_value(0xF8, 0x7C, 0xB8),
        );
        let mut session = session(&transport).await;
        let params = ParamSet::new(vec![
            Param::new("rpm", 0xF8, &[0x7D, 0x7C]),
            Param::new("echo", 0xE2, &[0x05]),
        ]);

        let snapshot = session.poll_all(&params).await.unwrap();
        assert_eq!(snapshot.get("rpm").unwrap().value, "3000");
        assert_eq!(snapshot.get("echo").unwrap().value, "5");
        assert_eq!(snapshot.data.len(), 3);
        assert!(snapshot.get("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_delay_precedes_each_exchange() {
        let transport = MockTransport::default();
        let conn = Connection::open(transport.clone(), "vcan0", ECU_ID, TOOL_ID)
            .await
            .unwrap();
        let mut session = Session::new(conn);
        assert_eq!(session.request_delay(), DEFAULT_REQUEST_DELAY);

        let start = Instant::now();
        session.identify().await.unwrap();
        session.read_page(1, &[1]).await.unwrap();
        assert!(start.elapsed() >= DEFAULT_REQUEST_DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_goes_stale() {
        let transport = MockTransport::default();
        let mut session = session(&transport).await;
        let params = ParamSet::new(vec![Param::new("a", 1, &[1])]);

        let snapshot = session.poll_all(&params).await.unwrap();
        assert!(!snapshot.is_stale(STALE_AFTER));

        tokio::time::advance(STALE_AFTER + Duration::from_millis(1)).await;
        assert!(snapshot.is_stale(STALE_AFTER));
    }
}
