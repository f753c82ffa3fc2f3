//! Terminal output for mbe

use colored::Colorize;
use mbe_proto::{Broadcast, Param, Snapshot, STALE_AFTER};
use tabled::{Table, Tabled};

/// Context for output rendering
pub struct OutputContext {
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { quiet }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print rows as a table
    pub fn print<T: Tabled>(&self, rows: &[T]) {
        if rows.is_empty() {
            if !self.quiet {
                println!("No data");
            }
        } else {
            println!("{}", Table::new(rows));
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        for (key, value) in pairs {
            println!("{}: {}", key.bold(), value);
        }
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Parameter display for scan command
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct ValueRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Parameter display for scan --raw
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct RawValueRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Raw")]
    pub raw: String,
}

/// Shown for values that are missing or older than [`STALE_AFTER`]
const NO_VALUE: &str = "-";

/// One row per parameter, in parameter-list order
pub fn value_rows(params: &[Param], snapshot: &Snapshot) -> Vec<RawValueRow> {
    let stale = snapshot.is_stale(STALE_AFTER);
    params
        .iter()
        .map(|p| {
            let (value, raw) = snapshot
                .get(&p.id)
                .filter(|_| !stale)
                .map(|v| (v.value.clone(), v.raw.clone()))
                .unwrap_or_else(|| (NO_VALUE.to_string(), String::new()));
            RawValueRow {
                name: p.name.clone(),
                value,
                raw,
            }
        })
        .collect()
}

impl From<RawValueRow> for ValueRow {
    fn from(row: RawValueRow) -> Self {
        Self {
            name: row.name,
            value: row.value,
        }
    }
}

/// Broadcast reading display for bcast command
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct BroadcastRow {
    #[tabled(rename = "Page")]
    pub page: u8,
    #[tabled(rename = "Reading")]
    pub reading: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub fn broadcast_rows(broadcast: &Broadcast) -> Vec<BroadcastRow> {
    broadcast
        .readings()
        .into_iter()
        .map(|(reading, value)| BroadcastRow {
            page: broadcast.page(),
            reading: reading.to_string(),
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbe_proto::{decode_all, PageData};
    use std::time::Duration;

    fn params() -> Vec<Param> {
        vec![
            Param::new("b", 1, &[2]).with_name("Second"),
            Param::new("a", 1, &[1]).with_name("First"),
        ]
    }

    fn snapshot(params: &[Param]) -> Snapshot {
        let mut data = PageData::new();
        data.insert(1, 1, 0x10);
        data.insert(1, 2, 0x20);
        Snapshot {
            taken_at: tokio::time::Instant::now(),
            values: decode_all(params, &data),
            data,
        }
    }

    #[test]
    fn test_value_rows_follow_param_order() {
        let params = params();
        let snapshot = snapshot(&params);

        let rows = value_rows(&params, &snapshot);
        assert_eq!(
            rows,
            vec![
                RawValueRow {
                    name: "Second".to_string(),
                    value: "32".to_string(),
                    raw: "20".to_string(),
                },
                RawValueRow {
                    name: "First".to_string(),
                    value: "16".to_string(),
                    raw: "10".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_value_rows_mark_missing_values() {
        let snapshot = snapshot(&params());
        let rows = value_rows(&[Param::new("c", 2, &[1])], &snapshot);
        assert_eq!(rows[0].value, "-");
        assert_eq!(rows[0].raw, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_rows_blank_stale_snapshot() {
        let params = params();
        let snapshot = snapshot(&params);

        tokio::time::advance(STALE_AFTER).await;
        assert_eq!(value_rows(&params, &snapshot)[0].value, "32");

        tokio::time::advance(Duration::from_millis(1)).await;
        let rows = value_rows(&params, &snapshot);
        assert!(rows.iter().all(|r| r.value == "-" && r.raw.is_empty()));
        assert_eq!(rows[1].name, "First");
    }

    #[test]
    fn test_broadcast_rows() {
        let rows = broadcast_rows(&Broadcast::Battery { battery_v: 12.5 });
        assert_eq!(
            rows,
            vec![BroadcastRow {
                page: 4,
                reading: "Battery voltage (2)".to_string(),
                value: "12.5 V".to_string(),
            }]
        );
    }
}
