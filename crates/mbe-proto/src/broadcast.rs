//! Unsolicited broadcast frames
//!
//! The ECU periodically transmits a handful of live values on
//! [`BROADCAST_ID`]. Byte 0 selects the page; the rest are fixed-scale
//! single-byte readings (rpm takes two bytes, little endian).

use crate::frame::Frame;
use crate::protocol::BROADCAST_ID;

/// One decoded broadcast frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Broadcast {
    /// Page 1
    Engine {
        coolant_c: f32,
        rpm: u16,
        load_pct: f32,
        throttle_pct: f32,
        battery_v: f32,
        intake_air_c: f32,
    },
    /// Page 2
    Manifold { pressure_kpa: f32 },
    /// Page 4
    Battery { battery_v: f32 },
}

fn temperature(b: u8) -> f32 {
    f32::from(b) * 160.0 / 255.0 - 30.0
}

fn percent(b: u8) -> f32 {
    f32::from(b) * 100.0 / 255.0
}

fn voltage(b: u8) -> f32 {
    f32::from(b) * 16.0 / 255.0 + 2.5
}

impl Broadcast {
    /// Decode a frame, or `None` if it is not a known broadcast page
    pub fn decode(frame: &Frame) -> Option<Self> {
        if frame.id != BROADCAST_ID {
            return None;
        }
        let d = &frame.data;
        match d[0] {
            1 => Some(Broadcast::Engine {
                coolant_c: temperature(d[1]),
                rpm: u16::from_le_bytes([d[2], d[3]]),
                load_pct: percent(d[4]),
                throttle_pct: percent(d[5]),
                battery_v: voltage(d[6]),
                intake_air_c: temperature(d[7]),
            }),
            2 => Some(Broadcast::Manifold {
                pressure_kpa: f32::from(d[5]) * 122.0 / 255.0,
            }),
            4 => Some(Broadcast::Battery {
                battery_v: voltage(d[1]),
            }),
            _ => None,
        }
    }

    /// The page number the value came from
    pub fn page(&self) -> u8 {
        match self {
            Broadcast::Engine { .. } => 1,
            Broadcast::Manifold { .. } => 2,
            Broadcast::Battery { .. } => 4,
        }
    }

    /// (label, formatted value) pairs for display
    pub fn readings(&self) -> Vec<(&'static str, String)> {
        match *self {
            Broadcast::Engine {
                coolant_c,
                rpm,
                load_pct,
                throttle_pct,
                battery_v,
                intake_air_c,
            } => vec![
                ("Coolant temperature", format!("{:.1} degC", coolant_c)),
                ("Engine speed", format!("{} rpm", rpm)),
                ("Calculated engine load", format!("{:.0} %", load_pct)),
                ("Throttle position", format!("{:.0} %", throttle_pct)),
                ("Battery voltage (1)", format!("{:.1} V", battery_v)),
                ("Intake air temperature", format!("{:.1} degC", intake_air_c)),
            ],
            Broadcast::Manifold { pressure_kpa } => {
                vec![("Manifold air pressure", format!("{:.0} kPa", pressure_kpa))]
            }
            Broadcast::Battery { battery_v } => {
                vec![("Battery voltage (2)", format!("{:.1} V", battery_v))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn frame(bytes: &[u8]) -> Frame {
        Frame::from_bytes(BROADCAST_ID, true, bytes)
    }

    #[test]
    fn test_engine_page() {
        let decoded = Broadcast::decode(&frame(&[1, 0, 0xB8, 0x0B, 255, 0, 255, 255])).unwrap();
        match decoded {
            Broadcast::Engine {
                coolant_c,
                rpm,
                load_pct,
                throttle_pct,
                battery_v,
                intake_air_c,
            } => {
                assert_eq!(coolant_c, -30.0);
                assert_eq!(rpm, 3000);
                assert_eq!(load_pct, 100.0);
                assert_eq!(throttle_pct, 0.0);
                assert!((battery_v - 18.5).abs() < 1e-4);
                assert!((intake_air_c - 130.0).abs() < 1e-4);
            }
            other => panic!("Expected engine page, got {:?}", other),
        }
        assert_eq!(decoded.page(), 1);
        assert_eq!(decoded.readings()[1], ("Engine speed", "3000 rpm".to_string()));
    }

    #[test]
    fn test_manifold_and_battery_pages() {
        assert_eq!(
            Broadcast::decode(&frame(&[2, 0, 0, 0, 0, 255, 0, 0])),
            Some(Broadcast::Manifold {
                pressure_kpa: 122.0
            })
        );
        assert_eq!(
            Broadcast::decode(&frame(&[4, 0])),
            Some(Broadcast::Battery { battery_v: 2.5 })
        );
    }

    #[rstest]
    #[case(frame(&[3, 1, 2, 3]))]
    #[case(frame(&[0]))]
    #[case(Frame::from_bytes(0x0CBE0111, true, &[1, 0, 0, 0, 0, 0, 0, 0]))]
    fn test_not_a_broadcast(#[case] input: Frame) {
        assert_eq!(Broadcast::decode(&input), None);
    }
}
