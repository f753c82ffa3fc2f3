//! Decoding raw page bytes into display values
//!
//! Converts the bytes read from each (page, offset) into the strings shown
//! to the user, based on each parameter's [`Decode`] mode.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{Decode, Param, Scale};

/// Offsets to read from one page in a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u8,
    /// Sorted ascending, no duplicates
    pub offsets: Vec<u8>,
}

/// Group the addresses of `params` by page
///
/// The result is sorted by page, and offsets within a page are sorted and
/// deduplicated, so it does not depend on parameter order.
pub fn page_requests(params: &[Param]) -> Vec<PageRequest> {
    let mut pages: BTreeMap<u8, BTreeSet<u8>> = BTreeMap::new();
    for param in params {
        pages
            .entry(param.page)
            .or_default()
            .extend(param.addr.iter().copied());
    }

    pages
        .into_iter()
        .map(|(page, offsets)| PageRequest {
            page,
            offsets: offsets.into_iter().collect(),
        })
        .collect()
}

/// A parameter list together with the page requests it needs
#[derive(Debug, Clone)]
pub struct ParamSet {
    params: Vec<Param>,
    pages: Vec<PageRequest>,
}

impl ParamSet {
    pub fn new(params: Vec<Param>) -> Self {
        let pages = page_requests(&params);
        Self { params, pages }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn pages(&self) -> &[PageRequest] {
        &self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Raw bytes read from the ECU, keyed by (page, offset)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageData {
    bytes: HashMap<(u8, u8), u8>,
}

impl PageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: u8, offset: u8, value: u8) {
        self.bytes.insert((page, offset), value);
    }

    /// Byte at (page, offset); addresses that were never read are zero
    pub fn get(&self, page: u8, offset: u8) -> u8 {
        self.bytes.get(&(page, offset)).copied().unwrap_or(0)
    }

    pub fn contains(&self, page: u8, offset: u8) -> bool {
        self.bytes.contains_key(&(page, offset))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A decoded parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue {
    /// Formatted display string
    pub value: String,
    /// Hex encoding of the bytes it was decoded from
    pub raw: String,
}

impl ParamValue {
    /// The decoded form, or the raw hex if `raw` is set
    pub fn display(&self, raw: bool) -> &str {
        if raw {
            &self.raw
        } else {
            &self.value
        }
    }
}

/// Decode one parameter from the page data
pub fn decode(param: &Param, data: &PageData) -> ParamValue {
    let mut v: u64 = 0;
    let mut x: u64 = 0;
    let mut bytes = Vec::with_capacity(param.addr.len());
    for &offset in &param.addr {
        let b = data.get(param.page, offset);
        v = (v << 8) | u64::from(b);
        x = (x << 8) | 0xFF;
        bytes.push(b);
    }

    let value = match &param.decode {
        Decode::Scaled(scale) => format_scaled(scale, v, x),
        Decode::Bitmask(bits) => format_bitmask(bits, v),
        Decode::Plain => v.to_string(),
    };

    ParamValue {
        value,
        raw: hex::encode(bytes),
    }
}

/// Decode every parameter, keyed by id
pub fn decode_all(params: &[Param], data: &PageData) -> HashMap<String, ParamValue> {
    params
        .iter()
        .map(|p| (p.id.clone(), decode(p, data)))
        .collect()
}

fn format_scaled(scale: &Scale, v: u64, x: u64) -> String {
    let range = scale.scale_max - scale.scale_min;
    let value = v as f32 * range / x as f32 + scale.scale_min;
    if scale.units.is_empty() {
        format!("{:.*}", scale.precision, value)
    } else {
        format!("{:.*} {}", scale.precision, value, scale.units)
    }
}

fn format_bitmask(bits: &BTreeMap<u16, String>, v: u64) -> String {
    let flags: Vec<String> = bits
        .iter()
        .filter(|&(&key, _)| key != 0 && v & u64::from(key) == u64::from(key))
        .map(|(key, label)| format!("{:x}: {}", key, label))
        .collect();

    if flags.is_empty() {
        let none = bits.get(&0).map(String::as_str).unwrap_or_default();
        format!("0: {} [{:x}]", none, v)
    } else {
        format!("{} [{:x}]", flags.join(", "), v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data(entries: &[(u8, u8, u8)]) -> PageData {
        let mut data = PageData::new();
        for &(page, offset, value) in entries {
            data.insert(page, offset, value);
        }
        data
    }

    fn temperature() -> Scale {
        Scale {
            units: "degC".to_string(),
            scale_min: -30.0,
            scale_max: 130.0,
            precision: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_page_grouping() {
        let params = vec![
            Param::new("a", 2, &[5, 3]),
            Param::new("b", 1, &[9]),
            Param::new("c", 2, &[3, 7]),
        ];
        assert_eq!(
            page_requests(&params),
            vec![
                PageRequest {
                    page: 1,
                    offsets: vec![9],
                },
                PageRequest {
                    page: 2,
                    offsets: vec![3, 5, 7],
                },
            ]
        );
    }

    #[test]
    fn test_page_grouping_is_order_independent() {
        let mut params = vec![
            Param::new("a", 2, &[5, 3]),
            Param::new("b", 1, &[9]),
            Param::new("c", 2, &[3, 7]),
        ];
        let forward = page_requests(&params);
        params.reverse();
        assert_eq!(page_requests(&params), forward);
        assert!(page_requests(&[]).is_empty());
    }

    #[test]
    fn test_scaled_single_byte() {
        // 128 * 160 / 255 - 30 = 50.31
        let param = Param::new("ct", 0xF8, &[0x45]).with_scale(temperature());
        let value = decode(&param, &data(&[(0xF8, 0x45, 128)]));
        assert_eq!(value.value, "50.3 degC");
        assert_eq!(value.raw, "80");
    }

    #[test]
    fn test_scaled_two_bytes_full_range() {
        let param = Param::new("ct", 0xF8, &[0x45, 0x44]).with_scale(temperature());
        let value = decode(&param, &data(&[(0xF8, 0x45, 0xFF), (0xF8, 0x44, 0xFF)]));
        assert_eq!(value.value, "130.0 degC");
        assert_eq!(value.raw, "ffff");
    }

    #[test]
    fn test_scaled_without_units() {
        let scale = Scale {
            scale_max: 16.0,
            precision: 2,
            ..Default::default()
        };
        let param = Param::new("tps", 0xF8, &[0x64]).with_scale(scale);
        let value = decode(&param, &data(&[(0xF8, 0x64, 255)]));
        assert_eq!(value.value, "16.00");
    }

    #[test]
    fn test_bitmask() {
        let param =
            Param::new("flags", 1, &[0x10]).with_bits([(0u16, "none"), (1, "A"), (2, "B")]);

        let value = decode(&param, &data(&[(1, 0x10, 3)]));
        assert_eq!(value.value, "1: A, 2: B [3]");

        let value = decode(&param, &data(&[(1, 0x10, 0)]));
        assert_eq!(value.value, "0: none [0]");
    }

    #[test]
    fn test_bitmask_keys_and_value_in_hex() {
        let param = Param::new("flags", 1, &[0x10, 0x11])
            .with_bits([(0x10u16, "ten"), (0x100, "hundred"), (0x3, "both")]);

        let value = decode(&param, &data(&[(1, 0x10, 0x01), (1, 0x11, 0x12)]));
        // 0x0112 has 0x10 and 0x100 set but only one of the 0x3 bits
        assert_eq!(value.value, "10: ten, 100: hundred [112]");
    }

    #[test]
    fn test_bitmask_without_zero_label() {
        let param = Param::new("flags", 1, &[0x10]).with_bits([(1u16, "A")]);
        let value = decode(&param, &data(&[]));
        assert_eq!(value.value, "0:  [0]");
    }

    #[test]
    fn test_plain_big_endian() {
        let param = Param::new("rpm", 0xF8, &[0x7D, 0x7C]);
        let value = decode(&param, &data(&[(0xF8, 0x7D, 0x0B), (0xF8, 0x7C, 0xB8)]));
        assert_eq!(value.value, "3000");
        assert_eq!(value.raw, "0bb8");
    }

    #[test]
    fn test_missing_addresses_read_as_zero() {
        let param = Param::new("rpm", 0xF8, &[0x7D, 0x7C]);
        let value = decode(&param, &data(&[(0xF8, 0x7C, 0x01), (0xF9, 0x7D, 0xFF)]));
        assert_eq!(value.value, "1");
        assert_eq!(value.raw, "0001");
    }

    #[test]
    fn test_display_raw_or_decoded() {
        let value = ParamValue {
            value: "50.3 degC".to_string(),
            raw: "80".to_string(),
        };
        assert_eq!(value.display(false), "50.3 degC");
        assert_eq!(value.display(true), "80");
    }

    #[test]
    fn test_decode_all_keys_by_id() {
        let params = vec![Param::new("a", 1, &[1]), Param::new("b", 1, &[2])];
        let values = decode_all(&params, &data(&[(1, 1, 7)]));
        assert_eq!(values["a"].value, "7");
        assert_eq!(values["b"].value, "0");
    }
}
