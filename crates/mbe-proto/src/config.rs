//! Parameter descriptors
//!
//! Parameters are loaded from a YAML list. Each entry names the page and
//! addresses to read and, optionally, how to turn the raw integer into a
//! display value:
//!
//! ```yaml
//! - id: coolant
//!   name: Coolant temperature
//!   page: 248
//!   addr: [69, 68]
//!   scale:
//!     units: degC
//!     scale_min: -30
//!     scale_max: 130
//!     precision: 1
//! - id: status
//!   name: Engine status
//!   page: 248
//!   addr: [120]
//!   bits:
//!     0: idle
//!     1: running
//!     2: limp
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Largest integer a parameter can be assembled into
const MAX_ADDRESSES: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid parameter '{id}': {reason}")]
    InvalidParam { id: String, reason: String },

    #[error("Duplicate parameter id: {0}")]
    DuplicateParam(String),
}

/// Linear scaling onto a physical range
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Scale {
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub scale_min: f32,
    #[serde(default)]
    pub scale_max: f32,
    /// Display hints; not used for decoding
    #[serde(default)]
    pub display_min: Option<f32>,
    #[serde(default)]
    pub display_max: Option<f32>,
    /// Decimal places
    #[serde(default)]
    pub precision: usize,
}

/// How a parameter's raw integer is rendered
#[derive(Debug, Clone, PartialEq)]
pub enum Decode {
    /// `v * (max - min) / x + min`, where `x` is the all-ones value for the width
    Scaled(Scale),
    /// Independent flag bits, keyed by mask; key 0 labels "no flags set"
    Bitmask(BTreeMap<u16, String>),
    /// Decimal integer
    Plain,
}

/// One readable ECU value
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub id: String,
    /// Display name
    pub name: String,
    pub description: Option<String>,
    pub page: u8,
    /// Offsets on `page`, most significant byte first
    pub addr: Vec<u8>,
    pub decode: Decode,
}

impl Param {
    /// A plain integer parameter, named after its id
    pub fn new(id: impl Into<String>, page: u8, addr: &[u8]) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            page,
            addr: addr.to_vec(),
            decode: Decode::Plain,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.decode = Decode::Scaled(scale);
        self
    }

    pub fn with_bits<K, V>(mut self, bits: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<u16>,
        V: Into<String>,
    {
        self.decode = Decode::Bitmask(
            bits.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// Parameter entry as written in the YAML file
#[derive(Debug, Deserialize)]
struct ParamDef {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    page: u8,
    #[serde(default)]
    addr: Vec<u8>,
    #[serde(default)]
    scale: Option<Scale>,
    #[serde(default)]
    bits: Option<BTreeMap<u16, String>>,
}

impl TryFrom<ParamDef> for Param {
    type Error = ConfigError;

    fn try_from(def: ParamDef) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| ConfigError::InvalidParam {
            id: def.id.clone(),
            reason: reason.to_string(),
        };
        if def.addr.is_empty() {
            return Err(invalid("no addresses"));
        }
        if def.addr.len() > MAX_ADDRESSES {
            return Err(invalid("more than 8 addresses"));
        }

        // A scale block only counts when it has a positive maximum
        let decode = match (def.scale, def.bits) {
            (Some(scale), _) if scale.scale_max > 0.0 => Decode::Scaled(scale),
            (_, Some(bits)) => Decode::Bitmask(bits),
            _ => Decode::Plain,
        };

        Ok(Param {
            name: def.name.unwrap_or_else(|| def.id.clone()),
            id: def.id,
            description: def.desc,
            page: def.page,
            addr: def.addr,
            decode,
        })
    }
}

/// Parse a YAML parameter list
pub fn parse_params(yaml: &str) -> Result<Vec<Param>, ConfigError> {
    let defs: Vec<ParamDef> = serde_yaml::from_str(yaml)?;

    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(defs.len());
    for def in defs {
        if !seen.insert(def.id.clone()) {
            return Err(ConfigError::DuplicateParam(def.id));
        }
        params.push(Param::try_from(def)?);
    }
    Ok(params)
}

/// Load a YAML parameter list from a file
pub fn load_params(path: impl AsRef<Path>) -> Result<Vec<Param>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let params = parse_params(&content)?;
    debug!(path = %path.display(), count = params.len(), "Loaded parameters");
    Ok(params)
}
