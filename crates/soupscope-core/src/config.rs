//! # Trace Configuration
//!
//! Geometry of a trace directory, loaded once per session before any
//! snapshot is touched.
//!
//! The simulation writes `metadata.txt` as newline-delimited `key=value`
//! pairs. Each value is read as an integer if possible, then as a float,
//! then kept verbatim. Recognised keys override the defaults; every other
//! key is preserved in [`TraceConfig::extra`] for display.

use crate::primitives::{
    DEFAULT_HALF_LEN, DEFAULT_NPAIRS, DEFAULT_SOUP_SIZE, MAX_HALF_LEN, METADATA_FILE,
};
use crate::{SoupError, Token};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// CONFIG VALUES
// =============================================================================

/// A metadata value after int -> float -> string interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    /// Interpret a raw value: integer first, then float, then string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Self::Float(f);
        }
        Self::Str(raw.to_string())
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Float(x) => write!(f, "{}", x),
            ConfigValue::Str(s) => f.write_str(s),
        }
    }
}

// =============================================================================
// TRACE CONFIG
// =============================================================================

/// Soup geometry plus any extra metadata the simulation recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Number of tapes in each soup snapshot.
    pub soup_size: usize,
    /// Tokens per tape.
    pub half_len: usize,
    /// Pairs interacting per epoch.
    pub npairs: usize,
    /// Unrecognised keys (seed, mutation rate, ...), sorted by key.
    pub extra: BTreeMap<String, ConfigValue>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            soup_size: DEFAULT_SOUP_SIZE,
            half_len: DEFAULT_HALF_LEN,
            npairs: DEFAULT_NPAIRS,
            extra: BTreeMap::new(),
        }
    }
}

impl TraceConfig {
    /// Length of the combined tape an interaction runs on.
    #[must_use]
    pub const fn tape_len(&self) -> usize {
        2 * self.half_len
    }

    /// Number of tokens in one soup snapshot.
    #[must_use]
    pub const fn soup_cells(&self) -> usize {
        self.soup_size.saturating_mul(self.half_len)
    }

    /// Load `metadata.txt` from a trace directory and merge it into the
    /// defaults. A missing file yields the defaults.
    pub fn load(trace_dir: impl AsRef<Path>) -> Result<Self, SoupError> {
        let path = trace_dir.as_ref().join(METADATA_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No {} in {:?}, using defaults", METADATA_FILE, trace_dir.as_ref());
                return Ok(Self::default());
            }
            Err(e) => return Err(SoupError::Io(format!("Read {:?}: {}", path, e))),
        };
        Self::from_metadata(&text)
    }

    /// Parse metadata text and merge it into the defaults.
    pub fn from_metadata(text: &str) -> Result<Self, SoupError> {
        let mut config = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, raw)) = line.split_once('=') else {
                tracing::warn!("Ignoring metadata line without '=': {:?}", line);
                continue;
            };
            config.set(key.trim(), ConfigValue::parse(raw.trim()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply one key. Geometry keys must be non-negative integers.
    fn set(&mut self, key: &str, value: ConfigValue) -> Result<(), SoupError> {
        let slot = match key {
            "soup_size" => &mut self.soup_size,
            "half_len" => &mut self.half_len,
            "npairs" => &mut self.npairs,
            _ => {
                self.extra.insert(key.to_string(), value);
                return Ok(());
            }
        };

        match value {
            ConfigValue::Int(i) if i >= 0 => {
                *slot = i as usize;
                Ok(())
            }
            other => Err(SoupError::InvalidConfig(format!(
                "{} must be a non-negative integer, got {:?}",
                key, other
            ))),
        }
    }

    /// Check that the geometry describes a soup that can exist.
    pub fn validate(&self) -> Result<(), SoupError> {
        if self.soup_size == 0 {
            return Err(SoupError::InvalidConfig("soup_size must be > 0".to_string()));
        }
        if self.half_len == 0 || self.half_len > MAX_HALF_LEN {
            return Err(SoupError::InvalidConfig(format!(
                "half_len must be in 1..={}, got {}",
                MAX_HALF_LEN, self.half_len
            )));
        }
        if self.npairs.saturating_mul(2) > self.soup_size {
            return Err(SoupError::InvalidConfig(format!(
                "npairs {} needs {} tapes but soup_size is {}",
                self.npairs,
                self.npairs.saturating_mul(2),
                self.soup_size
            )));
        }
        let snapshot_bytes = self
            .soup_size
            .checked_mul(self.half_len)
            .and_then(|cells| cells.checked_mul(std::mem::size_of::<Token>()));
        if snapshot_bytes.is_none() {
            return Err(SoupError::InvalidConfig(format!(
                "soup_size {} x half_len {} does not fit in a snapshot",
                self.soup_size, self.half_len
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
