//! Datapath configuration.
//!
//! Loaded from TOML text handed in by the embedding program. Every field has
//! a default, so an empty document yields [`DatapathConfig::default`].

use crate::amaru::AMAC_LEN;
use crate::error::{DatapathError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound of `max_ports`: an AMARU hop is one byte.
pub const MAX_PORTS: u32 = u8::MAX as u32;

/// Limits on the AMAC table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmacLimits {
    /// Maximum entries in the table.
    #[serde(default = "default_amac_max_entries")]
    pub max_entries: usize,

    /// Maximum entries learned through a single port.
    #[serde(default = "default_amac_max_per_port")]
    pub max_per_port: usize,

    /// Chain prefix length compared when detecting duplicates.
    #[serde(default = "default_amac_max_compare_len")]
    pub max_compare_len: usize,

    /// Lifetime stamped into new entries, in seconds.
    #[serde(default = "default_amac_entry_ttl")]
    pub entry_ttl_secs: u64,
}

impl AmacLimits {
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_ttl_secs)
    }
}

impl Default for AmacLimits {
    fn default() -> Self {
        AmacLimits {
            max_entries: default_amac_max_entries(),
            max_per_port: default_amac_max_per_port(),
            max_compare_len: default_amac_max_compare_len(),
            entry_ttl_secs: default_amac_entry_ttl(),
        }
    }
}

/// Where the AMAC table dump and packet counter are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmacLogConfig {
    pub dir: PathBuf,

    /// Size after which the table dump file is rotated.
    #[serde(default = "default_table_rotate_bytes")]
    pub table_rotate_bytes: u64,

    /// Size after which the packet counter file is rotated.
    #[serde(default = "default_counter_rotate_bytes")]
    pub counter_rotate_bytes: u64,
}

/// Complete datapath configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatapathConfig {
    /// Datapath id; the local port's MAC address is derived from it.
    #[serde(default)]
    pub datapath_id: u64,

    /// Datapath id of the topology root.
    #[serde(default = "default_root_datapath_id")]
    pub root_datapath_id: u64,

    /// Port numbers below this value are usable. At most 255, since each
    /// AMARU hop records its port in one byte.
    #[serde(default = "default_max_ports")]
    pub max_ports: u32,

    /// Queue slots per port.
    #[serde(default = "default_max_queues")]
    pub max_queues: u16,

    /// Bound of the hardware receive channel.
    #[serde(default = "default_hw_queue_depth")]
    pub hw_queue_depth: usize,

    #[serde(default)]
    pub amac: AmacLimits,

    #[serde(default)]
    pub amac_log: Option<AmacLogConfig>,
}

impl Default for DatapathConfig {
    fn default() -> Self {
        DatapathConfig {
            datapath_id: 0,
            root_datapath_id: default_root_datapath_id(),
            max_ports: default_max_ports(),
            max_queues: default_max_queues(),
            hw_queue_depth: default_hw_queue_depth(),
            amac: AmacLimits::default(),
            amac_log: None,
        }
    }
}

// Default functions
fn default_root_datapath_id() -> u64 {
    1
}

fn default_max_ports() -> u32 {
    255
}

fn default_max_queues() -> u16 {
    8
}

fn default_hw_queue_depth() -> usize {
    256
}

fn default_amac_max_entries() -> usize {
    8
}

fn default_amac_max_per_port() -> usize {
    10
}

fn default_amac_max_compare_len() -> usize {
    3
}

fn default_amac_entry_ttl() -> u64 {
    60
}

fn default_table_rotate_bytes() -> u64 {
    1600
}

fn default_counter_rotate_bytes() -> u64 {
    500_000
}

impl DatapathConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DatapathConfig =
            toml::from_str(text).map_err(|e| DatapathError::config("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_ports == 0 {
            return Err(DatapathError::config("max_ports", "must be greater than 0"));
        }
        if self.max_ports > MAX_PORTS {
            return Err(DatapathError::config(
                "max_ports",
                format!("must not exceed {}", MAX_PORTS),
            ));
        }
        if self.max_queues > 255 {
            return Err(DatapathError::config("max_queues", "must not exceed 255"));
        }
        if self.hw_queue_depth == 0 {
            return Err(DatapathError::config(
                "hw_queue_depth",
                "must be greater than 0",
            ));
        }
        if self.amac.max_compare_len > AMAC_LEN {
            return Err(DatapathError::config(
                "amac.max_compare_len",
                format!("must not exceed {}", AMAC_LEN),
            ));
        }
        Ok(())
    }

    /// True when this switch is the root of the AMAC tree.
    pub fn is_root(&self) -> bool {
        self.datapath_id == self.root_datapath_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = DatapathConfig::from_toml_str("").unwrap();
        assert_eq!(config, DatapathConfig::default());
        assert_eq!(config.max_ports, 255);
        assert_eq!(config.amac.max_entries, 8);
        assert_eq!(config.amac.max_per_port, 10);
        assert_eq!(config.amac.max_compare_len, 3);
        assert!(config.amac_log.is_none());
    }

    #[test]
    fn test_partial_document() {
        let config = DatapathConfig::from_toml_str(
            r#"
            datapath_id = 7
            max_queues = 4

            [amac]
            max_entries = 2

            [amac_log]
            dir = "/var/log/ofswitch"
            "#,
        )
        .unwrap();
        assert_eq!(config.datapath_id, 7);
        assert_eq!(config.max_queues, 4);
        assert_eq!(config.amac.max_entries, 2);
        assert_eq!(config.amac.max_per_port, 10);
        let log = config.amac_log.unwrap();
        assert_eq!(log.dir, PathBuf::from("/var/log/ofswitch"));
        assert_eq!(log.table_rotate_bytes, 1600);
        assert_eq!(log.counter_rotate_bytes, 500_000);
        assert!(!DatapathConfig::default().is_root());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        for text in [
            "max_ports = 0",
            "max_ports = 256",
            "max_ports = 1000",
            "max_queues = 256",
            "hw_queue_depth = 0",
            "[amac]\nmax_compare_len = 29",
        ] {
            let err = DatapathConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, DatapathError::Config { .. }), "{}", text);
        }
    }

    #[test]
    fn test_max_ports_bound_is_inclusive() {
        let config = DatapathConfig::from_toml_str("max_ports = 255").unwrap();
        assert_eq!(config.max_ports, MAX_PORTS);
        let err = DatapathConfig::from_toml_str("max_ports = 256").unwrap_err();
        assert!(matches!(err, DatapathError::Config { ref field, .. } if field == "max_ports"));
    }

    #[test]
    fn test_malformed_toml() {
        let err = DatapathConfig::from_toml_str("max_ports = \"many\"").unwrap_err();
        assert!(matches!(err, DatapathError::Config { ref field, .. } if field == "toml"));
    }
}
