//! Link configuration
//!
//! YAML-based configuration for a hoplink receiver: the FHSS plan (radio
//! variant, bands, binding seed), the anti-jam detector, the mode switch
//! policy, and logging.
//!
//! ## Configuration Search Path
//!
//! `LinkConfig::load` reads the first file found:
//! 1. Path in the `HOPLINK_CONFIG` environment variable
//! 2. `./hoplink.yaml`
//! 3. `~/.config/hoplink/config.yaml`
//! 4. `/etc/hoplink/config.yaml`
//!
//! ## Example
//!
//! ```yaml
//! fhss:
//!   variant: lr1121
//!   domain: ism2g4
//!   secondary_domain: fcc915
//!   seed: 0x12345678
//!
//! detector:
//!   window_size_packets: 100
//!   jam_threshold_percent: 30
//!   min_bad_packets: 5
//!
//! switch:
//!   controller_only: true
//!   debounce_ms: 50
//! ```

use crate::anti_jam::DetectorConfig;
use crate::band::{Domain, RadioVariant};
use crate::freq_plan::FreqPlan;
use crate::logging::LogConfig;
use crate::sequence::SEQUENCE_LEN;
use crate::LinkError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// FHSS plan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FhssSettings {
    /// Radio silicon family
    pub variant: RadioVariant,
    /// Primary band
    pub domain: Domain,
    /// Secondary band for dual-band hardware
    pub secondary_domain: Option<Domain>,
    /// Binding seed shared with the transmitter
    pub seed: u32,
}

impl Default for FhssSettings {
    fn default() -> Self {
        Self {
            variant: RadioVariant::Sx128x,
            domain: Domain::Ism2g4,
            secondary_domain: None,
            seed: 0,
        }
    }
}

impl FhssSettings {
    /// Build the frequency plan these settings describe.
    pub fn build_plan(&self) -> FreqPlan {
        match self.secondary_domain {
            Some(secondary) => {
                FreqPlan::new_dual(self.variant, self.domain, secondary, self.seed)
            }
            None => FreqPlan::new(self.variant, self.domain, self.seed),
        }
    }
}

/// Mode switch policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSettings {
    /// Reserve mode changes to the controller
    pub controller_only: bool,
    /// Minimum interval between applied changes (ms); 0 disables
    pub debounce_ms: u32,
}

/// Aggregate configuration for one receiver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub fhss: FhssSettings,
    pub detector: DetectorConfig,
    pub switch: SwitchSettings,
    pub logging: LogConfig,
}

impl LinkConfig {
    /// Load configuration from the default search path; defaults when no
    /// file is found.
    pub fn load() -> Result<Self, LinkError> {
        if let Ok(path) = std::env::var("HOPLINK_CONFIG") {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, LinkError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkError::ConfigRead(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from a YAML string and validate it.
    pub fn parse(yaml: &str) -> Result<Self, LinkError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), LinkError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| LinkError::ConfigRead(format!("{}: {}", path.display(), e)))
    }

    /// Check cross-field constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), LinkError> {
        if usize::from(self.detector.window_size_packets) > SEQUENCE_LEN * 16 {
            return Err(LinkError::InvalidConfig(format!(
                "window_size_packets {} unreasonably large",
                self.detector.window_size_packets
            )));
        }
        if self.detector.jam_threshold_percent > 100 {
            return Err(LinkError::InvalidConfig(format!(
                "jam_threshold_percent {} exceeds 100",
                self.detector.jam_threshold_percent
            )));
        }
        if let Some(secondary) = self.fhss.secondary_domain {
            if secondary == self.fhss.domain {
                return Err(LinkError::InvalidConfig(
                    "secondary_domain equals primary domain".into(),
                ));
            }
        }
        Ok(())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("hoplink.yaml")];
        if let Ok(home) = std::env::var("HOME") {
            paths.push(PathBuf::from(home).join(".config/hoplink/config.yaml"));
        }
        paths.push(PathBuf::from("/etc/hoplink/config.yaml"));
        paths
    }
}
