//! Run configuration, read from a TOML file.
//!
//! Every field has a default, so an empty file describes the reference installation:
//!
//! ```toml
//! manufacturer = "lgz"
//!
//! [media]
//! type = "tcp"
//! host = "186.86.153.16"
//! port = 5000
//!
//! [authentication]
//! mechanism = "low"
//! password = "00000000"
//!
//! [profile]
//! logical_name = "1.0.99.1.0.255"
//! short_name = 25200
//!
//! [report]
//! factor = 0.1
//! border_code = "Frt0000"
//! backup_flag = "P"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::{Authentication, ClientSettings};
use crate::cosem::ObjectTarget;
use crate::error::ReaderError;
use crate::obis_code::ObisCode;
use crate::report::{SlotPolicy, TotalPolicy};
use crate::resolver::ResolutionStrategy;
use crate::transport::SerialSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaConfig {
    Tcp {
        host: String,
        port: u16,
    },
    Serial {
        port_name: String,
        /// The meter starts in IEC 62056-21 mode.
        #[serde(default)]
        iec: bool,
    },
}

impl Default for MediaConfig {
    fn default() -> Self {
        MediaConfig::Tcp { host: "186.86.153.16".into(), port: 5000 }
    }
}

impl MediaConfig {
    pub fn serial_settings(&self) -> Option<SerialSettings> {
        match self {
            MediaConfig::Serial { port_name, iec } => Some(SerialSettings::from_mode(port_name.clone(), *iec)),
            MediaConfig::Tcp { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MediaConfig::Tcp { host, port } => format!("{host}:{port}"),
            MediaConfig::Serial { .. } => self.serial_settings().map(|s| s.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mechanism", rename_all = "lowercase")]
pub enum AuthenticationConfig {
    None,
    Low { password: String },
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        AuthenticationConfig::Low { password: "00000000".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub factor: f64,
    pub border_code: String,
    pub backup_flag: String,
    pub directory: PathBuf,
    pub slot_policy: SlotPolicy,
    pub total_policy: TotalPolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            factor: 0.1,
            border_code: "Frt0000".into(),
            backup_flag: "P".into(),
            directory: PathBuf::from("Readings"),
            slot_policy: SlotPolicy::default(),
            total_policy: TotalPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub media: MediaConfig,
    pub client_address: u16,
    pub server_address: u16,
    pub authentication: AuthenticationConfig,
    /// Three-letter manufacturer id, only logged.
    pub manufacturer: String,
    pub profile: ObjectTarget,
    /// Quantity written to the report slots.
    pub primary: ObjectTarget,
    pub secondary: ObjectTarget,
    pub resolution: ResolutionStrategy,
    pub report: ReportConfig,
    pub cache_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            media: MediaConfig::default(),
            client_address: 16,
            server_address: 1,
            authentication: AuthenticationConfig::default(),
            manufacturer: "lgz".into(),
            profile: ObjectTarget::new(ObisCode::new(1, 0, 99, 1, 0, 255), Some(25200)),
            primary: ObjectTarget::new(ObisCode::new(1, 1, 1, 29, 1, 255), Some(7216)),
            secondary: ObjectTarget::new(ObisCode::new(1, 1, 3, 29, 1, 255), Some(7368)),
            resolution: ResolutionStrategy::default(),
            report: ReportConfig::default(),
            cache_dir: PathBuf::from("."),
            log_file: PathBuf::from("LogFile.txt"),
        }
    }
}

impl ReaderConfig {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: ReaderConfig = toml::from_str(&contents)
            .map_err(|e| ReaderError::Config(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReaderError> {
        match &self.media {
            MediaConfig::Tcp { host, port } => {
                if host.trim().is_empty() {
                    return Err(ReaderError::Config("media host is empty".into()));
                }
                if *port == 0 {
                    return Err(ReaderError::Config("media port is 0".into()));
                }
            }
            MediaConfig::Serial { port_name, .. } => {
                if port_name.trim().is_empty() {
                    return Err(ReaderError::Config("serial port name is empty".into()));
                }
            }
        }

        if let AuthenticationConfig::Low { password } = &self.authentication {
            if password.is_empty() {
                return Err(ReaderError::Config("low level authentication requires a password".into()));
            }
        }

        if !self.report.factor.is_finite() || self.report.factor == 0.0 {
            return Err(ReaderError::Config(format!("invalid report factor {}", self.report.factor)));
        }
        check_report_field("border_code", &self.report.border_code)?;
        check_report_field("backup_flag", &self.report.backup_flag)?;

        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        let authentication = match &self.authentication {
            AuthenticationConfig::None => Authentication::None,
            AuthenticationConfig::Low { password } => Authentication::Low { password: password.as_bytes().to_vec() },
        };
        ClientSettings {
            client_address: self.client_address,
            server_address: self.server_address,
            authentication,
            ..ClientSettings::default()
        }
    }
}

fn check_report_field(name: &str, value: &str) -> Result<(), ReaderError> {
    if value.is_empty() {
        return Err(ReaderError::Config(format!("report {name} is empty")));
    }
    if value.contains([';', '\r', '\n']) {
        return Err(ReaderError::Config(format!("report {name} {value:?} contains a separator")));
    }
    Ok(())
}
