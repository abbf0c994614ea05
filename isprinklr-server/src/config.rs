//! Daemon configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via ISPRINKLR_CONFIG)
//! 3. Environment variables

use crate::handler::ZoneLimits;
use isprinklr_protocol::{ChecksumEcho, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link to the zone bridge.
    pub serial: SerialConfig,
    /// HTTP control API.
    pub http: HttpConfig,
    /// Network connectivity monitoring.
    pub network: NetworkConfig,
    /// Zone controller.
    pub controller: ControllerConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ISPRINKLR_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.serial.apply_env_overrides();
        self.http.apply_env_overrides();
        self.network.apply_env_overrides();
        self.controller.apply_env_overrides();
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serial.validate()?;
        self.http.validate()?;
        self.network.validate()?;
        self.controller.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.to_lowercase() == "true")
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Run the link driver.
    pub enabled: bool,
    /// Serial device path.
    pub port: String,
    /// Raw TCP bridge (`host:port`). Takes precedence over `port`.
    pub tcp: Option<String>,
    pub baud_rate: u32,
    /// Per-block read timeout in milliseconds.
    pub read_timeout_ms: u64,
    pub checksum_echo: ChecksumEcho,
    pub max_zone: u8,
    pub max_minutes: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: "/dev/ttyUSB0".to_string(),
            tcp: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            checksum_echo: ChecksumEcho::default(),
            max_zone: ZoneLimits::SERIAL.max_zone,
            max_minutes: ZoneLimits::SERIAL.max_minutes,
        }
    }
}

impl SerialConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(enabled) = env_flag("ISPRINKLR_SERIAL_ENABLED") {
            self.enabled = enabled;
        }
        if let Ok(port) = std::env::var("ISPRINKLR_SERIAL_PORT") {
            self.port = port;
        }
        if let Ok(tcp) = std::env::var("ISPRINKLR_SERIAL_TCP") {
            self.tcp = if tcp.is_empty() { None } else { Some(tcp) };
        }
        if let Some(baud) = env_parse("ISPRINKLR_SERIAL_BAUD") {
            self.baud_rate = baud;
        }
        if let Some(ms) = env_parse("ISPRINKLR_SERIAL_TIMEOUT_MS") {
            self.read_timeout_ms = ms;
        }
        if let Some(echo) = env_parse("ISPRINKLR_CHECKSUM_ECHO") {
            self.checksum_echo = echo;
        }
        if let Some(max) = env_parse("ISPRINKLR_SERIAL_MAX_ZONE") {
            self.max_zone = max;
        }
        if let Some(max) = env_parse("ISPRINKLR_SERIAL_MAX_MINUTES") {
            self.max_minutes = max;
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Bounds enforced on commands arriving over the link.
    pub fn limits(&self) -> ZoneLimits {
        ZoneLimits {
            max_zone: self.max_zone,
            min_minutes: 1,
            max_minutes: self.max_minutes,
        }
    }

    /// Returns a printable description of the transport.
    pub fn endpoint(&self) -> String {
        match &self.tcp {
            Some(addr) => format!("tcp://{}", addr),
            None => format!("{} @ {} baud", self.port, self.baud_rate),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "serial.read_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "serial.baud_rate must be greater than 0".to_string(),
            ));
        }
        if self.max_zone == 0 || self.max_minutes == 0 {
            return Err(ConfigError::Validation(
                "serial zone and minute limits must be greater than 0".to_string(),
            ));
        }
        if self.tcp.is_none() && self.port.is_empty() {
            return Err(ConfigError::Validation(
                "serial.port must be set when serial.tcp is not".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    pub max_zone: u8,
    pub max_minutes: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_zone: ZoneLimits::HTTP.max_zone,
            max_minutes: ZoneLimits::HTTP.max_minutes,
        }
    }
}

impl HttpConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(enabled) = env_flag("ISPRINKLR_HTTP_ENABLED") {
            self.enabled = enabled;
        }
        if let Some(addr) = env_parse("ISPRINKLR_HTTP_BIND") {
            self.bind_addr = addr;
        }
    }

    /// Bounds enforced on API requests. Zero minutes is accepted as a stop.
    pub fn limits(&self) -> ZoneLimits {
        ZoneLimits {
            max_zone: self.max_zone,
            min_minutes: 0,
            max_minutes: self.max_minutes,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_zone == 0 || self.max_minutes == 0 {
            return Err(ConfigError::Validation(
                "http zone and minute limits must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the host reaches the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    #[default]
    Ethernet,
    Wifi,
}

impl NetworkMode {
    /// Name reported while connected.
    pub fn label(&self) -> &'static str {
        match self {
            NetworkMode::Ethernet => "Ethernet",
            NetworkMode::Wifi => "WiFi",
        }
    }
}

impl FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethernet" | "eth" | "1" => Ok(NetworkMode::Ethernet),
            "wifi" | "wlan" | "2" => Ok(NetworkMode::Wifi),
            other => Err(format!("unknown network mode '{}'", other)),
        }
    }
}

/// Network configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mode: NetworkMode,
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    /// Static addressing as `ip,gateway,subnet[,dns1[,dns2]]`.
    pub fixed_ip: Option<String>,
    pub check_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Ethernet,
            wifi_ssid: None,
            wifi_password: None,
            fixed_ip: None,
            check_interval_secs: 10,
        }
    }
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("mode", &self.mode)
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &self.wifi_password.as_ref().map(|_| "***"))
            .field("fixed_ip", &self.fixed_ip)
            .field("check_interval_secs", &self.check_interval_secs)
            .finish()
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(mode) = env_parse("ISPRINKLR_NETWORK_MODE") {
            self.mode = mode;
        }
        if let Ok(ssid) = std::env::var("ISPRINKLR_WIFI_SSID") {
            self.wifi_ssid = Some(ssid);
        }
        if let Ok(password) = std::env::var("ISPRINKLR_WIFI_PASSWORD") {
            self.wifi_password = Some(password);
        }
        if let Ok(fixed) = std::env::var("ISPRINKLR_FIXED_IP") {
            self.fixed_ip = if fixed.is_empty() { None } else { Some(fixed) };
        }
        if let Some(secs) = env_parse("ISPRINKLR_NETWORK_CHECK_INTERVAL") {
            self.check_interval_secs = secs;
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Parses the static addressing, if configured.
    pub fn fixed_ip(&self) -> Result<Option<FixedIp>, ConfigError> {
        self.fixed_ip
            .as_deref()
            .map(|s| s.parse::<FixedIp>().map_err(ConfigError::Validation))
            .transpose()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "network.check_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.mode == NetworkMode::Wifi
            && self.wifi_ssid.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::Validation(
                "network.mode is wifi but wifi_ssid is not set".to_string(),
            ));
        }
        self.fixed_ip()?;
        Ok(())
    }
}

/// Static IPv4 addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedIp {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns1: Option<Ipv4Addr>,
    pub dns2: Option<Ipv4Addr>,
}

impl FromStr for FixedIp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if !(3..=5).contains(&parts.len()) {
            return Err(format!(
                "fixed_ip '{}' must be ip,gateway,subnet[,dns1[,dns2]]",
                s
            ));
        }
        let addr = |i: usize| -> Result<Ipv4Addr, String> {
            parts[i]
                .parse()
                .map_err(|_| format!("fixed_ip: '{}' is not an IPv4 address", parts[i]))
        };
        Ok(FixedIp {
            ip: addr(0)?,
            gateway: addr(1)?,
            subnet: addr(2)?,
            dns1: if parts.len() > 3 { Some(addr(3)?) } else { None },
            dns2: if parts.len() > 4 { Some(addr(4)?) } else { None },
        })
    }
}

/// Zone controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub max_zone: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_zone: isprinklr_core::simulated::DEFAULT_MAX_ZONE,
        }
    }
}

impl ControllerConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(max) = env_parse("ISPRINKLR_CONTROLLER_MAX_ZONE") {
            self.max_zone = max;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_zone == 0 {
            return Err(ConfigError::Validation(
                "controller.max_zone must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, String),
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::Parse(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Validation(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
