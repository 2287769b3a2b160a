use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde_derive::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3333;
pub const DEFAULT_BUFFER_SIZE: usize = 256;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub listener: Option<ListenerConfig>,
    pub dashboard: Option<DashboardConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ListenerConfig {
    pub bind_addr: Option<IpAddr>,
    pub port: Option<u16>,
    pub buffer_size: Option<usize>,
    pub channel_capacity: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DashboardConfig {
    pub format: Option<OutputFormat>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything the listener needs, resolved against defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    pub bind_addr: SocketAddr,
    pub buffer_size: usize,
    pub channel_capacity: usize,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        ListenerSettings {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::de::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(AppConfig::default())
            }
            other => other,
        }
    }

    pub fn listener_settings(&self) -> Result<ListenerSettings, ConfigError> {
        let defaults = ListenerSettings::default();
        let listener = self.listener.clone().unwrap_or_default();

        let settings = ListenerSettings {
            bind_addr: SocketAddr::new(
                listener.bind_addr.unwrap_or(defaults.bind_addr.ip()),
                listener.port.unwrap_or(defaults.bind_addr.port()),
            ),
            buffer_size: listener.buffer_size.unwrap_or(defaults.buffer_size),
            channel_capacity: listener
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn output_format(&self) -> OutputFormat {
        self.dashboard
            .as_ref()
            .and_then(|d| d.format)
            .unwrap_or_default()
    }
}

impl ListenerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Zero("buffer_size"));
        }
        // tokio's mpsc::channel panics on a zero capacity
        if self.channel_capacity == 0 {
            return Err(ConfigError::Zero("channel_capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let config_str = r#"
            [listener]
            bind_addr = "127.0.0.1"
            port = 4444
            buffer_size = 512

            [dashboard]
            format = "json"
        "#;
        let config: AppConfig = toml::de::from_str(config_str).unwrap();
        let settings = config.listener_settings().unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:4444".parse().unwrap());
        assert_eq!(settings.buffer_size, 512);
        assert_eq!(settings.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.output_format(), OutputFormat::Json);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::de::from_str("").unwrap();
        let settings = config.listener_settings().unwrap();
        assert_eq!(settings, ListenerSettings::default());
        assert_eq!(settings.bind_addr, "0.0.0.0:3333".parse().unwrap());
        assert_eq!(settings.buffer_size, 256);
        assert_eq!(config.output_format(), OutputFormat::Text);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let config: AppConfig = toml::de::from_str("[listener]\nbuffer_size = 0").unwrap();
        assert!(matches!(
            config.listener_settings(),
            Err(ConfigError::Zero("buffer_size"))
        ));

        let config: AppConfig =
            toml::de::from_str("[listener]\nchannel_capacity = 0").unwrap();
        assert!(matches!(
            config.listener_settings(),
            Err(ConfigError::Zero("channel_capacity"))
        ));
    }

    #[test]
    fn test_unknown_format_fails_to_parse() {
        let result: Result<AppConfig, _> = toml::de::from_str("[dashboard]\nformat = \"xml\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/nonexistent/tds-monitor.toml");
        assert!(matches!(
            AppConfig::load(path),
            Err(ConfigError::Read { .. })
        ));
        assert!(AppConfig::load_or_default(path).unwrap().listener.is_none());
    }
}
