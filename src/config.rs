use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub printer: PrinterConfig,
    pub report: ReportConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterConfig {
    pub host: String,
    pub port: u16,
    /// Optional logo printed above every report; skipped when the file is absent.
    pub logo_path: PathBuf,
    /// Directory for the transient report image written during a print job.
    pub spool_dir: PathBuf,
    pub probe_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub use_mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// TrueType font used instead of the built-in bitmap font.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub per_chat_capacity: usize,
}

impl PrinterConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to defaults
    /// for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server = ServerConfig {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "3000")
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
        };

        let printer_port = var("THERMAL_PRINTER_PORT", "9100");
        let printer = PrinterConfig {
            host: var("THERMAL_PRINTER_IP", "192.168.1.100").trim().to_string(),
            port: printer_port
                .parse()
                .map_err(|_| ConfigError::InvalidPrinterPort {
                    value: printer_port.clone(),
                })?,
            logo_path: var("PRINTER_LOGO_PATH", "./bonlogo.png").into(),
            spool_dir: lookup("PRINT_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            probe_timeout_ms: parse_millis(
                "PRINTER_PROBE_TIMEOUT_MS",
                &var("PRINTER_PROBE_TIMEOUT_MS", "3000"),
            )?,
            write_timeout_ms: parse_millis(
                "PRINTER_WRITE_TIMEOUT_MS",
                &var("PRINTER_WRITE_TIMEOUT_MS", "10000"),
            )?,
            use_mock: parse_flag("USE_MOCK_PRINTER", &var("USE_MOCK_PRINTER", "false"))?,
        };

        let report = ReportConfig {
            font_path: lookup("REPORT_FONT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };

        let capacity = var("UPLOAD_CACHE_CAPACITY", "10");
        let uploads = UploadConfig {
            per_chat_capacity: capacity
                .parse()
                .map_err(|_| ConfigError::InvalidCapacity {
                    value: capacity.clone(),
                })?,
        };

        let config = Config {
            server,
            printer,
            report,
            uploads,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if !self.printer.use_mock && self.printer.host.is_empty() {
            return Err(ConfigError::InvalidPrinterHost);
        }
        if self.printer.port == 0 {
            return Err(ConfigError::InvalidPrinterPort {
                value: "0".to_string(),
            });
        }
        if self.uploads.per_chat_capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidPort)
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(ConfigError::InvalidTimeout {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_with(&[]).expect("Failed to create config");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.printer.address(), "192.168.1.100:9100");
        assert_eq!(config.printer.logo_path, PathBuf::from("./bonlogo.png"));
        assert_eq!(config.uploads.per_chat_capacity, 10);
        assert!(config.report.font_path.is_none());
        assert!(!config.printer.use_mock);
    }

    #[test]
    fn test_printer_address_override() {
        let config = config_with(&[
            ("THERMAL_PRINTER_IP", "10.0.0.42"),
            ("THERMAL_PRINTER_PORT", "9101"),
            ("PRINTER_PROBE_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.printer.address(), "10.0.0.42:9101");
        assert_eq!(config.printer.probe_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_port() {
        let result = config_with(&[("PORT", "invalid")]);
        assert!(matches!(result, Err(ConfigError::InvalidPort)));
    }

    #[test]
    fn test_invalid_printer_port() {
        let result = config_with(&[("THERMAL_PRINTER_PORT", "99999")]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidPrinterPort { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = config_with(&[("PRINTER_WRITE_TIMEOUT_MS", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidTimeout { .. })));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = config_with(&[("UPLOAD_CACHE_CAPACITY", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidCapacity { .. })));
    }

    #[test]
    fn test_empty_printer_host_rejected() {
        let result = config_with(&[("THERMAL_PRINTER_IP", "  ")]);
        assert!(matches!(result, Err(ConfigError::InvalidPrinterHost)));
    }

    #[test]
    fn test_mock_printer_flag_values() {
        for value in ["1", "true", "YES", "on"] {
            let config = config_with(&[("USE_MOCK_PRINTER", value)]).unwrap();
            assert!(config.printer.use_mock, "{} should enable the mock", value);
        }
        for value in ["0", "false", "no", ""] {
            let config = config_with(&[("USE_MOCK_PRINTER", value)]).unwrap();
            assert!(!config.printer.use_mock, "{} should not enable the mock", value);
        }

        let result = config_with(&[("USE_MOCK_PRINTER", "maybe")]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidFlag { name: "USE_MOCK_PRINTER", .. })
        ));
    }
}
