//! Run configuration
//!
//! Settings come from three layers: command-line flags, an optional TOML
//! file, and built-in defaults. A flag given on the command line always
//! wins over the file.
//!
//! ```toml
//! port = "/dev/ttyACM0"
//! baudrate = 115200
//! timeout = 0.1
//! delay = [1, 100, 1]
//! pulse = [1, 100, 1]
//! pwr_cycling = "disabled"
//! cycles = 10
//! capture = "glitch.log"
//! ```

use crate::error::Error;
use crate::glitch::{PowerCycling, SweepPlan, SweepRange};
use crate::serial::port::{PortConfig, DEFAULT_BAUD, DEFAULT_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One layer of settings; unset fields fall through to the next layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub port: Option<String>,
    pub baudrate: Option<u32>,
    /// Read timeout in seconds
    pub timeout: Option<f64>,
    pub delay: Option<SweepRange>,
    pub pulse: Option<SweepRange>,
    pub pwr_cycling: Option<PowerCycling>,
    pub cycles: Option<u64>,
    pub capture: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Fill every unset field of `self` from `base`
    pub fn layered_over(self, base: Settings) -> Settings {
        Settings {
            port: self.port.or(base.port),
            baudrate: self.baudrate.or(base.baudrate),
            timeout: self.timeout.or(base.timeout),
            delay: self.delay.or(base.delay),
            pulse: self.pulse.or(base.pulse),
            pwr_cycling: self.pwr_cycling.or(base.pwr_cycling),
            cycles: self.cycles.or(base.cycles),
            capture: self.capture.or(base.capture),
        }
    }

    /// Apply defaults and validate
    pub fn resolve(self) -> std::result::Result<GlitchConfig, Error> {
        let port_path = self
            .port
            .ok_or_else(|| Error::InvalidConfig("no serial port given".to_string()))?;

        let timeout = match self.timeout {
            Some(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(Error::InvalidConfig(format!(
                    "timeout must be a positive number of seconds, got {}",
                    secs
                )))
            }
            None => DEFAULT_TIMEOUT,
        };

        if self.cycles == Some(0) {
            return Err(Error::InvalidConfig("cycles must be at least 1".to_string()));
        }

        let port = PortConfig::new(&port_path)
            .with_baud_rate(self.baudrate.unwrap_or(DEFAULT_BAUD))
            .with_timeout(timeout);

        let plan = SweepPlan {
            delay: self.delay.unwrap_or_default(),
            pulse: self.pulse.unwrap_or_default(),
            power_cycling: self.pwr_cycling.unwrap_or(PowerCycling::Enabled),
            interval: timeout,
            cycles: self.cycles,
        };

        Ok(GlitchConfig {
            port,
            plan,
            capture: self.capture,
        })
    }
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct GlitchConfig {
    pub port: PortConfig,
    pub plan: SweepPlan,
    pub capture: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Settings {
            port: Some("/dev/ttyACM0".to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(config.port.baud_rate, 115200);
        assert_eq!(config.port.timeout, Duration::from_millis(100));
        assert_eq!(config.plan.interval, Duration::from_millis(100));
        assert_eq!(config.plan.delay, SweepRange::new(1, 100, 1).unwrap());
        assert_eq!(config.plan.pulse, SweepRange::new(1, 100, 1).unwrap());
        assert_eq!(config.plan.power_cycling, PowerCycling::Enabled);
        assert_eq!(config.plan.cycles, None);
        assert_eq!(config.capture, None);
    }

    #[test]
    fn test_parse_file() {
        let settings = Settings::parse(
            r#"
port = "/dev/ttyUSB3"
baudrate = 9600
timeout = 0.25
delay = [10, 50, 10]
pwr_cycling = "disabled"
capture = "run.log"
"#,
        )
        .unwrap();

        let config = settings.resolve().unwrap();
        assert_eq!(config.port.port_path, "/dev/ttyUSB3");
        assert_eq!(config.port.baud_rate, 9600);
        assert_eq!(config.plan.interval, Duration::from_millis(250));
        assert_eq!(config.plan.delay, SweepRange::new(10, 50, 10).unwrap());
        assert_eq!(config.plan.power_cycling, PowerCycling::Disabled);
        assert_eq!(config.capture, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Settings::parse("pulse = [5, 1, 1]").is_err());
        assert!(Settings::parse("pwr_cycling = \"sometimes\"").is_err());
        assert!(Settings::parse("baud = 9600").is_err());
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = Settings {
            port: Some("/dev/ttyUSB0".to_string()),
            baudrate: Some(9600),
            pwr_cycling: Some(PowerCycling::Disabled),
            ..Default::default()
        };
        let cli = Settings {
            baudrate: Some(230400),
            ..Default::default()
        };

        let config = cli.layered_over(file).resolve().unwrap();
        assert_eq!(config.port.port_path, "/dev/ttyUSB0");
        assert_eq!(config.port.baud_rate, 230400);
        assert_eq!(config.plan.power_cycling, PowerCycling::Disabled);
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        assert!(Settings::default().resolve().is_err());

        let with_port = |settings: Settings| Settings {
            port: Some("/dev/ttyACM0".to_string()),
            ..settings
        };
        assert!(with_port(Settings {
            timeout: Some(0.0),
            ..Default::default()
        })
        .resolve()
        .is_err());
        assert!(with_port(Settings {
            timeout: Some(f64::NAN),
            ..Default::default()
        })
        .resolve()
        .is_err());
        assert!(with_port(Settings {
            cycles: Some(0),
            ..Default::default()
        })
        .resolve()
        .is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"/dev/ttyACM1\"\ncycles = 2").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(settings.cycles, Some(2));

        assert!(Settings::load(Path::new("/nonexistent/glitch.toml")).is_err());
    }
}
