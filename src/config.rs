use crate::vendor::DEFAULT_LOOKAHEAD;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use telnet_negotiation::{NegotiationPolicy, TerminalTypeOption, WindowSize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "mudlink.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown config section [{0}]")]
    UnknownSection(String),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("could not read config: {0}")]
    Io(#[from] io::Error),
}

/// How the binary presents decoded events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Paint segments to the local terminal
    Terminal,
    /// One JSON event per line on stdout
    Json,
}

impl OutputMode {
    fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Terminal => "terminal",
            OutputMode::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub terminal: TerminalConfig,
    pub vendor: VendorConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalConfig {
    /// Sent in reply to TERMINAL-TYPE SEND
    pub terminal_type: String,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorConfig {
    /// Bytes scanned for a vendor sequence terminator
    pub lookahead: usize,
    /// Send the client-mode request right after connecting
    pub request_client_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub output: OutputMode,
    pub text_stats_fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 23,
                connect_timeout: Duration::from_secs(10),
            },
            terminal: TerminalConfig {
                terminal_type: "ansi".to_string(),
                width: 80,
                height: 24,
            },
            vendor: VendorConfig {
                lookahead: DEFAULT_LOOKAHEAD,
                request_client_mode: true,
            },
            display: DisplayConfig {
                output: OutputMode::Terminal,
                text_stats_fallback: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl ClientConfig {
    /// Load the config file, writing out the defaults when it does not exist
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_config(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = fs::write(path, config.to_config_file_format()) {
                    warn!(path = %path.display(), error = %e, "could not create default config file");
                }
                Ok(config)
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn parse_config(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = section.trim().to_string();
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match current_section.as_str() {
                    "server" => config.parse_server_config(key, value)?,
                    "terminal" => config.parse_terminal_config(key, value)?,
                    "vendor" => config.parse_vendor_config(key, value)?,
                    "display" => config.parse_display_config(key, value)?,
                    "logging" => config.parse_logging_config(key, value)?,
                    _ => return Err(ConfigError::UnknownSection(current_section.clone())),
                }
            }
        }

        Ok(config)
    }

    /// Negotiation answers built from the `[terminal]` section
    pub fn negotiation_policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            terminal_type: TerminalTypeOption::new(&self.terminal.terminal_type),
            window_size: WindowSize::new(self.terminal.width, self.terminal.height),
        }
    }

    /// `host:port` of the configured server
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn parse_server_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "host" => {
                if value.is_empty() {
                    return Err(invalid(key, value));
                }
                self.server.host = value.to_string();
            }
            "port" => self.server.port = parse_value(key, value)?,
            "connect_timeout" => {
                let seconds: u64 = parse_value(key, value)?;
                if seconds == 0 {
                    return Err(invalid(key, value));
                }
                self.server.connect_timeout = Duration::from_secs(seconds);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_terminal_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "terminal_type" => {
                if value.is_empty() || !value.is_ascii() {
                    return Err(invalid(key, value));
                }
                self.terminal.terminal_type = value.to_string();
            }
            "width" => self.terminal.width = parse_nonzero(key, value)?,
            "height" => self.terminal.height = parse_nonzero(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_vendor_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "lookahead" => {
                let lookahead: usize = parse_value(key, value)?;
                if lookahead == 0 {
                    return Err(invalid(key, value));
                }
                self.vendor.lookahead = lookahead;
            }
            "request_client_mode" => self.vendor.request_client_mode = parse_value(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_display_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "output" => {
                self.display.output = match value {
                    "terminal" => OutputMode::Terminal,
                    "json" => OutputMode::Json,
                    _ => return Err(invalid(key, value)),
                };
            }
            "text_stats_fallback" => self.display.text_stats_fallback = parse_value(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_logging_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "level" => self.logging.level = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn to_config_file_format(&self) -> String {
        format!(
            r#"# mudlink configuration file
# Lines starting with # are comments

[server]
host = "{}"
port = {}
connect_timeout = {}      # seconds

[terminal]
# Answers to TERMINAL-TYPE and NAWS negotiation
terminal_type = "{}"
width = {}
height = {}

[vendor]
lookahead = {}
request_client_mode = {}

[display]
output = "{}"       # "terminal" or "json"
text_stats_fallback = {}

[logging]
# Used when RUST_LOG is not set
level = "{}"
"#,
            self.server.host,
            self.server.port,
            self.server.connect_timeout.as_secs(),
            self.terminal.terminal_type,
            self.terminal.width,
            self.terminal.height,
            self.vendor.lookahead,
            self.vendor.request_client_mode,
            self.display.output.as_str(),
            self.display.text_stats_fallback,
            self.logging.level,
        )
    }
}

/// Drop a trailing `# comment` that is not inside quotes
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (index, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..index],
            _ => {}
        }
    }
    line
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), value.to_string())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_nonzero(key: &str, value: &str) -> Result<u16, ConfigError> {
    let n: u16 = parse_value(key, value)?;
    if n == 0 {
        return Err(invalid(key, value));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "127.0.0.1:23");
        assert_eq!(config.vendor.lookahead, 20);
        assert_eq!(config.display.output, OutputMode::Terminal);
        assert_eq!(config.negotiation_policy(), NegotiationPolicy::default());
    }

    #[test]
    fn test_parse_sections() {
        let config = ClientConfig::parse_config(
            r#"
# comment
[server]
host = "mud.example.org"
port = 4000
connect_timeout = 3   # short

[terminal]
terminal_type = "vt100"
width = 132
height = 50

[vendor]
lookahead = 32
request_client_mode = false

[display]
output = "json"
text_stats_fallback = false

[logging]
level = "mudlink=debug"
"#,
        )
        .unwrap();

        assert_eq!(config.address(), "mud.example.org:4000");
        assert_eq!(config.server.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.terminal.terminal_type, "vt100");
        assert_eq!(config.negotiation_policy().window_size, WindowSize::new(132, 50));
        assert_eq!(config.vendor.lookahead, 32);
        assert!(!config.vendor.request_client_mode);
        assert_eq!(config.display.output, OutputMode::Json);
        assert!(!config.display.text_stats_fallback);
        assert_eq!(config.logging.level, "mudlink=debug");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            ClientConfig::parse_config("[ui]\nbox_style = ascii"),
            Err(ConfigError::UnknownSection(s)) if s == "ui"
        ));
        assert!(matches!(
            ClientConfig::parse_config("[server]\ntelnet_port = 23"),
            Err(ConfigError::UnknownKey(k)) if k == "telnet_port"
        ));
        assert!(matches!(
            ClientConfig::parse_config("[server]\nport = 70000"),
            Err(ConfigError::InvalidValue(k, _)) if k == "port"
        ));
        assert!(matches!(
            ClientConfig::parse_config("[vendor]\nlookahead = 0"),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            ClientConfig::parse_config("[terminal]\nwidth = 0"),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            ClientConfig::parse_config("[display]\noutput = html"),
            Err(ConfigError::InvalidValue(..))
        ));
    }

    #[test]
    fn test_hash_inside_quotes_is_kept() {
        let config = ClientConfig::parse_config("[logging]\nlevel = \"a#b\" # trailing").unwrap();
        assert_eq!(config.logging.level, "a#b");
    }

    #[test]
    fn test_round_trip() {
        let mut config = ClientConfig::default();
        config.server.host = "10.0.0.5".to_string();
        config.terminal.width = 100;
        config.display.output = OutputMode::Json;

        let parsed = ClientConfig::parse_config(&config.to_config_file_format()).unwrap();
        assert_eq!(parsed, config);
    }
}
