//! Runtime configuration (the `ini` options the evaluator consults)

use serde::Deserialize;
use std::path::Path;

use crate::error::{LoadError, Result};

pub const E_ERROR: i64 = 1;
pub const E_WARNING: i64 = 2;
pub const E_PARSE: i64 = 4;
pub const E_NOTICE: i64 = 8;
pub const E_CORE_ERROR: i64 = 16;
pub const E_CORE_WARNING: i64 = 32;
pub const E_COMPILE_ERROR: i64 = 64;
pub const E_COMPILE_WARNING: i64 = 128;
pub const E_USER_ERROR: i64 = 256;
pub const E_USER_WARNING: i64 = 512;
pub const E_USER_NOTICE: i64 = 1024;
pub const E_STRICT: i64 = 2048;
pub const E_RECOVERABLE_ERROR: i64 = 4096;
pub const E_DEPRECATED: i64 = 8192;
pub const E_USER_DEPRECATED: i64 = 16384;
pub const E_ALL: i64 = 32767;

/// All `E_*` constants with their names, in declaration order
pub const ERROR_CONSTANTS: [(&str, i64); 16] = [
    ("E_ERROR", E_ERROR),
    ("E_WARNING", E_WARNING),
    ("E_PARSE", E_PARSE),
    ("E_NOTICE", E_NOTICE),
    ("E_CORE_ERROR", E_CORE_ERROR),
    ("E_CORE_WARNING", E_CORE_WARNING),
    ("E_COMPILE_ERROR", E_COMPILE_ERROR),
    ("E_COMPILE_WARNING", E_COMPILE_WARNING),
    ("E_USER_ERROR", E_USER_ERROR),
    ("E_USER_WARNING", E_USER_WARNING),
    ("E_USER_NOTICE", E_USER_NOTICE),
    ("E_STRICT", E_STRICT),
    ("E_RECOVERABLE_ERROR", E_RECOVERABLE_ERROR),
    ("E_DEPRECATED", E_DEPRECATED),
    ("E_USER_DEPRECATED", E_USER_DEPRECATED),
    ("E_ALL", E_ALL),
];

/// Default profile the configuration is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Dev,
    Prod,
}

/// Where an option change comes from. Options declare the lowest level allowed to change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IniLevel {
    /// `ini_set()` from a script
    User = 1,
    /// Per-directory configuration
    PerDir = 2,
    /// System configuration file
    System = 4,
    /// Any of the above
    All = 7,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownOption(String),
    NotChangeable { name: String, level: IniLevel },
    InvalidValue { name: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownOption(name) => write!(f, "unknown option \"{name}\""),
            ConfigError::NotChangeable { name, level } => {
                write!(f, "option \"{name}\" cannot be changed at {level:?} level")
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "invalid value \"{value}\" for option \"{name}\"")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    /// Mask of reported error levels
    pub error_reporting: i64,
    pub display_errors: bool,
    /// Make `==` and `!=` behave like `===` and `!==`
    pub strict_comparison: bool,
    pub short_open_tag: bool,
    /// Which superglobals are populated, and in what order (`E`, `G`, `P`, `C`, `S`)
    pub variables_order: String,
    /// Merge order of `$_REQUEST`
    pub request_order: String,
    /// Maximum user function nesting depth before a fatal error
    pub max_nesting_level: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_mode(Mode::Dev)
    }
}

impl Config {
    pub fn for_mode(mode: Mode) -> Self {
        let (error_reporting, display_errors) = match mode {
            Mode::Dev => (E_ALL, true),
            Mode::Prod => (0, false),
        };
        Config {
            mode,
            error_reporting,
            display_errors,
            strict_comparison: false,
            short_open_tag: true,
            variables_order: "EGPCS".to_string(),
            request_order: "GP".to_string(),
            max_nesting_level: 4096,
        }
    }

    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| LoadError::config(e.to_string()))
    }

    fn required_level(name: &str) -> Option<IniLevel> {
        match name {
            "error_reporting" | "display_errors" | "strict_comparison" => Some(IniLevel::User),
            "short_open_tag" | "variables_order" | "request_order" => Some(IniLevel::PerDir),
            "max_nesting_level" => Some(IniLevel::System),
            _ => None,
        }
    }

    /// Current value of an option rendered as an ini string
    pub fn get(&self, name: &str) -> Option<String> {
        let flag = |b: bool| if b { "1" } else { "0" }.to_string();
        Some(match name {
            "error_reporting" => self.error_reporting.to_string(),
            "display_errors" => flag(self.display_errors),
            "strict_comparison" => flag(self.strict_comparison),
            "short_open_tag" => flag(self.short_open_tag),
            "variables_order" => self.variables_order.clone(),
            "request_order" => self.request_order.clone(),
            "max_nesting_level" => self.max_nesting_level.to_string(),
            _ => return None,
        })
    }

    /// Change an option, returning its previous value
    pub fn set(
        &mut self,
        name: &str,
        value: &str,
        level: IniLevel,
    ) -> std::result::Result<String, ConfigError> {
        let required =
            Self::required_level(name).ok_or_else(|| ConfigError::UnknownOption(name.to_string()))?;
        if level < required {
            return Err(ConfigError::NotChangeable {
                name: name.to_string(),
                level,
            });
        }
        let old = self.get(name).unwrap_or_default();
        let invalid = || ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "error_reporting" => {
                self.error_reporting = value.trim().parse().map_err(|_| invalid())?
            }
            "display_errors" => self.display_errors = parse_flag(value).ok_or_else(invalid)?,
            "strict_comparison" => {
                self.strict_comparison = parse_flag(value).ok_or_else(invalid)?
            }
            "short_open_tag" => self.short_open_tag = parse_flag(value).ok_or_else(invalid)?,
            "variables_order" => self.variables_order = value.to_ascii_uppercase(),
            "request_order" => self.request_order = value.to_ascii_uppercase(),
            "max_nesting_level" => {
                self.max_nesting_level = value.trim().parse().map_err(|_| invalid())?
            }
            _ => return Err(ConfigError::UnknownOption(name.to_string())),
        }
        Ok(old)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}
