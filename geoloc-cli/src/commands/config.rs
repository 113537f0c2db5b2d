//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path`.

use std::time::Duration;

use clap::Subcommand;
use geoloc::config::{config_file_path, ConfigFile};
use ini::Ini;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., location.timeout_ms)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., location.timeout_ms)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Every supported key, in file order.
const KEYS: &[(&str, &str)] = &[
    ("location", "timeout_ms"),
    ("location", "maximum_age_ms"),
    ("location", "high_accuracy"),
    ("location", "fallback_to_native"),
    ("location", "min_update_interval_ms"),
    ("logging", "directory"),
    ("logging", "file"),
];

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<(&'static str, &'static str), CliError> {
    KEYS.iter()
        .find(|(section, name)| format!("{}.{}", section, name) == key)
        .copied()
        .ok_or_else(|| {
            CliError::Config(format!(
                "Unknown configuration key '{}'. Use 'geoloc config list' to see available keys.",
                key
            ))
        })
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

/// Current value of `section.name` as written in the file.
fn value_of(config: &ConfigFile, section: &str, name: &str) -> String {
    let location = &config.location;
    match (section, name) {
        ("location", "timeout_ms") => millis(location.timeout),
        ("location", "maximum_age_ms") => millis(location.maximum_age),
        ("location", "high_accuracy") => location.high_accuracy.to_string(),
        ("location", "fallback_to_native") => location.fallback_to_native.to_string(),
        ("location", "min_update_interval_ms") => {
            location.min_update_interval.map(millis).unwrap_or_default()
        }
        ("logging", "directory") => config.logging.directory.clone(),
        ("logging", "file") => config.logging.file.clone(),
        _ => String::new(),
    }
}

/// Apply `section.name = value` on top of the INI text `current`, returning
/// the validated configuration.
fn apply_setting(
    current: &str,
    section: &str,
    name: &str,
    value: &str,
) -> Result<ConfigFile, CliError> {
    let mut ini = Ini::load_from_str(current)
        .map_err(|e| CliError::Config(format!("cannot parse config file: {}", e)))?;
    ini.with_section(Some(section)).set(name, value);

    let mut buffer = Vec::new();
    ini.write_to(&mut buffer)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let content = String::from_utf8(buffer).map_err(|e| CliError::Config(e.to_string()))?;

    Ok(ConfigFile::from_ini_str(&content)?)
}

fn run_get(key: &str) -> Result<(), CliError> {
    let (section, name) = parse_key(key)?;
    let config = ConfigFile::load()?;
    let value = value_of(&config, section, name);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let (section, name) = parse_key(key)?;
    let path = config_file_path();
    let current = if path.exists() {
        std::fs::read_to_string(&path)
            .map_err(|e| CliError::Config(format!("cannot read {}: {}", path.display(), e)))?
    } else {
        String::new()
    };

    let config = apply_setting(&current, section, name, value)?;
    config.save()?;

    println!("Set {} = {}", key, value_of(&config, section, name));
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("Configuration Settings");
    println!("======================");

    let mut current_section = "";
    for (section, name) in KEYS {
        if *section != current_section {
            println!();
            println!("[{}]", section);
            current_section = section;
        }

        let value = value_of(&config, section, name);
        if value.is_empty() {
            println!("  {} = (not set)", name);
        } else {
            println!("  {} = {}", name, value);
        }
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_resolves() {
        for (section, name) in KEYS {
            let key = format!("{}.{}", section, name);
            assert_eq!(parse_key(&key).unwrap(), (*section, *name));
        }
        assert!(parse_key("location.speed").is_err());
    }

    #[test]
    fn test_apply_setting_validates() {
        let config = apply_setting("", "location", "timeout_ms", "1200").unwrap();
        assert_eq!(config.location.timeout, Duration::from_millis(1200));
        assert_eq!(value_of(&config, "location", "timeout_ms"), "1200");

        assert!(apply_setting("", "location", "timeout_ms", "0").is_err());
        assert!(apply_setting("", "location", "high_accuracy", "perhaps").is_err());
    }

    #[test]
    fn test_apply_setting_keeps_other_values() {
        let current = "[location]\nfallback_to_native = true\n";
        let config = apply_setting(current, "logging", "file", "trip.log").unwrap();

        assert!(config.location.fallback_to_native);
        assert_eq!(config.logging.file, "trip.log");
    }

    #[test]
    fn test_saved_setting_round_trips_through_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        let config = apply_setting("", "location", "min_update_interval_ms", "250").unwrap();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(
            value_of(&loaded, "location", "min_update_interval_ms"),
            "250"
        );
    }
}
