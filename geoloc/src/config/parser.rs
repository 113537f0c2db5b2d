//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::time::Duration;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [location] section
    if let Some(section) = ini.section(Some("location")) {
        if let Some(v) = section.get("timeout_ms") {
            let millis = parse_millis("location", "timeout_ms", v)?;
            if millis == 0 {
                return Err(invalid("location", "timeout_ms", v, "must be positive"));
            }
            config.location.timeout = Duration::from_millis(millis);
        }
        if let Some(v) = section.get("maximum_age_ms") {
            config.location.maximum_age =
                Duration::from_millis(parse_millis("location", "maximum_age_ms", v)?);
        }
        if let Some(v) = section.get("high_accuracy") {
            config.location.high_accuracy = parse_bool("location", "high_accuracy", v)?;
        }
        if let Some(v) = section.get("fallback_to_native") {
            config.location.fallback_to_native = parse_bool("location", "fallback_to_native", v)?;
        }
        if let Some(v) = section.get("min_update_interval_ms") {
            if !v.trim().is_empty() {
                let millis = parse_millis("location", "min_update_interval_ms", v)?;
                config.location.min_update_interval = Some(Duration::from_millis(millis));
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = v.to_string();
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_millis(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(section, key, value, "expected a non-negative number of milliseconds"))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "expected true or false")),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
