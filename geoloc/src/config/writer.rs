//! INI serialization: `ConfigFile` → commented INI string.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let location = &config.location;
    let min_update_interval = location
        .min_update_interval
        .map(|interval| interval.as_millis().to_string())
        .unwrap_or_default();

    format!(
        r#"[location]
; Maximum wait for a fresh fix, and the update interval of watches (milliseconds, > 0)
timeout_ms = {}
; Maximum age of a cached fix that may be returned (milliseconds)
maximum_age_ms = {}
; Request the highest accuracy the device can deliver
high_accuracy = {}
; Use the native location manager when cloud location services are unusable
fallback_to_native = {}
; Minimum interval between watch updates (milliseconds, empty = provider default)
min_update_interval_ms = {}

[logging]
; Directory for log files
directory = {}
; Log file name (cleared on each start)
file = {}
"#,
        location.timeout.as_millis(),
        location.maximum_age.as_millis(),
        location.high_accuracy,
        location.fallback_to_native,
        min_update_interval,
        config.logging.directory,
        config.logging.file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ini::Ini;

    #[test]
    fn test_written_config_is_valid_ini() {
        let content = to_config_string(&ConfigFile::default());
        let ini = Ini::load_from_str(&content).unwrap();

        let location = ini.section(Some("location")).unwrap();
        assert_eq!(location.get("timeout_ms"), Some("60000"));
        assert_eq!(location.get("fallback_to_native"), Some("false"));
        assert_eq!(location.get("min_update_interval_ms"), Some(""));
        assert!(ini.section(Some("logging")).is_some());
    }
}
