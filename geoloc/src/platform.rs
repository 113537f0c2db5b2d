//! Platform capabilities: API level and network connectivity.

use crate::provider::native::{NativeLocationManager, NativeProvider};

/// Platform API level (comparable integer version).
pub type ApiLevel = u32;

/// First API level whose samples reliably carry vertical accuracy.
pub const VERTICAL_ACCURACY_MIN_API: ApiLevel = 26;

/// First API level that reports the Wi-Fi Aware transport.
pub const WIFI_AWARE_MIN_API: ApiLevel = 26;

/// First API level with an on-device fused native provider.
pub const FUSED_NATIVE_PROVIDER_MIN_API: ApiLevel = 31;

/// Reports the running platform version.
pub trait PlatformProbe: Send + Sync {
    fn api_level(&self) -> ApiLevel;
}

/// Transport of an active network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkTransport {
    Wifi,
    Cellular,
    Vpn,
    WifiAware,
    Ethernet,
    Bluetooth,
}

impl NetworkTransport {
    /// Parses the lowercase names used in scenario and config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "wifi" => Some(Self::Wifi),
            "cellular" => Some(Self::Cellular),
            "vpn" => Some(Self::Vpn),
            "wifi-aware" | "wifi_aware" => Some(Self::WifiAware),
            "ethernet" => Some(Self::Ethernet),
            "bluetooth" => Some(Self::Bluetooth),
            _ => None,
        }
    }
}

/// Inspects the active network connection.
pub trait ConnectivityInspector: Send + Sync {
    /// Transports of the currently active network (empty when offline).
    fn active_network_transports(&self) -> Vec<NetworkTransport>;
}

/// Returns true if a network connection can improve location on this device.
///
/// Requires a network-based native provider and an active Wi-Fi, cellular,
/// VPN or (on new enough platforms) Wi-Fi Aware connection.
pub fn network_available_for_location(
    manager: &dyn NativeLocationManager,
    connectivity: &dyn ConnectivityInspector,
    api_level: ApiLevel,
) -> bool {
    if !manager.has_provider(NativeProvider::Network) {
        return false;
    }

    connectivity
        .active_network_transports()
        .iter()
        .any(|transport| match transport {
            NetworkTransport::Wifi | NetworkTransport::Cellular | NetworkTransport::Vpn => true,
            NetworkTransport::WifiAware => api_level >= WIFI_AWARE_MIN_API,
            NetworkTransport::Ethernet | NetworkTransport::Bluetooth => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedDevice;

    #[test]
    fn test_transport_names() {
        assert_eq!(NetworkTransport::from_name("WiFi"), Some(NetworkTransport::Wifi));
        assert_eq!(
            NetworkTransport::from_name("wifi-aware"),
            Some(NetworkTransport::WifiAware)
        );
        assert_eq!(NetworkTransport::from_name("carrier-pigeon"), None);
    }

    #[test]
    fn test_network_requires_network_provider() {
        let device = SimulatedDevice::new();
        device.set_transports(vec![NetworkTransport::Wifi]);
        device.set_network_provider(false);

        assert!(!network_available_for_location(&device, &device, 34));
    }

    #[test]
    fn test_network_requires_location_capable_transport() {
        let device = SimulatedDevice::new();
        device.set_transports(vec![NetworkTransport::Ethernet]);
        assert!(!network_available_for_location(&device, &device, 34));

        device.set_transports(vec![NetworkTransport::Cellular]);
        assert!(network_available_for_location(&device, &device, 34));
    }

    #[test]
    fn test_wifi_aware_gated_by_api_level() {
        let device = SimulatedDevice::new();
        device.set_transports(vec![NetworkTransport::WifiAware]);

        assert!(!network_available_for_location(&device, &device, 25));
        assert!(network_available_for_location(&device, &device, 26));
    }

    #[test]
    fn test_offline_device_has_no_network() {
        let device = SimulatedDevice::new();
        device.set_transports(Vec::new());
        assert!(!network_available_for_location(&device, &device, 34));
    }
}
