//! Geoloc - device location with settings resolution and native fallback.
//!
//! The library fronts two location providers with one API:
//!
//! - a cloud-services fused provider, preferred, which checks availability
//!   and location settings first and may ask the user to fix them
//! - the platform-native location manager, used as a fallback when the
//!   caller allows it
//!
//! [`GeolocationController`] decides per request which provider serves it,
//! offers single fetches and continuous watches, and resumes requests
//! suspended on a settings resolution flow once the host reports the user's
//! decision.
//!
//! The external services are consumed through narrow traits collected in
//! [`PlatformServices`]; [`simulator::SimulatedDevice`] implements all of
//! them in memory.
//!
//! # Example
//!
//! ```
//! use futures::StreamExt;
//! use geoloc::simulator::SimulatedDevice;
//! use geoloc::{GeolocationController, LocationOptions, RawLocation};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let device = SimulatedDevice::shared();
//! device.set_primary_fix(Some(RawLocation::at(52.5, 13.4, 1_700_000_000_000)));
//!
//! let controller = GeolocationController::new(device.services());
//! let mut watch = controller.add_watch(LocationOptions::default(), "route");
//!
//! let batch = watch.next().await.unwrap().unwrap();
//! assert_eq!(batch[0].longitude, 13.4);
//!
//! assert!(controller.clear_watch("route"));
//! assert!(watch.next().await.is_none());
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod options;
pub mod platform;
pub mod provider;
pub mod resolution;
pub mod sample;
pub mod simulator;
pub mod watch;

pub use controller::{GeolocationController, PlatformServices};
pub use error::{GeolocationError, ProviderError, SettingsFailure};
pub use options::LocationOptions;
pub use resolution::{ResolutionId, ResolutionResult, ResolutionToken};
pub use sample::{LocationSample, RawLocation};
pub use watch::{WatchItem, WatchStream};
