//! Application state: the dependency-injection root.
//!
//! The scanner and remote store are constructed once here and injected
//! behind trait objects, so handlers never reach for globals and tests can
//! substitute failure-injecting doubles.

use std::sync::Arc;

use wayfarer_core::Config;
use wayfarer_services::{CdnClient, ClamAvScanner, RemoteStore, Scanner};

pub struct AppState {
    pub config: Config,
    pub scanner: Arc<dyn Scanner>,
    pub store: Arc<dyn RemoteStore>,
}

impl AppState {
    /// Wire up the production scanner and CDN client from configuration.
    pub fn new(config: Config) -> Self {
        let scanner = Arc::new(ClamAvScanner::new(
            config.clamav_host.clone(),
            config.clamav_port,
            config.scan_posture(),
            config.clamav_timeout_secs,
        ));
        let store = Arc::new(CdnClient::new(&config));
        Self {
            config,
            scanner,
            store,
        }
    }

    /// Construct with explicit service implementations.
    pub fn with_services(
        config: Config,
        scanner: Arc<dyn Scanner>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            config,
            scanner,
            store,
        }
    }
}
