//! Tracing subscriber setup for hosts embedding the reconciler.
//!
//! The library only emits `tracing` events; nothing is printed unless a host
//! installs a subscriber, either its own or the one built here.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

/// Output profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output at debug level
    Development,
    /// JSON lines at info level
    Production,
    /// Bare registry; tests install their own capture if they need one
    Test,
}

impl Profile {
    fn default_filter(self) -> &'static str {
        match self {
            Profile::Development => "apisurface=debug",
            Profile::Production | Profile::Test => "apisurface=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` overrides the profile's default
/// filter. Calls after the first are ignored.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(profile.default_filter()))
        };
        // A subscriber installed by the host wins; try_init leaves it in place.
        let _ = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter())
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
    });
}
