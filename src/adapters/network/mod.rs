//! Payment network adapters.
//!
//! - `PlatformApiVerifier` - HTTP client for the network's server API
//! - `MockVerifier` - Scriptable verifier for tests

mod mock_verifier;
mod platform_api;

pub use mock_verifier::MockVerifier;
pub use platform_api::{PlatformApiConfig, PlatformApiVerifier};
