use std::fmt;

use serde::Serialize;

/// Name used in the user agent of outgoing requests.
pub const AGENT_NAME: &str = "w3s";

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
    pub target: &'static str,
    pub version: &'static str,
    pub package_version: &'static str,
}

impl BuildInfo {
    /// Value for the `user-agent` header sent to gateways and
    ///  the storage network.
    pub fn user_agent(&self) -> String {
        format!("{}/{} ({})", AGENT_NAME, self.package_version, self.version)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, profile={}, features={}, built={}, {}, target={})",
            AGENT_NAME,
            self.package_version,
            self.version,
            self.build_profile,
            self.build_features,
            self.build_timestamp,
            self.rust_version,
            self.target,
        )
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        build_profile: env!("W3S_BUILD_PROFILE"),
        build_features: env!("W3S_BUILD_FEATURES"),
        build_timestamp: env!("W3S_BUILD_TIMESTAMP"),
        rust_version: env!("W3S_RUST_VERSION"),
        target: env!("W3S_BUILD_TARGET"),
        version: env!("W3S_REPO_VERSION"),
        package_version: env!("CARGO_PKG_VERSION"),
    }
}
