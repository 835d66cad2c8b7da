//! Platform and connectivity facts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target platform the app runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Native iOS.
    Ios,
    /// Native Android.
    Android,
    /// Browser.
    Web,
    /// React Native bridge.
    ReactNative,
}

impl Platform {
    /// All accepted platforms.
    pub const ALL: [Platform; 4] = [
        Platform::Ios,
        Platform::Android,
        Platform::Web,
        Platform::ReactNative,
    ];

    /// The configuration spelling of this platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
            Platform::ReactNative => "react-native",
        }
    }

    /// True for the platforms that run natively (ios, android).
    pub fn is_native(&self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Connectivity as last reported by the network watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// True when the remote store is reachable.
    pub online: bool,
}

impl NetworkStatus {
    /// Reachable.
    pub const ONLINE: NetworkStatus = NetworkStatus { online: true };
    /// Unreachable.
    pub const OFFLINE: NetworkStatus = NetworkStatus { online: false };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_known_values() {
        assert_eq!("ios".parse::<Platform>(), Ok(Platform::Ios));
        assert_eq!("react-native".parse::<Platform>(), Ok(Platform::ReactNative));
        assert!("windows".parse::<Platform>().is_err());
        assert!("React-Native".parse::<Platform>().is_err());
    }

    #[test]
    fn only_ios_and_android_are_native() {
        assert!(Platform::Ios.is_native());
        assert!(Platform::Android.is_native());
        assert!(!Platform::Web.is_native());
        assert!(!Platform::ReactNative.is_native());
    }

    #[test]
    fn platform_serde_uses_config_spelling() {
        let json = serde_json::to_string(&Platform::ReactNative).unwrap();
        assert_eq!(json, "\"react-native\"");
    }

    #[test]
    fn network_status_defaults_offline() {
        assert_eq!(NetworkStatus::default(), NetworkStatus::OFFLINE);
    }
}
