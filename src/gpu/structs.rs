#[cfg(feature = "fresco-serde")]
use serde::{Deserialize, Serialize};

/// Environment variable that turns on API validation when set to `1`.
pub const VALIDATION_ENV: &str = "FRESCO_VALIDATION";
/// Environment variable that overrides the backend (`vulkan` or `metal`).
pub const BACKEND_ENV: &str = "FRESCO_BACKEND";

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "fresco-serde", serde(rename_all = "lowercase"))]
pub enum BackendKind {
    Vulkan,
    Metal,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(target_vendor = "apple") {
            BackendKind::Metal
        } else {
            BackendKind::Vulkan
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vulkan" | "vk" => Ok(BackendKind::Vulkan),
            "metal" | "mtl" => Ok(BackendKind::Metal),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Hash, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
pub enum DeviceType {
    Dedicated,
    Integrated,
    #[default]
    Other,
}

/// Settings used when a device is created.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "fresco-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "fresco-serde", serde(default))]
pub struct ContextInfo {
    pub backend: BackendKind,
    /// Physical device to use. `None` picks the first dedicated device.
    pub device_index: Option<usize>,
    pub validation: bool,
    pub frames_in_flight: usize,
    pub app_name: String,
}

impl Default for ContextInfo {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            device_index: None,
            validation: false,
            frames_in_flight: 2,
            app_name: "fresco".to_string(),
        }
    }
}

impl ContextInfo {
    /// Defaults with [`VALIDATION_ENV`] and [`BACKEND_ENV`] applied.
    pub fn from_env() -> Self {
        let mut info = Self::default();
        info.apply_env();
        info
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(VALIDATION_ENV) {
            self.validation = v == "1";
        }
        if let Ok(v) = std::env::var(BACKEND_ENV) {
            match v.parse() {
                Ok(kind) => self.backend = kind,
                Err(err) => log::warn!("ignoring {}: {}", BACKEND_ENV, err),
            }
        }
    }

    #[cfg(feature = "fresco-serde")]
    pub fn from_yaml(src: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parses_backend_names() {
        assert_eq!("Vulkan".parse::<BackendKind>(), Ok(BackendKind::Vulkan));
        assert_eq!("mtl".parse::<BackendKind>(), Ok(BackendKind::Metal));
        assert!("gl".parse::<BackendKind>().is_err());
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        std::env::set_var(VALIDATION_ENV, "1");
        std::env::set_var(BACKEND_ENV, "vulkan");
        let info = ContextInfo::from_env();
        std::env::remove_var(VALIDATION_ENV);
        std::env::remove_var(BACKEND_ENV);

        assert!(info.validation);
        assert_eq!(info.backend, BackendKind::Vulkan);
        assert_eq!(info.frames_in_flight, 2);
    }

    #[test]
    #[serial]
    fn bad_backend_is_ignored() {
        std::env::set_var(BACKEND_ENV, "glide");
        let info = ContextInfo::from_env();
        std::env::remove_var(BACKEND_ENV);
        assert_eq!(info.backend, BackendKind::default());
    }

    #[cfg(feature = "fresco-serde")]
    #[test]
    fn reads_yaml() {
        let info = ContextInfo::from_yaml("backend: metal\nvalidation: true\nframes_in_flight: 3\n")
            .unwrap();
        assert_eq!(info.backend, BackendKind::Metal);
        assert!(info.validation);
        assert_eq!(info.frames_in_flight, 3);
        assert_eq!(info.app_name, "fresco");
    }
}
