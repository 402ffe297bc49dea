//! Container configuration is provided by a [WeldConfigProvider]. The resulting [WeldConfig] is
//! used by [Weld](crate::container::Weld) to configure the container and is also registered as an
//! application scoped bean, so it can be injected into any other bean.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by environment variables prefixed with `WELD_` or `weld.json` file.

use config::{Config, ConfigError, Environment, File};
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use std::sync::Arc;
use weld_core::bean::Bean;
use weld_core::context::APPLICATION_SCOPED;
use weld_core::event::DEFAULT_OBSERVER_PRIORITY;
use weld_core::instance_provider::ErrorPtr;
use weld_core::resolution::DEFAULT_RESOLUTION_CACHE_SIZE;
use weld_core::types::{Class, ClassPtr, Type};

const CONFIG_ENV_PREFIX: &str = "WELD";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "weld.json";

/// Container configuration which can be provided by a [WeldConfigProvider].
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeldConfig {
    /// Should a default tracing logger be installed when the container starts.
    pub install_tracing_logger: bool,
    /// Maximum number of cached resolution results, per resolver.
    pub resolution_cache_size: usize,
    /// Priority of observers which do not declare one.
    pub default_observer_priority: i32,
    /// Should declared injection points be validated when the container starts.
    pub validate_injection_points: bool,
}

impl Default for WeldConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            resolution_cache_size: DEFAULT_RESOLUTION_CACHE_SIZE,
            default_observer_priority: DEFAULT_OBSERVER_PRIORITY,
            validate_injection_points: true,
        }
    }
}

impl From<OptionalWeldConfig> for WeldConfig {
    fn from(value: OptionalWeldConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            resolution_cache_size: value
                .resolution_cache_size
                .unwrap_or(default.resolution_cache_size),
            default_observer_priority: value
                .default_observer_priority
                .unwrap_or(default.default_observer_priority),
            validate_injection_points: value
                .validate_injection_points
                .unwrap_or(default.validate_injection_points),
        }
    }
}

impl WeldConfig {
    /// Loads the config from [CONFIG_FILE], if present, and the environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalWeldConfig>())
            .map(|config| config.into())
    }

    /// Class of the synthetic bean exposing the config.
    pub fn bean_class() -> ClassPtr {
        Class::new("WeldConfig")
    }

    /// Creates an application scoped bean providing this config.
    pub(crate) fn into_bean(self) -> Bean {
        Bean::builder(Type::class(&Self::bean_class()), move |_, _| Ok(self.clone()))
            .scope(APPLICATION_SCOPED)
            .build()
    }
}

/// Provider for [WeldConfig], consulted once when the container is initialized.
#[cfg_attr(test, automock)]
pub trait WeldConfigProvider {
    fn config(&self) -> Result<WeldConfig, ErrorPtr>;
}

/// Default provider, reading the config from the environment.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentConfigProvider;

impl WeldConfigProvider for EnvironmentConfigProvider {
    fn config(&self) -> Result<WeldConfig, ErrorPtr> {
        WeldConfig::init_from_environment().map_err(|error| Arc::new(error) as ErrorPtr)
    }
}

/// Provider returning a fixed config.
#[derive(Clone, Debug, Default)]
pub struct StaticConfigProvider {
    config: WeldConfig,
}

impl StaticConfigProvider {
    pub fn new(config: WeldConfig) -> Self {
        Self { config }
    }
}

impl WeldConfigProvider for StaticConfigProvider {
    fn config(&self) -> Result<WeldConfig, ErrorPtr> {
        Ok(self.config.clone())
    }
}

#[derive(Deserialize)]
struct OptionalWeldConfig {
    install_tracing_logger: Option<bool>,
    resolution_cache_size: Option<usize>,
    default_observer_priority: Option<i32>,
    validate_injection_points: Option<bool>,
}

#[cfg(test)]
mod tests {
    use crate::config::{OptionalWeldConfig, WeldConfig};

    #[test]
    fn should_fill_missing_values_with_defaults() {
        let config: WeldConfig = OptionalWeldConfig {
            install_tracing_logger: Some(false),
            resolution_cache_size: None,
            default_observer_priority: Some(10),
            validate_injection_points: None,
        }
        .into();

        assert_eq!(
            config,
            WeldConfig {
                install_tracing_logger: false,
                default_observer_priority: 10,
                ..Default::default()
            }
        );
    }

    #[test]
    fn should_use_documented_defaults() {
        let config = WeldConfig::default();

        assert!(config.install_tracing_logger);
        assert!(config.validate_injection_points);
        assert_eq!(config.resolution_cache_size, 65536);
        assert_eq!(config.default_observer_priority, 2500);
    }
}
