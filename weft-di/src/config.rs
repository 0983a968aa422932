//! Engine configuration. By default, the config is created with conservative default values, which
//! can then be overwritten by environment variables prefixed with `WEFT_` or a `weft.json` file.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "WEFT";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "weft.json";

/// Behavior switches for [InjectionTarget](crate::injection_target::InjectionTarget)s and the
/// [ComponentFactory](crate::factory::ComponentFactory).
#[non_exhaustive]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EngineConfig {
    /// Should an around-construct chain which never reached the constructor be treated as an
    /// error. When disabled, the constructor is invoked directly after such chain.
    pub strict_around_construct: bool,
    /// Can registering a target for an already known type or name replace the previous one.
    pub allow_definition_overriding: bool,
}

impl From<OptionalEngineConfig> for EngineConfig {
    fn from(value: OptionalEngineConfig) -> Self {
        let default = Self::default();
        Self {
            strict_around_construct: value
                .strict_around_construct
                .unwrap_or(default.strict_around_construct),
            allow_definition_overriding: value
                .allow_definition_overriding
                .unwrap_or(default.allow_definition_overriding),
        }
    }
}

impl EngineConfig {
    /// Reads the config from [CONFIG_FILE], if present, and `WEFT_` environment variables.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Self::from_config(
            Config::builder()
                .add_source(File::with_name(CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
                .build()?,
        )
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        config
            .try_deserialize::<OptionalEngineConfig>()
            .map(|config| config.into())
    }

    pub fn with_strict_around_construct(mut self, strict_around_construct: bool) -> Self {
        self.strict_around_construct = strict_around_construct;
        self
    }

    pub fn with_allow_definition_overriding(mut self, allow_definition_overriding: bool) -> Self {
        self.allow_definition_overriding = allow_definition_overriding;
        self
    }
}

#[derive(Deserialize)]
struct OptionalEngineConfig {
    strict_around_construct: Option<bool>,
    allow_definition_overriding: Option<bool>,
}
