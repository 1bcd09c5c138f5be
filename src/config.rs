//! Trader configuration.
//!
//! Layers, lowest precedence first: built-in defaults, the optional config
//! file (`--conf`), `AUTOTRADER_*` environment variables, command-line flags.

use crate::models::Market;
use config::{Environment, File, Value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.bittrex.com/v3";
const ENV_PREFIX: &str = "AUTOTRADER";

/// How the reference price is averaged from the recent-trade sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AveragingMethod {
    /// Unweighted mean of trade prices
    #[default]
    Arithmetic,
    /// Volume-weighted mean of trade prices
    Weighted,
    /// Exponential moving average, oldest to newest
    Exponential,
}

impl FromStr for AveragingMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arithmetic" => Ok(AveragingMethod::Arithmetic),
            "weighted" => Ok(AveragingMethod::Weighted),
            "exponential" => Ok(AveragingMethod::Exponential),
            other => Err(ConfigError::Validation(format!(
                "method must be arithmetic, weighted or exponential, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AveragingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AveragingMethod::Arithmetic => "arithmetic",
            AveragingMethod::Weighted => "weighted",
            AveragingMethod::Exponential => "exponential",
        };
        f.write_str(name)
    }
}

/// Everything the price calculator needs
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    /// Fraction added to the reference price when selling
    pub markup: Decimal,
    /// Fraction subtracted from the reference price when buying
    pub markdown: Decimal,
    pub method: AveragingMethod,
    /// Minimum price increment of the market
    pub tick_size: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            markup: Decimal::new(1, 1),
            markdown: Decimal::new(1, 1),
            method: AveragingMethod::Arithmetic,
            tick_size: Decimal::new(1, 8),
        }
    }
}

#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Immutable for the lifetime of the process
#[derive(Debug, Clone)]
pub struct TraderConfig {
    pub market: Market,
    /// BUY/SELL quantity of every order
    pub units: Decimal,
    pub pricing: PricingConfig,
    /// Wait between order status polls (and between transient retries)
    pub delay: Duration,
    /// Ask the operator for the first side on a cold start
    pub prompt: bool,
    /// Consecutive transient failures tolerated before giving up
    pub max_retries: u32,
    pub api_url: String,
    pub credentials: ApiCredentials,
}

/// Values supplied on the command line; `None` leaves lower layers alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub conf: Option<PathBuf>,
    pub apikey: Option<String>,
    pub secret: Option<String>,
    pub market: Option<String>,
    pub units: Option<String>,
    pub spread: Option<String>,
    pub markup: Option<String>,
    pub markdown: Option<String>,
    pub method: Option<String>,
    pub delay: Option<String>,
    pub prompt: Option<bool>,
    pub tick_size: Option<String>,
    pub max_retries: Option<u32>,
    pub api_url: Option<String>,
}

/// Flat, stringly-typed view of the merged layers
#[derive(Debug, Deserialize)]
struct RawConfig {
    apikey: Option<String>,
    secret: Option<String>,
    market: String,
    units: String,
    spread: Option<String>,
    markup: String,
    markdown: String,
    method: String,
    delay: String,
    prompt: bool,
    tick_size: String,
    max_retries: u32,
    api_url: String,
}

impl TraderConfig {
    /// Merge every configuration layer and validate the result
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(overrides, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(
        overrides: &ConfigOverrides,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("market", "BTC-LTC")?
            .set_default("units", "1")?
            .set_default("markup", "0.1")?
            .set_default("markdown", "0.1")?
            .set_default("method", "arithmetic")?
            .set_default("delay", "30")?
            .set_default("prompt", true)?
            .set_default("tick_size", "0.00000001")?
            .set_default("max_retries", 10_i64)?
            .set_default("api_url", DEFAULT_API_URL)?;

        // File values replace the built-in defaults but stay below env and CLI
        if let Some(path) = &overrides.conf {
            for (key, value) in read_config_file(path)? {
                builder = builder.set_default(key, value)?;
            }
        }

        let raw: RawConfig = builder
            .add_source(environment)
            .set_override_option("apikey", overrides.apikey.clone())?
            .set_override_option("secret", overrides.secret.clone())?
            .set_override_option("market", overrides.market.clone())?
            .set_override_option("units", overrides.units.clone())?
            .set_override_option("spread", overrides.spread.clone())?
            .set_override_option("markup", overrides.markup.clone())?
            .set_override_option("markdown", overrides.markdown.clone())?
            .set_override_option("method", overrides.method.clone())?
            .set_override_option("delay", overrides.delay.clone())?
            .set_override_option("prompt", overrides.prompt)?
            .set_override_option("tick_size", overrides.tick_size.clone())?
            .set_override_option("max_retries", overrides.max_retries.map(i64::from))?
            .set_override_option("api_url", overrides.api_url.clone())?
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let api_key = raw
            .apikey
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("apikey".to_string()))?;
        let api_secret = raw
            .secret
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("secret".to_string()))?;

        let market = Market::parse(&raw.market).map_err(ConfigError::Validation)?;

        // `spread` is "markup/markdown" and wins over the individual keys
        let (markup, markdown) = match raw.spread.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(spread) => {
                let (up, down) = spread.split_once('/').ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "spread must look like markup/markdown, got '{}'",
                        spread
                    ))
                })?;
                (parse_decimal("markup", up)?, parse_decimal("markdown", down)?)
            }
            None => (
                parse_decimal("markup", &raw.markup)?,
                parse_decimal("markdown", &raw.markdown)?,
            ),
        };

        let delay_secs: f64 = raw.delay.trim().parse().map_err(|_| {
            ConfigError::Validation(format!("delay must be a number of seconds, got '{}'", raw.delay))
        })?;
        let delay = Duration::try_from_secs_f64(delay_secs).map_err(|_| {
            ConfigError::Validation(format!("delay must be a positive number of seconds, got '{}'", raw.delay))
        })?;

        let config = Self {
            market,
            units: parse_decimal("units", &raw.units)?,
            pricing: PricingConfig {
                markup: normalize_fraction(markup),
                markdown: normalize_fraction(markdown),
                method: raw.method.parse()?,
                tick_size: parse_decimal("tick_size", &raw.tick_size)?,
            },
            delay,
            prompt: raw.prompt,
            max_retries: raw.max_retries,
            api_url: raw.api_url.trim_end_matches('/').to_string(),
            credentials: ApiCredentials { api_key, api_secret },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.units <= Decimal::ZERO {
            return Err(ConfigError::Validation("units must be positive".to_string()));
        }

        if self.pricing.markup < Decimal::ZERO {
            return Err(ConfigError::Validation("markup must be non-negative".to_string()));
        }

        if self.pricing.markdown < Decimal::ZERO || self.pricing.markdown >= Decimal::ONE {
            return Err(ConfigError::Validation(
                "markdown must be in [0, 1) so BUY prices stay positive".to_string(),
            ));
        }

        if self.pricing.tick_size <= Decimal::ZERO {
            return Err(ConfigError::Validation("tick_size must be positive".to_string()));
        }

        if self.delay.is_zero() {
            return Err(ConfigError::Validation("delay must be greater than 0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Validation("max_retries must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Read a config file, accepting either top-level keys or a `[config]`
/// section
fn read_config_file(path: &Path) -> Result<HashMap<String, Value>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let file = config::Config::builder()
        .add_source(File::from(path))
        .build()?;

    if let Ok(section) = file.get_table("config") {
        return Ok(section.into_iter().collect());
    }

    Ok(file.try_deserialize()?)
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| {
        ConfigError::Validation(format!("{} must be a decimal number, got '{}'", key, value))
    })
}

/// Values of 1 or more are percentages (`5` means 5%), smaller values are
/// already fractions
pub fn normalize_fraction(value: Decimal) -> Decimal {
    if value < Decimal::ONE {
        value
    } else {
        value / Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
