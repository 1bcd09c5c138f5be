use crate::api::GatewayError;
use crate::config::ConfigError;
use crate::strategy::PricingError;
use rust_decimal::Decimal;

/// Errors that stop the trader
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("insufficient {currency} balance: need {required}, have {available}")]
    InsufficientBalance {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("price calculation failed: {0}")]
    Pricing(#[from] PricingError),

    #[error("gave up after {attempts} consecutive transient failures: {last}")]
    RetriesExhausted { attempts: u32, last: GatewayError },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TraderError>;
