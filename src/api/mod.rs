// Exchange-facing collaborators of the order lifecycle
pub mod bittrex;

pub use bittrex::BittrexClient;

use crate::models::{Market, MarketSnapshot, Order, OrderStatus, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Failures reported by the market data provider and the order gateway
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Market unavailable: {0}")]
    MarketUnavailable(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unexpected exchange response: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Transient errors are retried at the next poll interval
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::RateLimited(_))
    }
}

/// Source of live market data
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Best bid/ask plus the recent-trade sample for `market`
    async fn snapshot(&self, market: &Market) -> Result<MarketSnapshot, GatewayError>;
}

/// Places and tracks limit orders on the exchange
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a limit order and return the exchange-issued order id
    async fn submit(
        &self,
        market: &Market,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<String, GatewayError>;

    /// Current status of a previously placed order
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, GatewayError>;

    /// The most recent open order on `market`, if any
    async fn find_open_order(&self, market: &Market) -> Result<Option<Order>, GatewayError>;

    /// Balance available for trading in `currency`
    async fn available_balance(&self, currency: &str) -> Result<Decimal, GatewayError>;
}
