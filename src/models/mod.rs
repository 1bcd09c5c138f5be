use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown order side: {}", other)),
        }
    }
}

/// Order status as observed on the exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Filled and cancelled orders never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

/// A single-market trading pair in `QUOTE-ASSET` form (e.g. `BTC-LTC`
/// trades LTC priced in BTC)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Market {
    pub quote: String,
    pub asset: String,
}

impl Market {
    pub fn parse(identifier: &str) -> Result<Self, String> {
        let (quote, asset) = identifier
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("market must look like QUOTE-ASSET, got '{}'", identifier))?;

        if quote.is_empty() || asset.is_empty() || asset.contains('-') {
            return Err(format!("market must look like QUOTE-ASSET, got '{}'", identifier));
        }

        Ok(Self {
            quote: quote.to_ascii_uppercase(),
            asset: asset.to_ascii_uppercase(),
        })
    }

    /// Symbol used on the wire by the v3 API (`ASSET-QUOTE`)
    pub fn exchange_symbol(&self) -> String {
        format!("{}-{}", self.asset, self.quote)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.quote, self.asset)
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Market::parse(s)
    }
}

/// A public trade from the market history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub price: Decimal,
    pub quantity: Decimal,
    pub executed_at: DateTime<Utc>,
    pub taker_side: Option<Side>,
}

/// Best bid/ask plus a bounded sample of recent trades.
/// Always fetched live, never reused across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub bid: Decimal,
    pub ask: Decimal,
    pub trades: Vec<Trade>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Highest traded price in the sample
    pub fn max_trade_price(&self) -> Option<Decimal> {
        self.trades.iter().map(|t| t.price).max()
    }

    /// Highest price among trades whose taker was on `side`
    pub fn max_trade_price_for(&self, side: Side) -> Option<Decimal> {
        self.trades
            .iter()
            .filter(|t| t.taker_side == Some(side))
            .map(|t| t.price)
            .max()
    }
}

/// A limit order owned by the controller while it is outstanding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub side: Side,
    pub limit_price: Decimal,
    pub quantity: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}
