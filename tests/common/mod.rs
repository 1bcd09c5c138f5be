#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autotrader::config::ApiCredentials;
use autotrader::{
    GatewayError, Market, MarketDataProvider, MarketSnapshot, Order, OrderGateway, OrderStatus,
    PricingConfig, Side, Trade, TraderConfig,
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn test_config() -> TraderConfig {
    TraderConfig {
        market: Market::parse("BTC-LTC").unwrap(),
        units: dec!(1),
        pricing: PricingConfig::default(),
        delay: Duration::from_secs(30),
        prompt: false,
        max_retries: 3,
        api_url: "http://localhost".to_string(),
        credentials: ApiCredentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        },
    }
}

/// Trades at 100, 102 and 98 with the book at 99/101
pub fn snapshot_around_100() -> MarketSnapshot {
    snapshot_with_prices(&[dec!(100), dec!(102), dec!(98)])
}

pub fn snapshot_with_prices(prices: &[Decimal]) -> MarketSnapshot {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    MarketSnapshot {
        bid: dec!(99),
        ask: dec!(101),
        trades: prices
            .iter()
            .enumerate()
            .map(|(i, price)| Trade {
                price: *price,
                quantity: dec!(1),
                executed_at: start + chrono::Duration::seconds(i as i64),
                taker_side: None,
            })
            .collect(),
        fetched_at: start,
    }
}

pub fn open_order(id: &str, side: Side) -> Order {
    Order {
        id: id.to_string(),
        side,
        limit_price: dec!(0.0035),
        quantity: dec!(1),
        status: OrderStatus::Open,
        created_at: Utc::now(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Everything the exchange was asked, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Snapshot,
    Submit(Side),
    Status(String),
    FindOpen,
    Balance(String),
}

#[derive(Default)]
struct Inner {
    snapshots: VecDeque<Result<MarketSnapshot, GatewayError>>,
    submit_results: VecDeque<Result<String, GatewayError>>,
    statuses: VecDeque<Result<OrderStatus, GatewayError>>,
    open_orders: VecDeque<Result<Option<Order>, GatewayError>>,
    balance: Decimal,

    calls: Vec<Call>,
    submissions: Vec<Submission>,
    outstanding: Option<String>,
    overlapping_submits: usize,
    next_id: usize,
}

/// Scripted market data provider and order gateway
///
/// Unscripted calls fall back to: the snapshot around 100, generated order
/// ids, FILLED statuses, no open orders.
#[derive(Clone, Default)]
pub struct FakeExchange {
    inner: Arc<Mutex<Inner>>,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_snapshot(&self, result: Result<MarketSnapshot, GatewayError>) -> &Self {
        self.inner.lock().unwrap().snapshots.push_back(result);
        self
    }

    pub fn push_submit(&self, result: Result<String, GatewayError>) -> &Self {
        self.inner.lock().unwrap().submit_results.push_back(result);
        self
    }

    pub fn push_status(&self, result: Result<OrderStatus, GatewayError>) -> &Self {
        self.inner.lock().unwrap().statuses.push_back(result);
        self
    }

    pub fn push_statuses(&self, statuses: &[OrderStatus]) -> &Self {
        for status in statuses {
            self.push_status(Ok(*status));
        }
        self
    }

    pub fn push_open_order(&self, result: Result<Option<Order>, GatewayError>) -> &Self {
        self.inner.lock().unwrap().open_orders.push_back(result);
        self
    }

    pub fn set_balance(&self, balance: Decimal) -> &Self {
        self.inner.lock().unwrap().balance = balance;
        self
    }

    /// Treat `id` as already resting on the book
    pub fn mark_outstanding(&self, id: &str) -> &Self {
        self.inner.lock().unwrap().outstanding = Some(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.inner.lock().unwrap().submissions.clone()
    }

    pub fn submitted_sides(&self) -> Vec<Side> {
        self.submissions().iter().map(|s| s.side).collect()
    }

    pub fn status_polls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(_)))
            .count()
    }

    /// Submits issued while another order had not been seen terminal
    pub fn overlapping_submits(&self) -> usize {
        self.inner.lock().unwrap().overlapping_submits
    }
}

#[async_trait]
impl MarketDataProvider for FakeExchange {
    async fn snapshot(&self, _market: &Market) -> Result<MarketSnapshot, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Snapshot);
        inner
            .snapshots
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot_around_100()))
    }
}

#[async_trait]
impl OrderGateway for FakeExchange {
    async fn submit(
        &self,
        _market: &Market,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<String, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Submit(side));
        if inner.outstanding.is_some() {
            inner.overlapping_submits += 1;
        }

        let result = match inner.submit_results.pop_front() {
            Some(result) => result,
            None => {
                inner.next_id += 1;
                Ok(format!("order-{}", inner.next_id))
            }
        };

        if let Ok(id) = &result {
            inner.outstanding = Some(id.clone());
            inner.submissions.push(Submission {
                side,
                quantity,
                price,
            });
        }
        result
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Status(order_id.to_string()));
        let result = inner
            .statuses
            .pop_front()
            .unwrap_or(Ok(OrderStatus::Filled));

        if let Ok(status) = &result {
            if status.is_terminal() {
                inner.outstanding = None;
            }
        }
        result
    }

    async fn find_open_order(&self, _market: &Market) -> Result<Option<Order>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::FindOpen);
        inner.open_orders.pop_front().unwrap_or(Ok(None))
    }

    async fn available_balance(&self, currency: &str) -> Result<Decimal, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Balance(currency.to_string()));
        Ok(inner.balance)
    }
}
