use super::{GatewayError, MarketDataProvider, OrderGateway};
use crate::config::{ApiCredentials, DEFAULT_API_URL};
use crate::models::{Market, MarketSnapshot, Order, OrderStatus, Side, Trade};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

// Bittrex API v3
// Docs: https://bittrex.github.io/api/v3
const RATE_LIMIT_RPM: NonZeroU32 = match NonZeroU32::new(60) {
    Some(rpm) => rpm,
    None => unreachable!(),
};
const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRADE_SAMPLE: usize = 100;

type HmacSha512 = Hmac<Sha512>;

type BittrexRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Which kind of resource a request addresses; decides what a 404 means
#[derive(Debug, Clone, Copy)]
enum Resource {
    Market,
    Order,
}

/// Signed REST client for the Bittrex v3 API
///
/// Cloneable; clones share the connection pool and the rate limiter.
#[derive(Clone)]
pub struct BittrexClient {
    client: Client,
    base_url: String,
    credentials: ApiCredentials,
    rate_limiter: Arc<BittrexRateLimiter>,
    trade_sample: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    bid_rate: Decimal,
    ask_rate: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeResponse {
    executed_at: DateTime<Utc>,
    quantity: Decimal,
    rate: Decimal,
    #[serde(default)]
    taker_side: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    id: String,
    direction: String,
    quantity: Decimal,
    #[serde(default)]
    limit: Option<Decimal>,
    #[serde(default)]
    fill_quantity: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    available: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewOrderRequest {
    market_symbol: String,
    direction: Side,
    #[serde(rename = "type")]
    order_type: &'static str,
    quantity: Decimal,
    limit: Decimal,
    time_in_force: &'static str,
    client_order_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    detail: Option<String>,
}

impl BittrexClient {
    pub fn new(credentials: ApiCredentials) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: DEFAULT_API_URL.to_string(),
            credentials,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(RATE_LIMIT_RPM))),
            trade_sample: DEFAULT_TRADE_SAMPLE,
        })
    }

    /// Point the client at another deployment (or a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound on the recent-trade sample returned in snapshots
    pub fn with_trade_sample(mut self, trade_sample: usize) -> Self {
        self.trade_sample = trade_sample.max(1);
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: bool,
        resource: Resource,
    ) -> Result<T, GatewayError> {
        self.send(Method::GET, path, None, auth, resource).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        auth: bool,
        resource: Resource,
    ) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let payload = body.unwrap_or_default();
        let mut request = self.client.request(method.clone(), &url);

        if auth {
            let timestamp = Utc::now().timestamp_millis().to_string();
            let content_hash = hash_content(&payload);
            let signature = sign_request(
                &self.credentials.api_secret,
                &timestamp,
                &url,
                method.as_str(),
                &content_hash,
            )?;

            request = request
                .header("Api-Key", &self.credentials.api_key)
                .header("Api-Timestamp", timestamp)
                .header("Api-Content-Hash", content_hash)
                .header("Api-Signature", signature);
        }

        if method != Method::GET {
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let err = classify_failure(status, &text, resource);
            tracing::debug!(%method, path, %status, error = %err, "Bittrex request failed");
            return Err(err);
        }

        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Protocol(format!("{} {}: {}", method, path, e)))
    }
}

#[async_trait]
impl MarketDataProvider for BittrexClient {
    async fn snapshot(&self, market: &Market) -> Result<MarketSnapshot, GatewayError> {
        let symbol = market.exchange_symbol();

        let ticker: TickerResponse = self
            .get(&format!("/markets/{}/ticker", symbol), false, Resource::Market)
            .await?;
        let history: Vec<TradeResponse> = self
            .get(&format!("/markets/{}/trades", symbol), false, Resource::Market)
            .await?;

        let trades: Vec<Trade> = history
            .into_iter()
            .take(self.trade_sample)
            .map(|t| Trade {
                price: t.rate,
                quantity: t.quantity,
                executed_at: t.executed_at,
                taker_side: t.taker_side.and_then(|s| s.parse().ok()),
            })
            .collect();

        tracing::debug!(
            market = %market,
            bid = %ticker.bid_rate,
            ask = %ticker.ask_rate,
            trades = trades.len(),
            "Fetched market snapshot"
        );

        Ok(MarketSnapshot {
            bid: ticker.bid_rate,
            ask: ticker.ask_rate,
            trades,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl OrderGateway for BittrexClient {
    async fn submit(
        &self,
        market: &Market,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<String, GatewayError> {
        let request = NewOrderRequest {
            market_symbol: market.exchange_symbol(),
            direction: side,
            order_type: "LIMIT",
            quantity,
            limit: price,
            time_in_force: "GOOD_TIL_CANCELLED",
            client_order_id: Uuid::new_v4().to_string(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| GatewayError::Protocol(format!("encoding order: {}", e)))?;

        let order: OrderResponse = self
            .send(Method::POST, "/orders", Some(body), true, Resource::Market)
            .await?;

        tracing::debug!(order_id = %order.id, client_order_id = %request.client_order_id, "Order accepted");
        Ok(order.id)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, GatewayError> {
        let order: OrderResponse = self
            .get(&format!("/orders/{}", order_id), true, Resource::Order)
            .await?;

        map_status(&order.status, order.fill_quantity)
    }

    async fn find_open_order(&self, market: &Market) -> Result<Option<Order>, GatewayError> {
        let path = format!("/orders/open?marketSymbol={}", market.exchange_symbol());
        let open: Vec<OrderResponse> = self.get(&path, true, Resource::Market).await?;

        match open.into_iter().max_by_key(|o| o.created_at) {
            Some(latest) => Ok(Some(to_order(latest)?)),
            None => Ok(None),
        }
    }

    async fn available_balance(&self, currency: &str) -> Result<Decimal, GatewayError> {
        let balance: BalanceResponse = self
            .get(&format!("/balances/{}", currency), true, Resource::Market)
            .await?;

        Ok(balance.available)
    }
}

fn to_order(response: OrderResponse) -> Result<Order, GatewayError> {
    let side: Side = response
        .direction
        .parse()
        .map_err(GatewayError::Protocol)?;
    let limit_price = response.limit.ok_or_else(|| {
        GatewayError::Protocol(format!("order {} has no limit price", response.id))
    })?;

    Ok(Order {
        status: map_status(&response.status, response.fill_quantity)?,
        id: response.id,
        side,
        limit_price,
        quantity: response.quantity,
        created_at: response.created_at,
    })
}

/// A closed order counts as filled as soon as anything filled; a closed
/// order with nothing filled was cancelled
fn map_status(status: &str, fill_quantity: Decimal) -> Result<OrderStatus, GatewayError> {
    match status {
        "OPEN" => Ok(OrderStatus::Open),
        "CLOSED" if fill_quantity > Decimal::ZERO => Ok(OrderStatus::Filled),
        "CLOSED" => Ok(OrderStatus::Cancelled),
        other => Err(GatewayError::Protocol(format!("unknown order status '{}'", other))),
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Unavailable(err.to_string())
}

fn classify_failure(status: StatusCode, body: &str, resource: Resource) -> GatewayError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .map(|e| e.code.as_str())
        .unwrap_or_default()
        .to_string();
    let message = match parsed.as_ref().and_then(|e| e.detail.as_deref()) {
        Some(detail) => format!("{} ({}): {}", status, code, detail),
        None if code.is_empty() => format!("{}", status),
        None => format!("{} ({})", status, code),
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return GatewayError::Authentication(message);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GatewayError::RateLimited(message);
    }
    if status.is_server_error() {
        return GatewayError::Unavailable(message);
    }
    if code == "INSUFFICIENT_FUNDS" {
        return GatewayError::InsufficientFunds(message);
    }
    if code.starts_with("MARKET_") {
        return GatewayError::MarketUnavailable(message);
    }
    if status == StatusCode::NOT_FOUND || code == "NOT_FOUND" {
        return match resource {
            Resource::Order => GatewayError::UnknownOrder(message),
            Resource::Market => GatewayError::MarketUnavailable(message),
        };
    }

    GatewayError::InvalidOrder(message)
}

/// Hex-encoded SHA-512 of the request body
fn hash_content(body: &str) -> String {
    hex::encode(Sha512::digest(body.as_bytes()))
}

/// Hex-encoded HMAC-SHA512 over `timestamp + url + method + content_hash`
fn sign_request(
    secret: &str,
    timestamp: &str,
    url: &str,
    method: &str,
    content_hash: &str,
) -> Result<String, GatewayError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Authentication(format!("unusable API secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(url.as_bytes());
    mac.update(method.as_bytes());
    mac.update(content_hash.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}
