use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::api::{GatewayError, MarketDataProvider, OrderGateway};
use crate::config::{PricingConfig, TraderConfig};
use crate::error::{Result, TraderError};
use crate::models::{Market, Order, OrderStatus, Side};
use crate::strategy::{self, PriceQuote};

/// Where the controller is within one order's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Monitoring,
}

/// The single outstanding order and the side to trade next
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub pending_order: Option<Order>,
    pub next_side: Side,
}

impl ControllerState {
    /// Nothing outstanding; the next order goes out on `side`
    pub fn fresh(side: Side) -> Self {
        Self {
            pending_order: None,
            next_side: side,
        }
    }

    /// Pick up monitoring of an order placed before the process started
    pub fn resume(order: Order) -> Self {
        Self {
            next_side: order.side,
            pending_order: Some(order),
        }
    }
}

/// How an order left the book
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Filled(Order),
    Cancelled(Order),
}

impl Resolution {
    pub fn order(&self) -> &Order {
        match self {
            Resolution::Filled(order) | Resolution::Cancelled(order) => order,
        }
    }
}

/// Final status of an order as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Filled,
    Cancelled,
}

impl Terminal {
    fn from_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Open => None,
            OrderStatus::Filled => Some(Terminal::Filled),
            OrderStatus::Cancelled => Some(Terminal::Cancelled),
        }
    }
}

/// Alternates BUY and SELL limit orders, keeping at most one on the book
pub struct OrderLifecycleController {
    market: Market,
    units: Decimal,
    pricing: PricingConfig,
    delay: Duration,
    max_retries: u32,
    market_data: Arc<dyn MarketDataProvider>,
    gateway: Arc<dyn OrderGateway>,
    state: ControllerState,
    phase: Phase,
    consecutive_failures: u32,
    // Set after a transient submit failure that may still have reached the exchange
    reconcile_submit: bool,
}

impl OrderLifecycleController {
    pub fn new(
        config: &TraderConfig,
        market_data: Arc<dyn MarketDataProvider>,
        gateway: Arc<dyn OrderGateway>,
        state: ControllerState,
    ) -> Self {
        let phase = if state.pending_order.is_some() {
            Phase::Monitoring
        } else {
            Phase::Idle
        };

        Self {
            market: config.market.clone(),
            units: config.units,
            pricing: config.pricing.clone(),
            delay: config.delay,
            max_retries: config.max_retries,
            market_data,
            gateway,
            state,
            phase,
            consecutive_failures: 0,
            reconcile_submit: false,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Trade forever; only returns on a fatal error
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            "🚀 Trading {} {} on {} every {:?} (next side: {})",
            self.units,
            self.market.asset,
            self.market,
            self.delay,
            self.state.next_side
        );

        loop {
            match self.step().await? {
                Resolution::Filled(order) => tracing::info!(
                    "✅ {} order {} filled at {}, next side {}",
                    order.side,
                    order.id,
                    order.limit_price,
                    self.state.next_side
                ),
                Resolution::Cancelled(order) => tracing::warn!(
                    "⚠️  {} order {} was cancelled, resubmitting {}",
                    order.side,
                    order.id,
                    self.state.next_side
                ),
            }
        }
    }

    /// Drive one order from submission (or resume) to a terminal status
    pub async fn step(&mut self) -> Result<Resolution> {
        let order = match self.state.pending_order.clone() {
            Some(order) => order,
            None => self.place_order().await?,
        };

        self.phase = Phase::Monitoring;
        let terminal = self.await_terminal(&order.id).await?;

        self.state.pending_order = None;
        self.phase = Phase::Idle;

        match terminal {
            Terminal::Filled => {
                self.state.next_side = order.side.opposite();
                Ok(Resolution::Filled(Order {
                    status: OrderStatus::Filled,
                    ..order
                }))
            }
            Terminal::Cancelled => {
                self.state.next_side = order.side;
                Ok(Resolution::Cancelled(Order {
                    status: OrderStatus::Cancelled,
                    ..order
                }))
            }
        }
    }

    async fn place_order(&mut self) -> Result<Order> {
        self.phase = Phase::Submitting;

        loop {
            match self.try_place().await {
                Ok(order) => {
                    self.consecutive_failures = 0;
                    self.state.pending_order = Some(order.clone());
                    return Ok(order);
                }
                Err(TraderError::Gateway(err)) => self.absorb(err).await?,
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_place(&mut self) -> Result<Order> {
        if self.reconcile_submit {
            let existing = self.gateway.find_open_order(&self.market).await?;
            self.reconcile_submit = false;
            if let Some(order) = existing {
                tracing::info!(
                    "🔁 Adopting open {} order {} left by an interrupted submit",
                    order.side,
                    order.id
                );
                return Ok(order);
            }
        }

        let snapshot = self.market_data.snapshot(&self.market).await?;
        let side = self.state.next_side;
        let quote = strategy::quote(&snapshot, side, &self.pricing)?;
        self.log_quote(&quote);

        match self
            .gateway
            .submit(&self.market, side, self.units, quote.price)
            .await
        {
            Ok(id) => {
                tracing::info!("📝 Placed {} order {}", side, id);
                Ok(Order {
                    id,
                    side,
                    limit_price: quote.price,
                    quantity: self.units,
                    status: OrderStatus::Open,
                    created_at: Utc::now(),
                })
            }
            Err(err) => {
                if err.is_transient() {
                    self.reconcile_submit = true;
                }
                Err(err.into())
            }
        }
    }

    async fn await_terminal(&mut self, order_id: &str) -> Result<Terminal> {
        loop {
            match self.gateway.order_status(order_id).await {
                Ok(status) => {
                    self.consecutive_failures = 0;
                    if let Some(terminal) = Terminal::from_status(status) {
                        return Ok(terminal);
                    }
                    tracing::debug!("Order {} still open, checking again in {:?}", order_id, self.delay);
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => self.absorb(err).await?,
            }
        }
    }

    /// Wait out a transient failure, or escalate it
    async fn absorb(&mut self, err: GatewayError) -> Result<()> {
        if !err.is_transient() {
            return Err(err.into());
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.max_retries {
            return Err(TraderError::RetriesExhausted {
                attempts: self.consecutive_failures,
                last: err,
            });
        }

        tracing::warn!(
            "Transient error ({}/{}): {}. Retrying in {:?}",
            self.consecutive_failures,
            self.max_retries,
            err,
            self.delay
        );
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn log_quote(&self, quote: &PriceQuote) {
        let max_trade = quote
            .max_trade
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        tracing::info!("📊 {} {} {}", quote.side, self.units, self.market);
        tracing::info!(
            "   avg: {} | {} max: {} | bid: {} | ask: {}",
            quote.reference,
            quote.side,
            max_trade,
            quote.bid,
            quote.ask
        );
        tracing::info!(
            "   {} {} @ {} ({})",
            quote.side,
            self.units,
            quote.price,
            self.pricing.method
        );
    }
}
