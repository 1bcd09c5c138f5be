use crate::config::{AveragingMethod, PricingConfig};
use crate::indicators::{calculate_ema, calculate_sma, calculate_vwap};
use crate::models::{MarketSnapshot, Side};
use rust_decimal::{Decimal, RoundingStrategy};

/// Smoothing factor of the exponential average (weight of each newer trade)
pub const EMA_SMOOTHING: Decimal = Decimal::from_parts(2, 0, 0, false, 1);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("reference price must be positive, got {0}")]
    NonPositiveReference(Decimal),

    #[error("{side} price rounds to {price} which is not a valid limit")]
    NonPositivePrice { side: Side, price: Decimal },
}

/// Everything that went into a limit price, for the per-order summary
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub side: Side,
    pub reference: Decimal,
    /// Highest price taken on this side, or on any side when the sample
    /// carries no taker information
    pub max_trade: Option<Decimal>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub price: Decimal,
}

/// Base reference price of the snapshot under `method`
///
/// Every method falls back to the bid/ask mid when the trade sample is
/// empty.
pub fn reference_price(snapshot: &MarketSnapshot, method: AveragingMethod) -> Decimal {
    let prices: Vec<Decimal> = snapshot.trades.iter().map(|t| t.price).collect();

    let average = match method {
        AveragingMethod::Arithmetic => calculate_sma(&prices),
        AveragingMethod::Weighted => {
            let samples: Vec<(Decimal, Decimal)> = snapshot
                .trades
                .iter()
                .map(|t| (t.price, t.quantity))
                .collect();
            calculate_vwap(&samples).or_else(|| calculate_sma(&prices))
        }
        AveragingMethod::Exponential => {
            let mut ordered = snapshot.trades.clone();
            ordered.sort_by_key(|t| t.executed_at);
            let prices: Vec<Decimal> = ordered.iter().map(|t| t.price).collect();
            calculate_ema(&prices, EMA_SMOOTHING)
        }
    };

    average.unwrap_or_else(|| snapshot.mid())
}

/// Limit price for `side`: markdown below the reference when buying,
/// markup above it when selling, rounded to the tick grid
pub fn compute_price(
    snapshot: &MarketSnapshot,
    side: Side,
    pricing: &PricingConfig,
) -> Result<Decimal, PricingError> {
    let reference = reference_price(snapshot, pricing.method);
    price_from_reference(reference, side, pricing)
}

/// Same as [`compute_price`] but keeps the inputs for logging
pub fn quote(
    snapshot: &MarketSnapshot,
    side: Side,
    pricing: &PricingConfig,
) -> Result<PriceQuote, PricingError> {
    let reference = reference_price(snapshot, pricing.method);
    let price = price_from_reference(reference, side, pricing)?;

    Ok(PriceQuote {
        side,
        reference,
        max_trade: snapshot
            .max_trade_price_for(side)
            .or_else(|| snapshot.max_trade_price()),
        bid: snapshot.bid,
        ask: snapshot.ask,
        price,
    })
}

fn price_from_reference(
    reference: Decimal,
    side: Side,
    pricing: &PricingConfig,
) -> Result<Decimal, PricingError> {
    if reference <= Decimal::ZERO {
        return Err(PricingError::NonPositiveReference(reference));
    }

    let tick = pricing.tick_size;
    let price = match side {
        Side::Buy => {
            let price = round_to_tick(reference * (Decimal::ONE - pricing.markdown), tick);
            if pricing.markdown > Decimal::ZERO && price >= reference {
                // Rounding swallowed the spread; step below the reference
                (reference / tick).ceil() * tick - tick
            } else {
                price
            }
        }
        Side::Sell => {
            let price = round_to_tick(reference * (Decimal::ONE + pricing.markup), tick);
            if pricing.markup > Decimal::ZERO && price <= reference {
                (reference / tick).floor() * tick + tick
            } else {
                price
            }
        }
    };

    if price <= Decimal::ZERO {
        return Err(PricingError::NonPositivePrice { side, price });
    }

    Ok(price.normalize())
}

/// Round half-to-even onto the tick grid
pub fn round_to_tick(value: Decimal, tick: Decimal) -> Decimal {
    (value / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven) * tick
}
