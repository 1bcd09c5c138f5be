use rust_decimal::Decimal;

/// Calculate Simple Moving Average (SMA) over the whole sample
pub fn calculate_sma(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }

    let sum: Decimal = prices.iter().sum();
    Some(sum / Decimal::from(prices.len()))
}

/// Calculate Volume-Weighted Average Price (VWAP)
///
/// Input is `(price, volume)` pairs. Returns None when the sample is empty
/// or carries no volume at all.
pub fn calculate_vwap(samples: &[(Decimal, Decimal)]) -> Option<Decimal> {
    let total_volume: Decimal = samples.iter().map(|(_, volume)| *volume).sum();
    if total_volume <= Decimal::ZERO {
        return None;
    }

    let notional: Decimal = samples.iter().map(|(price, volume)| price * volume).sum();
    Some(notional / total_volume)
}

/// Calculate Exponential Moving Average (EMA)
///
/// `prices` must be ordered oldest first. The newest price has weight 1,
/// each older one `1 - smoothing` times the weight of the next newer one,
/// and the weights are normalized to sum to 1.
pub fn calculate_ema(prices: &[Decimal], smoothing: Decimal) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }

    let decay = Decimal::ONE - smoothing;
    let mut weight = Decimal::ONE;
    let mut weighted_sum = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;

    for price in prices.iter().rev() {
        weighted_sum += price * weight;
        total_weight += weight;
        weight *= decay;
    }

    Some(weighted_sum / total_weight)
}
