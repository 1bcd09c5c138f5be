// Limit price calculation
pub mod pricing;

pub use pricing::{compute_price, quote, reference_price, PriceQuote, PricingError, EMA_SMOOTHING};
