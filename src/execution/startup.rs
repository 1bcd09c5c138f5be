use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::api::OrderGateway;
use crate::config::TraderConfig;
use crate::error::{Result, TraderError};
use crate::execution::{ControllerState, SidePrompt};
use crate::models::{Market, Side};

/// Decides where the controller picks up on process start
pub struct StartupResolver {
    market: Market,
    units: Decimal,
    prompt_enabled: bool,
    gateway: Arc<dyn OrderGateway>,
}

impl StartupResolver {
    pub fn new(config: &TraderConfig, gateway: Arc<dyn OrderGateway>) -> Self {
        Self {
            market: config.market.clone(),
            units: config.units,
            prompt_enabled: config.prompt,
            gateway,
        }
    }

    /// [`resolve`](Self::resolve), abandoned with `None` as soon as
    /// `shutdown` completes
    ///
    /// Nothing has been submitted at this point, so dropping the pending
    /// exchange call or prompt is a clean abort.
    pub async fn resolve_until<F>(
        &self,
        prompt: &mut dyn SidePrompt,
        shutdown: F,
    ) -> Result<Option<ControllerState>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("⚠️  Interrupted during startup");
                Ok(None)
            }
            result = self.resolve(prompt) => result,
        }
    }

    /// Initial controller state, or `None` if the operator aborted
    ///
    /// An open order on the market is always resumed. Otherwise the side
    /// comes from the prompt, or defaults to SELL when running unattended,
    /// in which case the asset balance must already cover `units`.
    pub async fn resolve(&self, prompt: &mut dyn SidePrompt) -> Result<Option<ControllerState>> {
        if let Some(order) = self.gateway.find_open_order(&self.market).await? {
            tracing::info!(
                "🔁 Resuming open {} order {} on {} ({} @ {})",
                order.side,
                order.id,
                self.market,
                order.quantity,
                order.limit_price
            );
            return Ok(Some(ControllerState::resume(order)));
        }

        if self.prompt_enabled {
            return match prompt.choose_side().await? {
                Some(side) => {
                    tracing::info!("Operator chose to start with {}", side);
                    Ok(Some(ControllerState::fresh(side)))
                }
                None => {
                    tracing::info!("Operator aborted at startup");
                    Ok(None)
                }
            };
        }

        let currency = &self.market.asset;
        let available = self.gateway.available_balance(currency).await?;
        if available < self.units {
            return Err(TraderError::InsufficientBalance {
                currency: currency.clone(),
                required: self.units,
                available,
            });
        }

        tracing::info!(
            "No open order on {}; starting with SELL ({} {} available)",
            self.market,
            available,
            currency
        );
        Ok(Some(ControllerState::fresh(Side::Sell)))
    }
}
