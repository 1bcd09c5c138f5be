// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::{BittrexClient, GatewayError, MarketDataProvider, OrderGateway};
pub use config::{AveragingMethod, ConfigOverrides, PricingConfig, TraderConfig};
pub use error::{Result, TraderError};
pub use execution::{
    ControllerState, LinePrompt, OrderLifecycleController, Phase, Resolution, SidePrompt,
    StartupResolver, StdinPrompt,
};
pub use models::*;
