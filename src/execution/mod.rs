// Order lifecycle: startup resolution, prompting and the trading loop
pub mod controller;
pub mod prompt;
pub mod startup;

pub use controller::{ControllerState, OrderLifecycleController, Phase, Resolution};
pub use prompt::{LinePrompt, SidePrompt, StdinPrompt};
pub use startup::StartupResolver;
