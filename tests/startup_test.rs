mod common;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use autotrader::{
    ControllerState, GatewayError, OrderLifecycleController, Side, SidePrompt, StartupResolver,
    TraderError,
};
use common::{open_order, test_config, Call, FakeExchange};
use rust_decimal_macros::dec;

/// Prompt that answers from a script and counts how often it was asked
struct ScriptedPrompt {
    answer: Option<Side>,
    asked: usize,
}

impl ScriptedPrompt {
    fn answering(answer: Option<Side>) -> Self {
        Self { answer, asked: 0 }
    }
}

#[async_trait]
impl SidePrompt for ScriptedPrompt {
    async fn choose_side(&mut self) -> io::Result<Option<Side>> {
        self.asked += 1;
        Ok(self.answer)
    }
}

/// Operator who never answers
struct SilentPrompt;

#[async_trait]
impl SidePrompt for SilentPrompt {
    async fn choose_side(&mut self) -> io::Result<Option<Side>> {
        std::future::pending().await
    }
}

fn resolver(exchange: &FakeExchange, prompt: bool) -> StartupResolver {
    let mut config = test_config();
    config.prompt = prompt;
    StartupResolver::new(&config, Arc::new(exchange.clone()))
}

#[tokio::test]
async fn test_open_order_is_resumed() {
    let exchange = FakeExchange::new();
    exchange.push_open_order(Ok(Some(open_order("live-7", Side::Buy))));
    let mut prompt = ScriptedPrompt::answering(Some(Side::Sell));

    let state = resolver(&exchange, true)
        .resolve(&mut prompt)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.next_side, Side::Buy);
    assert_eq!(state.pending_order.unwrap().id, "live-7");
    assert_eq!(prompt.asked, 0);
    assert_eq!(exchange.calls(), vec![Call::FindOpen]);
}

#[tokio::test(start_paused = true)]
async fn test_resumed_order_resolves_before_any_submit() {
    let exchange = FakeExchange::new();
    exchange
        .push_open_order(Ok(Some(open_order("live-7", Side::Buy))))
        .mark_outstanding("live-7")
        .push_statuses(&[
            autotrader::OrderStatus::Open,
            autotrader::OrderStatus::Filled,
        ]);
    let mut prompt = ScriptedPrompt::answering(None);

    let state = resolver(&exchange, false)
        .resolve(&mut prompt)
        .await
        .unwrap()
        .unwrap();
    let shared = Arc::new(exchange.clone());
    let mut controller =
        OrderLifecycleController::new(&test_config(), shared.clone(), shared, state);

    controller.step().await.unwrap();
    controller.step().await.unwrap();

    assert_eq!(exchange.submitted_sides(), vec![Side::Sell]);
    assert_eq!(exchange.overlapping_submits(), 0);
}

#[tokio::test]
async fn test_unattended_start_sells_when_balance_covers_units() {
    let exchange = FakeExchange::new();
    exchange.set_balance(dec!(2.5));
    let mut prompt = ScriptedPrompt::answering(Some(Side::Buy));

    let state = resolver(&exchange, false)
        .resolve(&mut prompt)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state, ControllerState::fresh(Side::Sell));
    assert_eq!(prompt.asked, 0);
    assert_eq!(
        exchange.calls(),
        vec![Call::FindOpen, Call::Balance("LTC".to_string())]
    );
}

#[tokio::test]
async fn test_unattended_start_without_balance_is_fatal() {
    let exchange = FakeExchange::new();
    exchange.set_balance(dec!(0));
    let mut prompt = ScriptedPrompt::answering(None);

    let err = resolver(&exchange, false)
        .resolve(&mut prompt)
        .await
        .unwrap_err();

    match err {
        TraderError::InsufficientBalance {
            currency,
            required,
            available,
        } => {
            assert_eq!(currency, "LTC");
            assert_eq!(required, dec!(1));
            assert_eq!(available, dec!(0));
        }
        other => panic!("expected InsufficientBalance, got {:?}", other),
    }
    assert!(exchange.submissions().is_empty());
}

#[tokio::test]
async fn test_prompt_selects_side() {
    for side in [Side::Buy, Side::Sell] {
        let exchange = FakeExchange::new();
        let mut prompt = ScriptedPrompt::answering(Some(side));

        let state = resolver(&exchange, true)
            .resolve(&mut prompt)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state, ControllerState::fresh(side));
        assert_eq!(prompt.asked, 1);
        assert_eq!(exchange.calls(), vec![Call::FindOpen]);
    }
}

#[tokio::test]
async fn test_prompt_abort_has_no_side_effects() {
    let exchange = FakeExchange::new();
    let mut prompt = ScriptedPrompt::answering(None);

    let state = resolver(&exchange, true).resolve(&mut prompt).await.unwrap();

    assert!(state.is_none());
    assert_eq!(exchange.calls(), vec![Call::FindOpen]);
}

#[tokio::test]
async fn test_startup_gateway_errors_are_not_retried() {
    let exchange = FakeExchange::new();
    exchange.push_open_order(Err(GatewayError::Unavailable("timeout".into())));
    let mut prompt = ScriptedPrompt::answering(Some(Side::Buy));

    let err = resolver(&exchange, true)
        .resolve(&mut prompt)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TraderError::Gateway(GatewayError::Unavailable(_))
    ));
    assert_eq!(exchange.calls(), vec![Call::FindOpen]);
    assert_eq!(prompt.asked, 0);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_at_prompt_aborts_cleanly() {
    let exchange = FakeExchange::new();
    let mut prompt = SilentPrompt;
    let shutdown = tokio::time::sleep(std::time::Duration::from_secs(5));

    let state = resolver(&exchange, true)
        .resolve_until(&mut prompt, shutdown)
        .await
        .unwrap();

    assert!(state.is_none());
    assert_eq!(exchange.calls(), vec![Call::FindOpen]);
    assert!(exchange.submissions().is_empty());
}

#[tokio::test]
async fn test_resolve_until_passes_through_without_interrupt() {
    let exchange = FakeExchange::new();
    exchange.push_open_order(Ok(Some(open_order("live-9", Side::Sell))));
    let mut prompt = ScriptedPrompt::answering(None);

    let state = resolver(&exchange, true)
        .resolve_until(&mut prompt, std::future::pending())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.next_side, Side::Sell);
    assert_eq!(state.pending_order.unwrap().id, "live-9");
}

#[tokio::test]
async fn test_resolve_until_keeps_startup_errors() {
    let exchange = FakeExchange::new();
    exchange.set_balance(dec!(0));
    let mut prompt = ScriptedPrompt::answering(None);

    let err = resolver(&exchange, false)
        .resolve_until(&mut prompt, std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(err, TraderError::InsufficientBalance { .. }));
}
