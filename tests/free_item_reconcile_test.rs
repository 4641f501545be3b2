use promosync::cart::{InMemoryCatalog, Product};
use promosync::domain::{CampaignId, Effect, EffectKind, Money, RulesetId, Sku};
use promosync::engine::{EngineResponse, MockPromotionEngine};
use promosync::{Cart, Config, Orchestrator, SessionContext};
use std::collections::HashMap;
use std::sync::Arc;

fn d(s: &str) -> Money {
    Money::from_str_canonical(s).unwrap()
}

fn test_config() -> Config {
    let mut env = HashMap::new();
    env.insert(
        "PROMO_API_URL".to_string(),
        "http://engine.invalid".to_string(),
    );
    env.insert("PROMO_API_KEY".to_string(), "key".to_string());
    env.insert("SITE_ID".to_string(), "storefront".to_string());
    Config::from_env_map(env).unwrap()
}

fn mug() -> Product {
    Product {
        sku: Sku::new("MUG-01"),
        name: "Mug".into(),
        unit_price: d("10"),
        orderable: true,
        variant: true,
        categories: Vec::new(),
        attributes: HashMap::new(),
    }
}

fn free_mug_effects(count: usize) -> Vec<Effect> {
    (0..count)
        .map(|_| Effect {
            campaign_id: CampaignId(10),
            ruleset_id: RulesetId(20),
            rule_name: "Free Mug".into(),
            triggered_by_coupon: None,
            kind: EffectKind::AddFreeItem {
                sku: Sku::new("MUG-01"),
            },
        })
        .collect()
}

fn orchestrator_with(catalog: InMemoryCatalog, mock: MockPromotionEngine) -> Orchestrator {
    Orchestrator::new(Arc::new(mock), Arc::new(catalog), test_config())
}

#[tokio::test]
async fn test_grant_inserts_line_and_prices_it_free() {
    let mock =
        MockPromotionEngine::new().with_response(EngineResponse::with_effects(free_mug_effects(2)));
    let orchestrator = orchestrator_with(InMemoryCatalog::new().with_product(mug()), mock);

    let mut cart = Cart::new("USD");
    let mut ctx = SessionContext::new();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();

    assert_eq!(cart.line_items.len(), 1);
    let line = &cart.line_items[0];
    assert_eq!(line.quantity, 2);
    assert!(line.engine_free_item);
    assert_eq!(line.free_item_adjustment().unwrap().amount, d("-20"));
    // The two granted units cost nothing.
    assert_eq!(cart.totals.merchandise_total, d("0"));
}

#[tokio::test]
async fn test_shrinking_grant_preserves_customer_added_quantity() {
    let mock = MockPromotionEngine::new()
        .with_response(EngineResponse::with_effects(free_mug_effects(2)))
        .with_response(EngineResponse::with_effects(free_mug_effects(1)));
    let orchestrator = orchestrator_with(InMemoryCatalog::new().with_product(mug()), mock);

    let mut cart = Cart::new("USD");
    let mut ctx = SessionContext::new();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();

    // Shopper adds 3 units of their own: total 5, free 2.
    cart.add_product(&mug(), 3).unwrap();
    assert_eq!(cart.line_items[0].quantity, 5);

    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();
    let line = &cart.line_items[0];
    assert_eq!(line.quantity, 4, "3 customer-added + 1 free");
    assert_eq!(line.free_item_adjustment().unwrap().amount, d("-10"));
}

#[tokio::test]
async fn test_withdrawn_grant_removes_pure_free_line() {
    let mock = MockPromotionEngine::new()
        .with_response(EngineResponse::with_effects(free_mug_effects(2)))
        .with_response(EngineResponse::default());
    let orchestrator = orchestrator_with(InMemoryCatalog::new().with_product(mug()), mock);

    let mut cart = Cart::new("USD");
    let mut ctx = SessionContext::new();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();
    assert_eq!(cart.line_items.len(), 1);

    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();
    assert!(cart.line_items.is_empty());
}

#[tokio::test]
async fn test_withdrawn_grant_keeps_shopper_quantity() {
    let mock = MockPromotionEngine::new()
        .with_response(EngineResponse::with_effects(free_mug_effects(2)))
        .with_response(EngineResponse::default());
    let orchestrator = orchestrator_with(InMemoryCatalog::new().with_product(mug()), mock);

    let mut cart = Cart::new("USD");
    let mut ctx = SessionContext::new();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();
    cart.add_product(&mug(), 3).unwrap();

    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();
    let line = &cart.line_items[0];
    assert_eq!(line.quantity, 3);
    assert!(!line.engine_free_item);
    assert!(line.free_item_adjustment().is_none());
}

#[tokio::test]
async fn test_unorderable_free_item_flags_and_continues() {
    let mut unorderable = mug();
    unorderable.orderable = false;

    // The grant is unavailable but the order discount in the same response
    // must still apply.
    let mut effects = free_mug_effects(1);
    effects.push(Effect {
        campaign_id: CampaignId(11),
        ruleset_id: RulesetId(21),
        rule_name: "5 off".into(),
        triggered_by_coupon: None,
        kind: EffectKind::SetDiscount { value: d("5") },
    });

    let mock = MockPromotionEngine::new().with_response(EngineResponse::with_effects(effects));
    let orchestrator = orchestrator_with(InMemoryCatalog::new().with_product(unorderable), mock);

    let mut cart = Cart::new("USD");
    let mut ctx = SessionContext::new();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();

    assert!(cart.line_items.is_empty());
    assert_eq!(cart.adjustments.len(), 1, "rest of the pass still applied");
    assert!(ctx.take_free_item_unavailable());
    assert!(!ctx.take_free_item_unavailable(), "flag is read once");
}

#[tokio::test]
async fn test_snapshot_reports_only_customer_quantity() {
    let mock = Arc::new(
        MockPromotionEngine::new().with_response(EngineResponse::with_effects(free_mug_effects(2))),
    );
    let orchestrator = Orchestrator::new(
        mock.clone(),
        Arc::new(InMemoryCatalog::new().with_product(mug())),
        test_config(),
    );

    let mut cart = Cart::new("USD");
    let mut ctx = SessionContext::new();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();
    cart.add_product(&mug(), 3).unwrap();
    orchestrator.refresh(&mut cart, &mut ctx).await.unwrap();

    let requests = mock.recorded_requests();
    assert_eq!(requests.len(), 2);
    // First pass: the cart was empty.
    assert!(requests[0].cart_items.is_empty());
    // Second pass: total 5 on the line, 2 granted, only 3 reported.
    assert_eq!(requests[1].cart_items.len(), 1);
    assert_eq!(requests[1].cart_items[0].quantity, 3);
}
