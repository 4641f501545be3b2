pub mod cart;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod reconcile;

pub use cart::{Cart, CartError, InMemoryCatalog, PriceAdjustment, Product, ProductCatalog};
pub use config::Config;
pub use domain::{
    AdjustmentKey, CampaignId, CouponCode, CouponId, Effect, EffectKind, ItemPosition, LineItemId,
    Money, ReferralCode, RejectionReason, RulesetId, SessionId, Sku,
};
pub use engine::{
    EngineError, EngineResponse, HttpPromotionEngine, MockPromotionEngine, PromotionEngine,
};
pub use error::AppError;
pub use orchestration::{CouponOutcome, Orchestrator, ReferralOutcome, SessionContext};
pub use reconcile::{classify, reconcile, ClassifiedEffects, LineItemPositionMap};
