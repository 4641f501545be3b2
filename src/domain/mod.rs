//! Domain types for the promotion-engine cart integration.
//!
//! This module provides:
//! - Lossless monetary amounts via the Money wrapper
//! - Identifier newtypes for campaigns, rulesets, coupons, skus, and line items
//! - The closed Effect sum type parsed from engine responses
//! - The structured AdjustmentKey used to correlate adjustments across passes

pub mod effect;
pub mod key;
pub mod money;
pub mod primitives;

pub use effect::{Effect, EffectKind, EffectParseError, EffectProps, EffectRecord, RejectionReason};
pub use key::{AdjustmentKey, AdjustmentScope, KeyAnchor};
pub use money::Money;
pub use primitives::{
    CampaignId, CouponCode, CouponId, ItemPosition, LineItemId, ProfileId, ReferralCode, RulesetId,
    SessionId, Sku,
};
