//! Deterministic reconciliation of engine effects onto the cart.
//!
//! A pass classifies the flat effect list into per-scope target mappings, then
//! converges each cart sub-resource: tagged price adjustments per scope, free
//! item quantities, and coupon/referral state. Every step is idempotent —
//! re-running a pass over unchanged effects leaves the cart untouched — and
//! the whole pass runs inside one cart transaction.

use crate::cart::{Cart, CartError, ProductCatalog};
use crate::domain::{
    CampaignId, CouponCode, CouponId, Effect, Money, ReferralCode, RejectionReason, RulesetId, Sku,
};
use crate::orchestration::SessionContext;

pub mod adjustments;
pub mod classify;
pub mod free_items;
pub mod gate;
pub mod position;

pub use adjustments::{
    apply_order_scope, apply_product_scope, apply_shipping_scope, diff, AdjustmentAction,
};
pub use classify::{classify, ClassifiedEffects};
pub use free_items::apply_free_items;
pub use gate::{apply_coupon_rejections, apply_referral_rejection};
pub use position::LineItemPositionMap;

/// Run one reconciliation pass: classify `effects` and converge every cart
/// sub-resource inside a single cart transaction, then reapply shipping costs
/// and recalculate totals. Idempotent: re-running with the same effects and
/// positions is a no-op.
pub fn reconcile(
    cart: &mut Cart,
    effects: &[Effect],
    positions: &LineItemPositionMap,
    catalog: &dyn ProductCatalog,
    ctx: &mut SessionContext,
) -> Result<(), CartError> {
    let classified = classify(effects, ctx);
    cart.transaction(|cart| -> Result<(), CartError> {
        apply_order_scope(cart, &classified.order);
        apply_product_scope(cart, &classified.product, positions);
        apply_shipping_scope(cart, &classified.shipping);
        apply_free_items(cart, &classified.free_items, catalog, ctx);
        apply_coupon_rejections(cart, &classified.rejected_coupons);
        apply_referral_rejection(cart, classified.rejected_referral.as_ref());
        cart.apply_shipping_cost();
        Ok(())
    })?;
    cart.recalculate_totals();
    Ok(())
}

/// Discount effect family a target detail belongs to. An existing adjustment
/// whose key resolves to a detail of a different family is removed and
/// recreated, never updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    Order,
    PerItem,
    AdditionalCost,
}

/// Aggregated target for one adjustment key. `discount` is the sum of every
/// contributing effect's value; the remaining fields come from the first
/// occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentDetail {
    pub campaign_id: CampaignId,
    pub ruleset_id: RulesetId,
    pub rule_name: String,
    pub kind: DiscountKind,
    /// Non-negative magnitude; the cart records it as a negative delta.
    pub discount: Money,
    pub triggered_by_coupon: Option<CouponId>,
    pub coupon_code: Option<CouponCode>,
}

/// Cumulative free quantity the engine currently grants for one sku.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeItemDetail {
    pub sku: Sku,
    pub qty: u32,
    pub campaign_id: CampaignId,
    pub rule_name: String,
    pub triggered_by_coupon: Option<CouponId>,
    pub coupon_code: Option<CouponCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouponRejection {
    pub code: CouponCode,
    pub campaign_id: CampaignId,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralRejection {
    pub code: ReferralCode,
    pub campaign_id: CampaignId,
    pub reason: RejectionReason,
}
