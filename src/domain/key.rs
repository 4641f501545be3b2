//! Adjustment correlation keys.
//!
//! Every engine-created price adjustment on the cart is tagged with the
//! [`AdjustmentKey`] derived from the effect that produced it. Equal inputs
//! always derive equal keys, which is what makes reconciliation idempotent:
//! a later pass over unchanged effects finds its own tags and leaves the cart
//! alone. The key is a structured value, not a concatenated string, so id
//! content can never collide with a separator; the canonical string form is
//! only for logs and display.

use crate::domain::primitives::{CampaignId, CouponId, ItemPosition, RulesetId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which cart sub-resource an adjustment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AdjustmentScope {
    Order,
    Product,
    Shipping,
}

impl fmt::Display for AdjustmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentScope::Order => write!(f, "order"),
            AdjustmentScope::Product => write!(f, "product"),
            AdjustmentScope::Shipping => write!(f, "shipping"),
        }
    }
}

/// Scope-specific leading key component: ruleset id for order/shipping
/// adjustments, the engine cart-item position for product adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyAnchor {
    Ruleset(RulesetId),
    Position(ItemPosition),
}

/// Deterministic correlation key for one engine-created adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdjustmentKey {
    pub scope: AdjustmentScope,
    pub anchor: KeyAnchor,
    pub campaign_id: CampaignId,
    pub triggered_by_coupon: Option<CouponId>,
}

impl AdjustmentKey {
    pub fn order(
        ruleset_id: RulesetId,
        campaign_id: CampaignId,
        triggered_by_coupon: Option<CouponId>,
    ) -> Self {
        AdjustmentKey {
            scope: AdjustmentScope::Order,
            anchor: KeyAnchor::Ruleset(ruleset_id),
            campaign_id,
            triggered_by_coupon,
        }
    }

    pub fn product(
        position: ItemPosition,
        campaign_id: CampaignId,
        triggered_by_coupon: Option<CouponId>,
    ) -> Self {
        AdjustmentKey {
            scope: AdjustmentScope::Product,
            anchor: KeyAnchor::Position(position),
            campaign_id,
            triggered_by_coupon,
        }
    }

    pub fn shipping(
        ruleset_id: RulesetId,
        campaign_id: CampaignId,
        triggered_by_coupon: Option<CouponId>,
    ) -> Self {
        AdjustmentKey {
            scope: AdjustmentScope::Shipping,
            anchor: KeyAnchor::Ruleset(ruleset_id),
            campaign_id,
            triggered_by_coupon,
        }
    }
}

impl fmt::Display for AdjustmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scope)?;
        match self.anchor {
            KeyAnchor::Ruleset(r) => write!(f, "{}", r)?,
            KeyAnchor::Position(p) => write!(f, "{}", p)?,
        }
        write!(f, ":{}", self.campaign_id)?;
        if let Some(coupon) = self.triggered_by_coupon {
            write!(f, ":c{}", coupon)?;
        }
        Ok(())
    }
}
