//! Effect classification: flat effect list into per-scope target mappings.

use super::{AdjustmentDetail, CouponRejection, DiscountKind, FreeItemDetail, ReferralRejection};
use crate::domain::{
    AdjustmentKey, CampaignId, CouponCode, CouponId, Effect, EffectKind, ItemPosition, Money, Sku,
};
use crate::orchestration::SessionContext;
use std::collections::BTreeMap;

/// Per-scope target mappings for one reconciliation pass. Transient: computed
/// from an engine response and discarded after the pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedEffects {
    pub order: BTreeMap<AdjustmentKey, AdjustmentDetail>,
    pub product: BTreeMap<ItemPosition, BTreeMap<AdjustmentKey, AdjustmentDetail>>,
    pub shipping: BTreeMap<AdjustmentKey, AdjustmentDetail>,
    pub free_items: BTreeMap<Sku, FreeItemDetail>,
    pub rejected_coupons: BTreeMap<CouponCode, CouponRejection>,
    pub rejected_referral: Option<ReferralRejection>,
}

/// Group effects into typed buckets and refresh the session loyalty balance.
///
/// Duplicate adjustment keys sum their discount values (stacked campaigns
/// sharing a ruleset/campaign pair); metadata comes from the first occurrence.
/// An empty effect list yields all-empty mappings and leaves the loyalty
/// balance cleared — the steady state with no active promotions.
pub fn classify(effects: &[Effect], ctx: &mut SessionContext) -> ClassifiedEffects {
    ctx.clear_loyalty_balance();

    let mut classified = ClassifiedEffects::default();
    let mut loyalty_added = Money::zero();
    let mut loyalty_deducted = Money::zero();

    for effect in effects {
        match &effect.kind {
            EffectKind::SetDiscount { value } => {
                let key = AdjustmentKey::order(
                    effect.ruleset_id,
                    effect.campaign_id,
                    effect.triggered_by_coupon,
                );
                accumulate(
                    &mut classified.order,
                    key,
                    effect,
                    DiscountKind::Order,
                    *value,
                    effects,
                );
            }
            EffectKind::SetDiscountPerItem { position, value } => {
                let key = AdjustmentKey::product(
                    *position,
                    effect.campaign_id,
                    effect.triggered_by_coupon,
                );
                accumulate(
                    classified.product.entry(*position).or_default(),
                    key,
                    effect,
                    DiscountKind::PerItem,
                    *value,
                    effects,
                );
            }
            EffectKind::SetDiscountPerAdditionalCost { value } => {
                let key = AdjustmentKey::shipping(
                    effect.ruleset_id,
                    effect.campaign_id,
                    effect.triggered_by_coupon,
                );
                accumulate(
                    &mut classified.shipping,
                    key,
                    effect,
                    DiscountKind::AdditionalCost,
                    *value,
                    effects,
                );
            }
            EffectKind::AddFreeItem { sku } => {
                // One effect per granted unit.
                classified
                    .free_items
                    .entry(sku.clone())
                    .and_modify(|detail| detail.qty += 1)
                    .or_insert_with(|| {
                        let coupon =
                            coupon_reference(effects, effect.campaign_id, effect.triggered_by_coupon);
                        FreeItemDetail {
                            sku: sku.clone(),
                            qty: 1,
                            campaign_id: effect.campaign_id,
                            rule_name: effect.rule_name.clone(),
                            triggered_by_coupon: effect.triggered_by_coupon,
                            coupon_code: coupon,
                        }
                    });
            }
            EffectKind::RejectCoupon { code, reason } => {
                classified.rejected_coupons.insert(
                    code.clone(),
                    CouponRejection {
                        code: code.clone(),
                        campaign_id: effect.campaign_id,
                        reason: reason.clone(),
                    },
                );
            }
            EffectKind::RejectReferral { code, reason } => {
                // Only one referral is active at a time.
                classified.rejected_referral = Some(ReferralRejection {
                    code: code.clone(),
                    campaign_id: effect.campaign_id,
                    reason: reason.clone(),
                });
            }
            EffectKind::AddLoyaltyPoints { value } => {
                loyalty_added = loyalty_added + *value;
            }
            EffectKind::DeductLoyaltyPoints { value } => {
                loyalty_deducted = loyalty_deducted + *value;
            }
            EffectKind::AcceptCoupon { .. } | EffectKind::AcceptReferral { .. } => {
                // Consumed by the add-coupon/add-referral call paths and by
                // the coupon cross-reference below.
            }
        }
    }

    let net = loyalty_added - loyalty_deducted;
    if !net.is_zero() {
        ctx.set_loyalty_balance(net);
    }

    classified
}

fn accumulate(
    bucket: &mut BTreeMap<AdjustmentKey, AdjustmentDetail>,
    key: AdjustmentKey,
    effect: &Effect,
    kind: DiscountKind,
    value: Money,
    all_effects: &[Effect],
) {
    match bucket.get_mut(&key) {
        Some(detail) => {
            detail.discount = detail.discount + value;
        }
        None => {
            let coupon_code =
                coupon_reference(all_effects, effect.campaign_id, effect.triggered_by_coupon);
            bucket.insert(
                key,
                AdjustmentDetail {
                    campaign_id: effect.campaign_id,
                    ruleset_id: effect.ruleset_id,
                    rule_name: effect.rule_name.clone(),
                    kind,
                    discount: value,
                    triggered_by_coupon: effect.triggered_by_coupon,
                    coupon_code,
                },
            );
        }
    }
}

/// Resolve the coupon code behind a coupon-triggered effect by finding the
/// `AcceptCoupon` effect sharing its campaign and triggering coupon id.
fn coupon_reference(
    effects: &[Effect],
    campaign_id: CampaignId,
    triggered_by_coupon: Option<CouponId>,
) -> Option<CouponCode> {
    let coupon_id = triggered_by_coupon?;
    effects.iter().find_map(|e| match &e.kind {
        EffectKind::AcceptCoupon { code }
            if e.campaign_id == campaign_id && e.triggered_by_coupon == Some(coupon_id) =>
        {
            Some(code.clone())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignId, RulesetId};

    fn money(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    fn effect(kind: EffectKind) -> Effect {
        Effect {
            campaign_id: CampaignId(10),
            ruleset_id: RulesetId(20),
            rule_name: "Summer Sale".into(),
            triggered_by_coupon: None,
            kind,
        }
    }

    #[test]
    fn test_duplicate_keys_sum_discounts() {
        let effects = vec![
            effect(EffectKind::SetDiscount {
                value: money("3"),
            }),
            effect(EffectKind::SetDiscount {
                value: money("2"),
            }),
        ];
        let mut ctx = SessionContext::new();
        let classified = classify(&effects, &mut ctx);

        assert_eq!(classified.order.len(), 1);
        let detail = classified.order.values().next().unwrap();
        assert_eq!(detail.discount, money("5"));
        assert_eq!(detail.rule_name, "Summer Sale");
    }

    #[test]
    fn test_product_effects_bucket_by_position() {
        let effects = vec![
            effect(EffectKind::SetDiscountPerItem {
                position: ItemPosition(0),
                value: money("1"),
            }),
            effect(EffectKind::SetDiscountPerItem {
                position: ItemPosition(1),
                value: money("2"),
            }),
        ];
        let mut ctx = SessionContext::new();
        let classified = classify(&effects, &mut ctx);

        assert_eq!(classified.product.len(), 2);
        assert_eq!(
            classified.product[&ItemPosition(1)]
                .values()
                .next()
                .unwrap()
                .discount,
            money("2")
        );
    }

    #[test]
    fn test_free_items_count_one_unit_per_effect() {
        let effects = vec![
            effect(EffectKind::AddFreeItem {
                sku: Sku::new("MUG-01"),
            }),
            effect(EffectKind::AddFreeItem {
                sku: Sku::new("MUG-01"),
            }),
        ];
        let mut ctx = SessionContext::new();
        let classified = classify(&effects, &mut ctx);
        assert_eq!(classified.free_items[&Sku::new("MUG-01")].qty, 2);
    }

    #[test]
    fn test_coupon_cross_reference_resolves_code() {
        let mut discount = effect(EffectKind::SetDiscount {
            value: money("5"),
        });
        discount.triggered_by_coupon = Some(CouponId(7));
        let mut accept = effect(EffectKind::AcceptCoupon {
            code: CouponCode::new("SAVE10"),
        });
        accept.triggered_by_coupon = Some(CouponId(7));

        let mut ctx = SessionContext::new();
        let classified = classify(&[discount, accept], &mut ctx);
        let detail = classified.order.values().next().unwrap();
        assert_eq!(detail.coupon_code, Some(CouponCode::new("SAVE10")));
        assert_eq!(detail.triggered_by_coupon, Some(CouponId(7)));
    }

    #[test]
    fn test_rejections_bucketed() {
        let effects = vec![
            effect(EffectKind::RejectCoupon {
                code: CouponCode::new("SAVE10"),
                reason: crate::domain::RejectionReason::CouponExpired,
            }),
            effect(EffectKind::RejectReferral {
                code: crate::domain::ReferralCode::new("REF20"),
                reason: crate::domain::RejectionReason::ReferralExpired,
            }),
        ];
        let mut ctx = SessionContext::new();
        let classified = classify(&effects, &mut ctx);
        assert!(classified
            .rejected_coupons
            .contains_key(&CouponCode::new("SAVE10")));
        assert_eq!(
            classified.rejected_referral.as_ref().unwrap().code,
            crate::domain::ReferralCode::new("REF20")
        );
    }

    #[test]
    fn test_loyalty_net_stored() {
        let effects = vec![
            effect(EffectKind::AddLoyaltyPoints {
                value: money("100"),
            }),
            effect(EffectKind::DeductLoyaltyPoints {
                value: money("30"),
            }),
        ];
        let mut ctx = SessionContext::new();
        classify(&effects, &mut ctx);
        assert_eq!(ctx.loyalty_balance(), Some(money("70")));
    }

    #[test]
    fn test_zero_loyalty_net_clears_stored_balance() {
        let mut ctx = SessionContext::new();
        ctx.set_loyalty_balance(money("50"));

        let effects = vec![
            effect(EffectKind::AddLoyaltyPoints {
                value: money("25"),
            }),
            effect(EffectKind::DeductLoyaltyPoints {
                value: money("25"),
            }),
        ];
        classify(&effects, &mut ctx);
        assert_eq!(ctx.loyalty_balance(), None);
    }

    #[test]
    fn test_empty_effect_list_is_steady_state() {
        let mut ctx = SessionContext::new();
        ctx.set_loyalty_balance(money("50"));

        let classified = classify(&[], &mut ctx);
        assert!(classified.order.is_empty());
        assert!(classified.product.is_empty());
        assert!(classified.shipping.is_empty());
        assert!(classified.free_items.is_empty());
        assert!(classified.rejected_coupons.is_empty());
        assert!(classified.rejected_referral.is_none());
        assert_eq!(ctx.loyalty_balance(), None);
    }
}
