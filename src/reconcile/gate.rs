//! Coupon and referral gating on engine rejections.

use super::{CouponRejection, ReferralRejection};
use crate::cart::Cart;
use crate::domain::CouponCode;
use std::collections::BTreeMap;
use tracing::info;

/// Remove coupon line items the engine rejected; retain the rest.
pub fn apply_coupon_rejections(
    cart: &mut Cart,
    rejected: &BTreeMap<CouponCode, CouponRejection>,
) {
    if cart.applied_coupon_codes.is_empty() {
        return;
    }

    let applied = std::mem::take(&mut cart.applied_coupon_codes);
    let mut retained = Vec::with_capacity(applied.len());

    for code in applied {
        if let Some(rejection) = rejected.get(&code) {
            info!(coupon = %code, reason = ?rejection.reason, "Removing rejected coupon");
            cart.remove_coupon_line_item(&code);
        } else {
            retained.push(code);
        }
    }

    cart.applied_coupon_codes = retained;
}

/// Clear the stored referral code if the engine rejected exactly that code.
pub fn apply_referral_rejection(cart: &mut Cart, rejection: Option<&ReferralRejection>) {
    let Some(rejection) = rejection else {
        return;
    };
    if cart.referral_code.as_ref() == Some(&rejection.code) {
        info!(referral = %rejection.code, reason = ?rejection.reason, "Clearing rejected referral");
        cart.referral_code = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignId, ReferralCode, RejectionReason};

    fn rejection(code: &str, reason: RejectionReason) -> CouponRejection {
        CouponRejection {
            code: CouponCode::new(code),
            campaign_id: CampaignId(10),
            reason,
        }
    }

    #[test]
    fn test_rejected_coupon_removed_others_retained() {
        let mut cart = Cart::new("USD");
        cart.create_coupon_line_item(CouponCode::new("SAVE10"));
        cart.create_coupon_line_item(CouponCode::new("KEEP5"));
        cart.applied_coupon_codes = vec![CouponCode::new("SAVE10"), CouponCode::new("KEEP5")];

        let mut rejected = BTreeMap::new();
        rejected.insert(
            CouponCode::new("SAVE10"),
            rejection("SAVE10", RejectionReason::CouponExpired),
        );

        apply_coupon_rejections(&mut cart, &rejected);
        assert_eq!(cart.applied_coupon_codes, vec![CouponCode::new("KEEP5")]);
        assert!(cart.coupon_line_item(&CouponCode::new("SAVE10")).is_none());
        assert!(cart.coupon_line_item(&CouponCode::new("KEEP5")).is_some());
    }

    #[test]
    fn test_no_rejections_is_a_no_op() {
        let mut cart = Cart::new("USD");
        cart.create_coupon_line_item(CouponCode::new("KEEP5"));
        cart.applied_coupon_codes = vec![CouponCode::new("KEEP5")];

        apply_coupon_rejections(&mut cart, &BTreeMap::new());
        assert_eq!(cart.applied_coupon_codes, vec![CouponCode::new("KEEP5")]);
    }

    #[test]
    fn test_referral_cleared_only_on_code_match() {
        let mut cart = Cart::new("USD");
        cart.referral_code = Some(ReferralCode::new("REF20"));

        let other = ReferralRejection {
            code: ReferralCode::new("OTHER"),
            campaign_id: CampaignId(10),
            reason: RejectionReason::ReferralExpired,
        };
        apply_referral_rejection(&mut cart, Some(&other));
        assert_eq!(cart.referral_code, Some(ReferralCode::new("REF20")));

        let matching = ReferralRejection {
            code: ReferralCode::new("REF20"),
            campaign_id: CampaignId(10),
            reason: RejectionReason::ReferralExpired,
        };
        apply_referral_rejection(&mut cart, Some(&matching));
        assert_eq!(cart.referral_code, None);
    }
}
