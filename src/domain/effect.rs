//! Typed promotion-engine effects and their wire representation.
//!
//! The engine returns a flat list of dynamically-typed effect records. They are
//! converted at the client boundary into the closed [`Effect`] sum type so the
//! rest of the crate can match exhaustively; unknown effect types are reported
//! to the caller as `None` and logged there rather than silently dropped.

use crate::domain::money::Money;
use crate::domain::primitives::{
    CampaignId, CouponCode, CouponId, ItemPosition, ReferralCode, RulesetId, Sku,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One declarative instruction from the promotion engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub campaign_id: CampaignId,
    pub ruleset_id: RulesetId,
    pub rule_name: String,
    /// Set when a coupon triggered the owning campaign.
    pub triggered_by_coupon: Option<CouponId>,
    pub kind: EffectKind,
}

/// The enumerated effect kinds, exhaustively matched everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectKind {
    SetDiscount { value: Money },
    SetDiscountPerItem { position: ItemPosition, value: Money },
    SetDiscountPerAdditionalCost { value: Money },
    AddFreeItem { sku: Sku },
    AcceptCoupon { code: CouponCode },
    RejectCoupon { code: CouponCode, reason: RejectionReason },
    AcceptReferral { code: ReferralCode },
    RejectReferral { code: ReferralCode, reason: RejectionReason },
    AddLoyaltyPoints { value: Money },
    DeductLoyaltyPoints { value: Money },
}

/// Raw effect record as the engine serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRecord {
    pub effect_type: String,
    pub campaign_id: i64,
    pub ruleset_id: i64,
    #[serde(default)]
    pub rule_name: String,
    #[serde(default)]
    pub triggered_by_coupon: Option<i64>,
    #[serde(default)]
    pub props: EffectProps,
}

/// Per-type effect properties; `value` is a number for discounts and loyalty,
/// a code string for coupon/referral effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectProps {
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EffectParseError {
    #[error("effect {effect_type}: missing prop {prop}")]
    MissingProp {
        effect_type: String,
        prop: &'static str,
    },
    #[error("effect {effect_type}: prop {prop} has wrong type")]
    BadProp {
        effect_type: String,
        prop: &'static str,
    },
}

impl Effect {
    /// Convert a wire record into a typed effect.
    ///
    /// Returns `Ok(None)` for effect types this integration does not know;
    /// callers log and skip those. Malformed records of a known type error.
    pub fn from_record(record: &EffectRecord) -> Result<Option<Effect>, EffectParseError> {
        let kind = match record.effect_type.as_str() {
            "setDiscount" => EffectKind::SetDiscount {
                value: money_prop(record, "value")?,
            },
            "setDiscountPerItem" => EffectKind::SetDiscountPerItem {
                position: ItemPosition(record.props.position.ok_or_else(|| {
                    EffectParseError::MissingProp {
                        effect_type: record.effect_type.clone(),
                        prop: "position",
                    }
                })?),
                value: money_prop(record, "value")?,
            },
            "setDiscountPerAdditionalCost" => EffectKind::SetDiscountPerAdditionalCost {
                value: money_prop(record, "value")?,
            },
            "addFreeItem" => EffectKind::AddFreeItem {
                sku: Sku::new(record.props.sku.clone().ok_or_else(|| {
                    EffectParseError::MissingProp {
                        effect_type: record.effect_type.clone(),
                        prop: "sku",
                    }
                })?),
            },
            "acceptCoupon" => EffectKind::AcceptCoupon {
                code: CouponCode::new(string_prop(record, "value")?),
            },
            "rejectCoupon" => EffectKind::RejectCoupon {
                code: CouponCode::new(string_prop(record, "value")?),
                reason: rejection_reason(record),
            },
            "acceptReferral" => EffectKind::AcceptReferral {
                code: ReferralCode::new(string_prop(record, "value")?),
            },
            "rejectReferral" => EffectKind::RejectReferral {
                code: ReferralCode::new(string_prop(record, "value")?),
                reason: rejection_reason(record),
            },
            "addLoyaltyPoints" => EffectKind::AddLoyaltyPoints {
                value: money_prop(record, "value")?,
            },
            "deductLoyaltyPoints" => EffectKind::DeductLoyaltyPoints {
                value: money_prop(record, "value")?,
            },
            _ => return Ok(None),
        };

        Ok(Some(Effect {
            campaign_id: CampaignId(record.campaign_id),
            ruleset_id: RulesetId(record.ruleset_id),
            rule_name: record.rule_name.clone(),
            triggered_by_coupon: record.triggered_by_coupon.map(CouponId),
            kind,
        }))
    }
}

fn money_prop(record: &EffectRecord, prop: &'static str) -> Result<Money, EffectParseError> {
    let value = record
        .props
        .value
        .as_ref()
        .ok_or_else(|| EffectParseError::MissingProp {
            effect_type: record.effect_type.clone(),
            prop,
        })?;
    match value {
        serde_json::Value::Number(n) => Money::from_json_number(n),
        _ => None,
    }
    .ok_or_else(|| EffectParseError::BadProp {
        effect_type: record.effect_type.clone(),
        prop,
    })
}

fn string_prop(record: &EffectRecord, prop: &'static str) -> Result<String, EffectParseError> {
    let value = record
        .props
        .value
        .as_ref()
        .ok_or_else(|| EffectParseError::MissingProp {
            effect_type: record.effect_type.clone(),
            prop,
        })?;
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| EffectParseError::BadProp {
            effect_type: record.effect_type.clone(),
            prop,
        })
}

fn rejection_reason(record: &EffectRecord) -> RejectionReason {
    record
        .props
        .rejection_reason
        .as_deref()
        .map(RejectionReason::from_code)
        .unwrap_or_else(|| RejectionReason::Other(String::new()))
}

/// Enumerated engine-side rejection reason for coupons and referrals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    CampaignLimitReached,
    CouponExpired,
    CouponLimitReached,
    CouponNotFound,
    CouponPartOfNotRunningCampaign,
    CouponPartOfNotTriggeredCampaign,
    CouponRecipientDoesNotMatch,
    CouponRejectedByCondition,
    CouponStartDateInFuture,
    EffectCouldNotBeApplied,
    ProfileLimitReached,
    ProfileRequired,
    ReferralCustomerAlreadyReferred,
    AdvocateNotFound,
    ReferralExpired,
    ReferralLimitReached,
    ReferralNotFound,
    ReferralPartOfNotRunningCampaign,
    ReferralRecipientDoesNotMatch,
    ReferralRecipientIdSameAsAdvocate,
    ReferralRejectedByCondition,
    ReferralStartDateInFuture,
    ReferralValidConditionMissing,
    /// Any code this integration does not recognize.
    Other(String),
}

impl RejectionReason {
    pub fn from_code(code: &str) -> Self {
        use RejectionReason::*;
        match code {
            "CampaignLimitReached" => CampaignLimitReached,
            "CouponExpired" => CouponExpired,
            "CouponLimitReached" => CouponLimitReached,
            "CouponNotFound" => CouponNotFound,
            "CouponPartOfNotRunningCampaign" => CouponPartOfNotRunningCampaign,
            "CouponPartOfNotTriggeredCampaign" => CouponPartOfNotTriggeredCampaign,
            "CouponRecipientDoesNotMatch" => CouponRecipientDoesNotMatch,
            "CouponRejectedByCondition" => CouponRejectedByCondition,
            "CouponStartDateInFuture" => CouponStartDateInFuture,
            "EffectCouldNotBeApplied" => EffectCouldNotBeApplied,
            "ProfileLimitReached" => ProfileLimitReached,
            "ProfileRequired" => ProfileRequired,
            "ReferralCustomerAlreadyReferred" => ReferralCustomerAlreadyReferred,
            "AdvocateNotFound" => AdvocateNotFound,
            "ReferralExpired" => ReferralExpired,
            "ReferralLimitReached" => ReferralLimitReached,
            "ReferralNotFound" => ReferralNotFound,
            "ReferralPartOfNotRunningCampaign" => ReferralPartOfNotRunningCampaign,
            "ReferralRecipientDoesNotMatch" => ReferralRecipientDoesNotMatch,
            "ReferralRecipientIdSameAsAdvocate" => ReferralRecipientIdSameAsAdvocate,
            "ReferralRejectedByCondition" => ReferralRejectedByCondition,
            "ReferralStartDateInFuture" => ReferralStartDateInFuture,
            "ReferralValidConditionMissing" => ReferralValidConditionMissing,
            other => Other(other.to_string()),
        }
    }

    /// The user-facing message for this reason.
    pub fn user_message(&self) -> &'static str {
        use RejectionReason::*;
        match self {
            CampaignLimitReached => "This promotion has reached its usage limit.",
            CouponExpired => "This coupon has expired.",
            CouponLimitReached => "This coupon has reached its usage limit.",
            CouponNotFound => "We could not find that coupon code.",
            CouponPartOfNotRunningCampaign => "This coupon is not currently active.",
            CouponPartOfNotTriggeredCampaign => {
                "Your cart does not qualify for this coupon yet."
            }
            CouponRecipientDoesNotMatch => "This coupon was issued to a different customer.",
            CouponRejectedByCondition => "Your cart does not meet the conditions for this coupon.",
            CouponStartDateInFuture => "This coupon is not valid yet.",
            EffectCouldNotBeApplied => "This promotion could not be applied to your cart.",
            ProfileLimitReached => "You have reached the usage limit for this promotion.",
            ProfileRequired => "Please sign in to use this promotion.",
            ReferralCustomerAlreadyReferred => "You have already been referred.",
            AdvocateNotFound => "We could not find the referring customer.",
            ReferralExpired => "This referral code has expired.",
            ReferralLimitReached => "This referral code has reached its usage limit.",
            ReferralNotFound => "We could not find that referral code.",
            ReferralPartOfNotRunningCampaign => "This referral code is not currently active.",
            ReferralRecipientDoesNotMatch => {
                "This referral code was issued to a different customer."
            }
            ReferralRecipientIdSameAsAdvocate => "You cannot use your own referral code.",
            ReferralRejectedByCondition => {
                "Your cart does not meet the conditions for this referral code."
            }
            ReferralStartDateInFuture => "This referral code is not valid yet.",
            ReferralValidConditionMissing => "This referral code cannot be applied.",
            Other(_) => "This code could not be applied.",
        }
    }
}
