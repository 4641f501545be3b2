//! Session orchestration: full reconciliation passes and the coupon/referral
//! call paths.

use crate::cart::{Cart, CartError, ClosedSessionStamp, ProductCatalog};
use crate::config::Config;
use crate::domain::{
    CouponCode, EffectKind, LineItemId, Money, ReferralCode, RejectionReason,
};
use crate::engine::{
    build_session_update, CustomerProfile, EngineError, EngineResponse, ProfileUpdate,
    PromotionEngine, SessionState,
};
use crate::error::AppError;
use crate::orchestration::context::SessionContext;
use crate::reconcile::{reconcile, LineItemPositionMap};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of submitting a coupon code to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponOutcome {
    /// The engine accepted the code; the coupon line item was created.
    Applied { code: CouponCode },
    /// The engine rejected the code with a structured reason.
    Rejected {
        code: CouponCode,
        reason: RejectionReason,
    },
    /// The engine neither accepted nor rejected the code.
    Unmatched { code: CouponCode },
}

impl CouponOutcome {
    /// The user-facing message for a non-applied outcome.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            CouponOutcome::Applied { .. } => None,
            CouponOutcome::Rejected { reason, .. } => Some(reason.user_message()),
            CouponOutcome::Unmatched { .. } => Some("This coupon could not be applied."),
        }
    }
}

/// Result of submitting a referral code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralOutcome {
    pub error: bool,
    pub message: String,
}

/// Direction of the pending loyalty change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoyaltyDirection {
    Earn,
    Spend,
}

/// Display summary of the session's pending loyalty change.
#[derive(Debug, Clone, PartialEq)]
pub struct LoyaltySummary {
    pub direction: LoyaltyDirection,
    /// Absolute net change.
    pub net_change: Money,
    pub title: &'static str,
}

/// Drives engine evaluation and cart convergence for one shopper session.
///
/// Construct it only when the integration is enabled; the cheap feature
/// checks (`loyalty_enabled`, `referral_enabled`) are handled here.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn PromotionEngine>,
    catalog: Arc<dyn ProductCatalog>,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn PromotionEngine>,
        catalog: Arc<dyn ProductCatalog>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            catalog,
            config,
        }
    }

    /// Evaluate the session, retrying exactly once with a fresh session
    /// identifier when the engine reports the stored session as closed.
    async fn evaluate(
        &self,
        cart: &Cart,
        ctx: &mut SessionContext,
        state: SessionState,
        candidate_coupon: Option<&CouponCode>,
    ) -> Result<EngineResponse, EngineError> {
        let update = build_session_update(
            cart,
            state,
            ctx.session_id(),
            ctx.profile_id(&self.config),
            candidate_coupon,
            &self.config,
            self.catalog.as_ref(),
        );
        match self.engine.evaluate_session(&update).await {
            Err(EngineError::StaleSession) => {
                warn!("Engine reported stale session; retrying once with a fresh id");
                ctx.clear_session_id();
                let update = build_session_update(
                    cart,
                    state,
                    ctx.session_id(),
                    ctx.profile_id(&self.config),
                    candidate_coupon,
                    &self.config,
                    self.catalog.as_ref(),
                );
                self.engine.evaluate_session(&update).await
            }
            other => other,
        }
    }

    /// Run one full reconciliation pass: send the cart snapshot, classify the
    /// returned effects, and converge every cart sub-resource inside a single
    /// transaction. An engine failure aborts before any cart mutation.
    pub async fn refresh(&self, cart: &mut Cart, ctx: &mut SessionContext) -> Result<(), AppError> {
        if !self.config.enabled {
            return Ok(());
        }

        let response = match self.evaluate(cart, ctx, SessionState::Open, None).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Engine evaluation failed; cart left unchanged");
                return Err(e.into());
            }
        };

        let positions = LineItemPositionMap::build(&response.cart_items);
        reconcile(
            cart,
            &response.effects,
            &positions,
            self.catalog.as_ref(),
            ctx,
        )?;
        Ok(())
    }

    /// Submit a candidate coupon code. On acceptance the coupon line item is
    /// created and the code recorded; discounts arrive on the next
    /// [`refresh`](Self::refresh).
    pub async fn add_coupon(
        &self,
        cart: &mut Cart,
        ctx: &mut SessionContext,
        code: CouponCode,
    ) -> Result<CouponOutcome, AppError> {
        let response = self
            .evaluate(cart, ctx, SessionState::Open, Some(&code))
            .await?;

        for effect in &response.effects {
            match &effect.kind {
                EffectKind::AcceptCoupon { code: accepted } if accepted == &code => {
                    cart.transaction(|cart| -> Result<(), CartError> {
                        cart.create_coupon_line_item(code.clone());
                        cart.applied_coupon_codes.push(code.clone());
                        Ok(())
                    })?;
                    info!(coupon = %code, "Coupon accepted");
                    return Ok(CouponOutcome::Applied { code });
                }
                EffectKind::RejectCoupon {
                    code: rejected,
                    reason,
                } if rejected == &code => {
                    info!(coupon = %code, reason = ?reason, "Coupon rejected");
                    return Ok(CouponOutcome::Rejected {
                        code,
                        reason: reason.clone(),
                    });
                }
                _ => {}
            }
        }

        warn!(coupon = %code, "Engine returned no decision for coupon");
        Ok(CouponOutcome::Unmatched { code })
    }

    /// Shopper-initiated coupon removal: unwind free items granted through
    /// the coupon, then drop the coupon line item and its adjustments.
    pub fn remove_coupon(&self, cart: &mut Cart, code: &CouponCode) -> Result<(), AppError> {
        if cart.coupon_line_item(code).is_none() {
            return Err(CartError::CouponNotFound(code.clone()).into());
        }

        cart.transaction(|cart| -> Result<(), CartError> {
            unwind_free_items_for_coupon(cart, code);
            cart.applied_coupon_codes.retain(|c| c != code);
            cart.remove_coupon_line_item(code);
            Ok(())
        })?;
        cart.recalculate_totals();
        Ok(())
    }

    /// Submit a referral code. The stored code survives only if the engine
    /// accepts it.
    pub async fn add_referral(
        &self,
        cart: &mut Cart,
        ctx: &mut SessionContext,
        code: ReferralCode,
    ) -> Result<ReferralOutcome, AppError> {
        if !self.config.referral_enabled {
            return Ok(ReferralOutcome {
                error: true,
                message: "Referral codes are not enabled.".to_string(),
            });
        }
        if cart.referral_code.is_some() {
            return Ok(ReferralOutcome {
                error: true,
                message: "A referral code has already been applied.".to_string(),
            });
        }

        cart.referral_code = Some(code.clone());

        let response = match self.evaluate(cart, ctx, SessionState::Open, None).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Engine evaluation failed while adding referral");
                cart.referral_code = None;
                return Ok(ReferralOutcome {
                    error: true,
                    message: "We could not validate this referral code.".to_string(),
                });
            }
        };

        for effect in &response.effects {
            match &effect.kind {
                EffectKind::AcceptReferral { code: accepted } if accepted == &code => {
                    info!(referral = %code, "Referral accepted");
                    return Ok(ReferralOutcome {
                        error: false,
                        message: format!("Referral code applied ({})", effect.rule_name),
                    });
                }
                EffectKind::RejectReferral {
                    code: rejected,
                    reason,
                } if rejected == &code => {
                    info!(referral = %code, reason = ?reason, "Referral rejected");
                    cart.referral_code = None;
                    return Ok(ReferralOutcome {
                        error: true,
                        message: reason.user_message().to_string(),
                    });
                }
                _ => {}
            }
        }

        cart.referral_code = None;
        Ok(ReferralOutcome {
            error: true,
            message: "We could not validate this referral code.".to_string(),
        })
    }

    /// Clear the stored referral code.
    pub fn remove_referral(&self, cart: &mut Cart) {
        cart.referral_code = None;
        cart.recalculate_totals();
    }

    /// Close the engine session at order confirmation. On success the
    /// session/profile identifiers are stamped onto the cart and forgotten
    /// from the context so the next cart starts a fresh session.
    pub async fn close_session(
        &self,
        cart: &mut Cart,
        ctx: &mut SessionContext,
    ) -> Result<(), AppError> {
        if !self.config.enabled {
            return Ok(());
        }

        let session_id = ctx.session_id();
        let profile_id = ctx.profile_id(&self.config);

        match self.evaluate(cart, ctx, SessionState::Closed, None).await {
            Ok(_) => {
                info!(session = %session_id, "Customer session closed at order confirmation");
                cart.closed_session = Some(ClosedSessionStamp {
                    session_id,
                    profile_id,
                });
                ctx.clear_session_id();
                ctx.clear_profile_id();
                Ok(())
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "Failed to close customer session");
                Err(e.into())
            }
        }
    }

    /// Push the customer profile to the engine (no rule evaluation).
    pub async fn sync_profile(
        &self,
        ctx: &mut SessionContext,
        profile: &CustomerProfile,
    ) -> Result<(), AppError> {
        if let Some(customer_no) = &profile.customer_no {
            ctx.set_customer_no(customer_no.clone());
        }
        let profile_id = ctx.profile_id(&self.config);
        let update = ProfileUpdate::new(profile_id, profile, &self.config.site_id);
        self.engine.upsert_profile(&update).await?;
        Ok(())
    }

    /// The shopper removed an engine-granted free line item; record its sku
    /// so subsequent session updates tell the engine to stop granting it.
    pub fn mark_free_item_rejected(&self, cart: &mut Cart, line_item: LineItemId) {
        let Some(line) = cart.line_item(line_item) else {
            return;
        };
        if line.engine_free_item {
            let sku = line.sku.clone();
            cart.mark_free_item_rejected(sku);
        }
    }

    /// Display summary of the pending loyalty change, if loyalty is enabled
    /// and the last pass produced a non-zero net.
    pub fn loyalty_summary(
        &self,
        ctx: &SessionContext,
        confirmation: bool,
    ) -> Option<LoyaltySummary> {
        if !self.config.enabled || !self.config.loyalty_enabled {
            return None;
        }
        let balance = ctx.loyalty_balance()?;
        let direction = if balance.is_positive() {
            LoyaltyDirection::Earn
        } else {
            LoyaltyDirection::Spend
        };
        let title = match (direction, confirmation) {
            (LoyaltyDirection::Earn, false) => "Loyalty points to earn",
            (LoyaltyDirection::Earn, true) => "Loyalty points earned",
            (LoyaltyDirection::Spend, false) => "Loyalty points to spend",
            (LoyaltyDirection::Spend, true) => "Loyalty points redeemed",
        };
        Some(LoyaltySummary {
            direction,
            net_change: balance.abs(),
            title,
        })
    }
}

/// Unwind free-item lines tied to a coupon that is being removed: a line
/// that is entirely granted stock is removed, a mixed line is shrunk to the
/// shopper's own quantity.
fn unwind_free_items_for_coupon(cart: &mut Cart, code: &CouponCode) {
    let mut lines_to_remove = Vec::new();

    for line in &mut cart.line_items {
        let Some(adj_index) = line.adjustments.iter().position(|a| {
            a.free_item.is_some() && a.linked_coupon.as_ref() == Some(code)
        }) else {
            continue;
        };
        let free_qty = line.adjustments[adj_index]
            .free_item
            .as_ref()
            .map(|g| g.qty)
            .unwrap_or(0);
        let total = line.quantity;
        if total == free_qty {
            lines_to_remove.push(line.id);
        } else {
            line.quantity = total.saturating_sub(free_qty);
            line.adjustments.remove(adj_index);
            line.engine_free_item = false;
        }
    }

    for id in lines_to_remove {
        cart.remove_line_item(id);
    }
}
