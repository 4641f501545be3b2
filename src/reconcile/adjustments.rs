//! Adjustment reconciliation for the order, product, and shipping scopes.
//!
//! The same algorithm runs per scope: diff the cart's tagged adjustments
//! against the classified target mapping, then apply the resulting actions.
//! The diff is computed before any mutation, so a pass can never partially
//! interleave reads and writes of the same collection.

use super::{AdjustmentDetail, DiscountKind, LineItemPositionMap};
use crate::cart::{Cart, PriceAdjustment};
use crate::domain::{AdjustmentKey, CouponCode, ItemPosition, Money};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// One planned mutation of a scope's adjustment collection.
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustmentAction {
    /// Rewrite the amount of an existing tagged adjustment and refresh its
    /// coupon association.
    Update {
        id: Uuid,
        magnitude: Money,
        link_coupon: Option<CouponCode>,
    },
    /// Remove an adjustment whose key disappeared from the target or whose
    /// effect kind no longer matches this scope.
    Remove { id: Uuid },
    /// Create a freshly tagged adjustment for a key with no counterpart.
    Create {
        key: AdjustmentKey,
        detail: AdjustmentDetail,
    },
}

/// Diff one scope's existing adjustments against its target mapping.
///
/// Untagged adjustments (platform promotions, free-item grants) are ignored.
/// An existing adjustment whose key is present with the expected kind is
/// marked seen whether or not its amount drifted — that is what keeps a
/// repeated pass from creating duplicates.
pub fn diff(
    existing: &[PriceAdjustment],
    target: &BTreeMap<AdjustmentKey, AdjustmentDetail>,
    expected: DiscountKind,
) -> Vec<AdjustmentAction> {
    let (mut actions, seen) = diff_existing(existing, target, expected);
    actions.extend(missing_creations(target, &seen));
    actions
}

/// Update/remove actions for existing adjustments, plus the set of keys that
/// are already represented on the cart.
fn diff_existing(
    existing: &[PriceAdjustment],
    target: &BTreeMap<AdjustmentKey, AdjustmentDetail>,
    expected: DiscountKind,
) -> (Vec<AdjustmentAction>, BTreeSet<AdjustmentKey>) {
    let mut actions = Vec::new();
    let mut seen = BTreeSet::new();

    for adjustment in existing {
        let Some(key) = adjustment.tag else {
            continue;
        };
        match target.get(&key) {
            Some(detail) if detail.kind == expected => {
                seen.insert(key);
                if adjustment.amount != detail.discount.as_delta() {
                    actions.push(AdjustmentAction::Update {
                        id: adjustment.id,
                        magnitude: detail.discount,
                        link_coupon: coupon_link(detail),
                    });
                }
            }
            _ => {
                // Absent key, or the effect type changed between campaign
                // versions: remove rather than mutate in place.
                actions.push(AdjustmentAction::Remove { id: adjustment.id });
            }
        }
    }

    (actions, seen)
}

fn missing_creations(
    target: &BTreeMap<AdjustmentKey, AdjustmentDetail>,
    seen: &BTreeSet<AdjustmentKey>,
) -> Vec<AdjustmentAction> {
    target
        .iter()
        .filter(|(key, _)| !seen.contains(*key))
        .map(|(key, detail)| AdjustmentAction::Create {
            key: *key,
            detail: detail.clone(),
        })
        .collect()
}

fn coupon_link(detail: &AdjustmentDetail) -> Option<CouponCode> {
    if detail.triggered_by_coupon.is_some() {
        detail.coupon_code.clone()
    } else {
        None
    }
}

fn apply_actions(
    adjustments: &mut Vec<PriceAdjustment>,
    actions: Vec<AdjustmentAction>,
    available_coupons: &[CouponCode],
) {
    for action in actions {
        match action {
            AdjustmentAction::Update {
                id,
                magnitude,
                link_coupon,
            } => {
                if let Some(adjustment) = adjustments.iter_mut().find(|a| a.id == id) {
                    debug!(key = ?adjustment.tag, amount = %magnitude, "Updating adjustment");
                    adjustment.amount = magnitude.as_delta();
                    link(adjustment, link_coupon, available_coupons);
                }
            }
            AdjustmentAction::Remove { id } => {
                adjustments.retain(|a| a.id != id);
            }
            AdjustmentAction::Create { key, detail } => {
                debug!(%key, amount = %detail.discount, "Creating adjustment");
                let mut adjustment =
                    PriceAdjustment::engine(key, detail.discount, detail.rule_name.clone());
                link(&mut adjustment, coupon_link(&detail), available_coupons);
                adjustments.push(adjustment);
            }
        }
    }
}

/// Associate the adjustment with its triggering coupon line item. A missing
/// coupon (removed between snapshot and response) is not fatal; the
/// adjustment stays unlinked.
fn link(
    adjustment: &mut PriceAdjustment,
    coupon: Option<CouponCode>,
    available_coupons: &[CouponCode],
) {
    let Some(code) = coupon else {
        return;
    };
    if available_coupons.contains(&code) {
        adjustment.linked_coupon = Some(code);
    } else {
        warn!(coupon = %code, "Coupon line item not found; adjustment left unlinked");
    }
}

fn cart_coupon_codes(cart: &Cart) -> Vec<CouponCode> {
    cart.coupon_line_items
        .iter()
        .map(|c| c.code.clone())
        .collect()
}

/// Converge the order-level adjustments.
pub fn apply_order_scope(cart: &mut Cart, target: &BTreeMap<AdjustmentKey, AdjustmentDetail>) {
    let coupons = cart_coupon_codes(cart);
    let actions = diff(&cart.adjustments, target, DiscountKind::Order);
    apply_actions(&mut cart.adjustments, actions, &coupons);
}

/// Converge per-product adjustments, resolving each line item to its engine
/// position. A line the engine did not echo (or that lost its position) diffs
/// against an empty target, which removes any stale tagged adjustments.
pub fn apply_product_scope(
    cart: &mut Cart,
    targets: &BTreeMap<ItemPosition, BTreeMap<AdjustmentKey, AdjustmentDetail>>,
    positions: &LineItemPositionMap,
) {
    let coupons = cart_coupon_codes(cart);
    let empty = BTreeMap::new();

    for index in 0..cart.line_items.len() {
        let line_id = cart.line_items[index].id;
        let bucket = positions
            .position(line_id)
            .and_then(|p| targets.get(&p))
            .unwrap_or(&empty);
        let actions = diff(
            &cart.line_items[index].adjustments,
            bucket,
            DiscountKind::PerItem,
        );
        apply_actions(&mut cart.line_items[index].adjustments, actions, &coupons);
    }
}

/// Converge shipping adjustments across all shipping line items. Updates and
/// removals happen wherever the tagged adjustment lives; keys with no
/// existing adjustment are created on the first shipping line, keeping the
/// one-adjustment-per-key invariant when a shipment has several lines.
pub fn apply_shipping_scope(cart: &mut Cart, target: &BTreeMap<AdjustmentKey, AdjustmentDetail>) {
    let coupons = cart_coupon_codes(cart);
    let mut seen_all = BTreeSet::new();

    for shipment in &mut cart.shipments {
        for shipping_line in &mut shipment.shipping_lines {
            let (actions, seen) =
                diff_existing(&shipping_line.adjustments, target, DiscountKind::AdditionalCost);
            apply_actions(&mut shipping_line.adjustments, actions, &coupons);
            seen_all.extend(seen);
        }
    }

    let creations = missing_creations(target, &seen_all);
    if creations.is_empty() {
        return;
    }
    if let Some(first_line) = cart
        .shipments
        .iter_mut()
        .flat_map(|s| s.shipping_lines.iter_mut())
        .next()
    {
        apply_actions(&mut first_line.adjustments, creations, &coupons);
    } else {
        warn!("Shipping discount targeted a cart with no shipping line");
    }
}
