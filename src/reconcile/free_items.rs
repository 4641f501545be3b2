//! Free-item reconciliation.
//!
//! Free items are the one effect category that mutates line item *quantity*,
//! not just price. The invariant this module protects: units the shopper
//! added on top of an engine grant are never lost, whatever the engine does
//! to the grant.

use super::FreeItemDetail;
use crate::cart::{Cart, FreeItemGrant, PriceAdjustment, ProductCatalog};
use crate::domain::{CouponCode, LineItemId, Sku};
use crate::orchestration::SessionContext;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Converge engine-granted free stock with the target grants.
///
/// Existing flagged lines are updated or unwound first; skus the engine
/// grants but the cart does not carry are then added through the catalog.
/// Unavailable products set the session's recoverable flag and do not abort
/// the rest of the pass.
pub fn apply_free_items(
    cart: &mut Cart,
    targets: &BTreeMap<Sku, FreeItemDetail>,
    catalog: &dyn ProductCatalog,
    ctx: &mut SessionContext,
) {
    let available_coupons: Vec<CouponCode> = cart
        .coupon_line_items
        .iter()
        .map(|c| c.code.clone())
        .collect();

    let mut represented: BTreeSet<Sku> = BTreeSet::new();
    let mut lines_to_remove: Vec<LineItemId> = Vec::new();

    for index in 0..cart.line_items.len() {
        let line = &mut cart.line_items[index];
        let Some(adj_index) = line.adjustments.iter().position(|a| a.free_item.is_some()) else {
            continue;
        };

        match targets.get(&line.sku) {
            Some(detail) => {
                represented.insert(line.sku.clone());
                reconcile_existing_grant(line, adj_index, detail, &available_coupons);
            }
            None => {
                // Grant withdrawn: give back only the granted units.
                let free_qty = line.adjustments[adj_index]
                    .free_item
                    .as_ref()
                    .map(|g| g.qty)
                    .unwrap_or(0);
                let total = line.quantity;
                if total == free_qty {
                    lines_to_remove.push(line.id);
                } else if total.saturating_sub(free_qty) >= 1 {
                    debug!(sku = %line.sku, "Stripping withdrawn free grant, keeping shopper units");
                    line.quantity = total - free_qty;
                    line.adjustments.remove(adj_index);
                    line.engine_free_item = false;
                }
            }
        }
    }

    for id in lines_to_remove {
        cart.remove_line_item(id);
    }

    for (sku, detail) in targets {
        if represented.contains(sku) {
            continue;
        }
        create_granted_line(cart, sku, detail, catalog, ctx, &available_coupons);
    }
}

fn reconcile_existing_grant(
    line: &mut crate::cart::ProductLineItem,
    adj_index: usize,
    detail: &FreeItemDetail,
    available_coupons: &[CouponCode],
) {
    let old_free = line.adjustments[adj_index]
        .free_item
        .as_ref()
        .map(|g| g.qty)
        .unwrap_or(0);
    let discounted = line.unit_price * detail.qty;

    if old_free == detail.qty && line.adjustments[adj_index].amount == discounted.as_delta() {
        return;
    }

    let total = line.quantity;
    line.adjustments[adj_index].amount = discounted.as_delta();
    line.quantity = if total == old_free {
        // Pure free line: track the grant exactly.
        detail.qty
    } else {
        let customer_added = total.saturating_sub(old_free);
        if customer_added > 0 {
            customer_added + detail.qty
        } else {
            detail.qty
        }
    };
    if let Some(grant) = line.adjustments[adj_index].free_item.as_mut() {
        grant.qty = detail.qty;
    }

    if let Some(code) = triggering_coupon(detail) {
        if available_coupons.contains(&code) {
            line.adjustments[adj_index].linked_coupon = Some(code);
        } else {
            warn!(coupon = %code, "Coupon line item not found; free-item adjustment left unlinked");
        }
    }
}

fn create_granted_line(
    cart: &mut Cart,
    sku: &Sku,
    detail: &FreeItemDetail,
    catalog: &dyn ProductCatalog,
    ctx: &mut SessionContext,
    available_coupons: &[CouponCode],
) {
    let Some(product) = catalog.lookup(sku) else {
        warn!(%sku, "Free item product not found in catalog");
        ctx.flag_free_item_unavailable();
        return;
    };
    if !product.variant || !product.orderable {
        warn!(%sku, "Free item product not orderable");
        ctx.flag_free_item_unavailable();
        return;
    }

    let discount = product.unit_price * detail.qty;
    let line_id = match cart.add_product(&product, detail.qty) {
        Ok(id) => id,
        Err(e) => {
            warn!(%sku, error = %e, "Failed to add free item to cart");
            ctx.flag_free_item_unavailable();
            return;
        }
    };

    let mut adjustment = PriceAdjustment {
        id: Uuid::new_v4(),
        tag: None,
        amount: discount.as_delta(),
        text: detail.rule_name.clone(),
        is_engine_adjustment: true,
        linked_coupon: None,
        free_item: Some(FreeItemGrant {
            qty: detail.qty,
            campaign_id: detail.campaign_id,
            line_item_id: line_id,
        }),
    };
    if let Some(code) = triggering_coupon(detail) {
        if available_coupons.contains(&code) {
            adjustment.linked_coupon = Some(code);
        } else {
            warn!(coupon = %code, "Coupon line item not found; free-item adjustment left unlinked");
        }
    }

    if let Some(line) = cart.line_item_mut(line_id) {
        debug!(%sku, qty = detail.qty, "Added engine-granted free item");
        line.adjustments.push(adjustment);
        line.engine_free_item = true;
    }
    cart.recalculate_totals();
}

fn triggering_coupon(detail: &FreeItemDetail) -> Option<CouponCode> {
    if detail.triggered_by_coupon.is_some() {
        detail.coupon_code.clone()
    } else {
        None
    }
}
