//! Session transcoder: builds the outbound cart snapshot for the engine.

use crate::cart::{Cart, ProductCatalog};
use crate::config::Config;
use crate::domain::{
    CouponCode, ItemPosition, LineItemId, Money, ProfileId, ReferralCode, SessionId, Sku,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Updated on every cart mutation.
    Open,
    /// Sent once, at order confirmation.
    Closed,
}

/// Attributes sent per cart item. `line_item_id` is echoed back by the engine
/// and is what lets a pass correlate positional effects to cart lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemAttributes {
    pub line_item_id: LineItemId,
    pub category: Vec<String>,
    #[serde(flatten)]
    pub custom: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemPayload {
    pub name: String,
    pub sku: Sku,
    pub quantity: u32,
    /// Unit price.
    pub price: Money,
    pub position: ItemPosition,
    pub attributes: CartItemAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAttributes {
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "SiteId")]
    pub site_id: String,
    #[serde(rename = "ShippingMethod")]
    pub shipping_method: String,
    #[serde(rename = "ShippingCity")]
    pub shipping_city: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "rejected_free_items")]
    pub rejected_free_items: Vec<Sku>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalCosts {
    pub shipping_cost: Money,
}

/// Complete customer-session update payload. The session id addresses the
/// engine resource (it is part of the URL, not the body).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    #[serde(skip_serializing)]
    pub session_id: SessionId,
    pub profile_id: ProfileId,
    pub state: SessionState,
    pub cart_items: Vec<CartItemPayload>,
    pub coupon_codes: Vec<CouponCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<ReferralCode>,
    pub attributes: SessionAttributes,
    pub additional_costs: AdditionalCosts,
}

/// Build the outbound snapshot of the cart.
///
/// Lines carrying an engine free-item grant contribute only the quantity the
/// shopper added on top of the grant; a line that is entirely free stock is
/// omitted. Reporting granted units back would make the engine price its own
/// grants.
pub fn build_session_update(
    cart: &Cart,
    state: SessionState,
    session_id: SessionId,
    profile_id: ProfileId,
    candidate_coupon: Option<&CouponCode>,
    config: &Config,
    catalog: &dyn ProductCatalog,
) -> SessionUpdate {
    let mut cart_items = Vec::new();
    let mut position = 0i64;

    for line in &cart.line_items {
        let mut quantity = line.quantity;
        if line.engine_free_item {
            let free_qty: u32 = line
                .adjustments
                .iter()
                .filter_map(|a| a.free_item.as_ref())
                .map(|grant| grant.qty)
                .sum();
            quantity = line.quantity.saturating_sub(free_qty);
            if quantity == 0 {
                continue;
            }
        }

        cart_items.push(CartItemPayload {
            name: line.name.clone(),
            sku: line.sku.clone(),
            quantity,
            price: line.unit_price,
            position: ItemPosition(position),
            attributes: item_attributes(line.id, &line.sku, config, catalog),
        });
        position += 1;
    }

    let coupon_codes = match candidate_coupon {
        Some(code) => vec![code.clone()],
        None => cart.applied_coupon_codes.clone(),
    };

    let shipment = cart.shipments.first();
    let attributes = SessionAttributes {
        currency: cart.currency.clone(),
        site_id: config.site_id.clone(),
        shipping_method: shipment
            .and_then(|s| s.shipping_method.as_ref())
            .map(|m| m.id.clone())
            .unwrap_or_default(),
        shipping_city: shipment
            .and_then(|s| s.shipping_city.clone())
            .unwrap_or_default(),
        payment_method: cart.payment_method.clone().unwrap_or_default(),
        rejected_free_items: cart.rejected_free_items.clone(),
    };

    let shipping_cost = cart
        .shipments
        .iter()
        .flat_map(|s| s.shipping_lines.iter())
        .map(|line| line.price)
        .sum();

    SessionUpdate {
        session_id,
        profile_id,
        state,
        cart_items,
        coupon_codes,
        referral_code: cart.referral_code.clone(),
        attributes,
        additional_costs: AdditionalCosts { shipping_cost },
    }
}

fn item_attributes(
    line_item_id: LineItemId,
    sku: &Sku,
    config: &Config,
    catalog: &dyn ProductCatalog,
) -> CartItemAttributes {
    let mut categories = Vec::new();
    let mut custom = BTreeMap::new();

    if let Some(product) = catalog.lookup(sku) {
        categories = product.categories.clone();
        for name in &config.product_attributes {
            if let Some(value) = product.attributes.get(name) {
                custom.insert(name.clone(), value.clone());
            }
        }
    }

    CartItemAttributes {
        line_item_id,
        category: categories,
        custom,
    }
}
