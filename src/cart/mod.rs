//! In-memory cart aggregate.
//!
//! The cart is the mutable state the reconciliation pass converges: product
//! line items, order/product/shipping price adjustments, coupon line items,
//! and the promotion bookkeeping (applied coupon codes, referral code,
//! rejected free items). A pass runs inside [`Cart::transaction`], which
//! restores a checkpoint if any step fails, so partial application is
//! impossible.

pub mod catalog;

use crate::domain::{
    AdjustmentKey, CampaignId, CouponCode, LineItemId, Money, ProfileId, ReferralCode, SessionId,
    Sku,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use catalog::{InMemoryCatalog, Product, ProductCatalog};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("line item {0} not found")]
    LineItemNotFound(LineItemId),
    #[error("coupon {0} not found on cart")]
    CouponNotFound(CouponCode),
    #[error("product {0} cannot be added to the cart")]
    ProductNotOrderable(Sku),
}

/// Free-item bookkeeping on an engine-created price adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeItemGrant {
    /// Units currently granted free by the engine.
    pub qty: u32,
    pub campaign_id: CampaignId,
    /// The line item the grant was attached to.
    pub line_item_id: LineItemId,
}

/// A priced adjustment attached to the order, a product line, or a shipping
/// line. Engine-created adjustments carry the [`AdjustmentKey`] tag that lets
/// later passes find them again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub id: Uuid,
    /// Correlation tag; `None` for platform-native promotions.
    pub tag: Option<AdjustmentKey>,
    /// Price delta: negative for a discount.
    pub amount: Money,
    /// Display text, the engine rule name for engine adjustments.
    pub text: String,
    pub is_engine_adjustment: bool,
    /// Coupon line item this adjustment is associated with, if any.
    pub linked_coupon: Option<CouponCode>,
    pub free_item: Option<FreeItemGrant>,
}

impl PriceAdjustment {
    pub fn engine(key: AdjustmentKey, magnitude: Money, text: impl Into<String>) -> Self {
        PriceAdjustment {
            id: Uuid::new_v4(),
            tag: Some(key),
            amount: magnitude.as_delta(),
            text: text.into(),
            is_engine_adjustment: true,
            linked_coupon: None,
            free_item: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLineItem {
    pub id: LineItemId,
    pub sku: Sku,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub adjustments: Vec<PriceAdjustment>,
    /// Set while the engine grants free stock on this line.
    pub engine_free_item: bool,
}

impl ProductLineItem {
    /// Gross price before adjustments.
    pub fn gross_price(&self) -> Money {
        self.unit_price * self.quantity
    }

    /// The free-item adjustment on this line, if the engine granted one.
    pub fn free_item_adjustment(&self) -> Option<&PriceAdjustment> {
        self.adjustments.iter().find(|a| a.free_item.is_some())
    }

    pub fn free_item_adjustment_mut(&mut self) -> Option<&mut PriceAdjustment> {
        self.adjustments.iter_mut().find(|a| a.free_item.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: String,
    pub cost: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingLineItem {
    pub id: String,
    pub price: Money,
    pub adjustments: Vec<PriceAdjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_city: Option<String>,
    pub shipping_lines: Vec<ShippingLineItem>,
}

impl Shipment {
    pub fn new() -> Self {
        Shipment {
            shipping_method: None,
            shipping_city: None,
            shipping_lines: Vec::new(),
        }
    }

    /// Total shipping price for this shipment including adjustments.
    pub fn shipping_total(&self) -> Money {
        self.shipping_lines
            .iter()
            .map(|line| {
                line.price + line.adjustments.iter().map(|a| a.amount).sum::<Money>()
            })
            .sum()
    }
}

impl Default for Shipment {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponLineItem {
    pub code: CouponCode,
}

/// Session/profile identifiers stamped onto the cart when the engine session
/// is closed at order confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedSessionStamp {
    pub session_id: SessionId,
    pub profile_id: ProfileId,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Line item gross prices plus product-level adjustments.
    pub merchandise_total: Money,
    pub shipping_total: Money,
    /// Merchandise + shipping + order-level adjustments.
    pub grand_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub currency: String,
    pub line_items: Vec<ProductLineItem>,
    /// Order-level price adjustments.
    pub adjustments: Vec<PriceAdjustment>,
    pub shipments: Vec<Shipment>,
    pub coupon_line_items: Vec<CouponLineItem>,
    /// Coupon codes the engine has accepted for this cart.
    pub applied_coupon_codes: Vec<CouponCode>,
    pub referral_code: Option<ReferralCode>,
    /// Skus of engine-granted free items the shopper removed; reported back to
    /// the engine so it stops re-granting them.
    pub rejected_free_items: Vec<Sku>,
    pub payment_method: Option<String>,
    pub closed_session: Option<ClosedSessionStamp>,
    pub totals: CartTotals,
}

impl Cart {
    pub fn new(currency: impl Into<String>) -> Self {
        Cart {
            id: Uuid::new_v4(),
            currency: currency.into(),
            line_items: Vec::new(),
            adjustments: Vec::new(),
            shipments: vec![Shipment::new()],
            coupon_line_items: Vec::new(),
            applied_coupon_codes: Vec::new(),
            referral_code: None,
            rejected_free_items: Vec::new(),
            payment_method: None,
            closed_session: None,
            totals: CartTotals::default(),
        }
    }

    /// Run `f` atomically: if it errors, the cart is restored to the state it
    /// had before the call.
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut Cart) -> Result<T, E>,
    ) -> Result<T, E> {
        let checkpoint = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = checkpoint;
                Err(err)
            }
        }
    }

    /// Add `qty` units of a product, merging into an existing line for the
    /// same sku. Returns the id of the affected line.
    pub fn add_product(&mut self, product: &Product, qty: u32) -> Result<LineItemId, CartError> {
        if !product.orderable {
            return Err(CartError::ProductNotOrderable(product.sku.clone()));
        }
        if let Some(line) = self.line_items.iter_mut().find(|l| l.sku == product.sku) {
            line.quantity += qty;
            return Ok(line.id);
        }
        let line = ProductLineItem {
            id: LineItemId::generate(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity: qty,
            unit_price: product.unit_price,
            adjustments: Vec::new(),
            engine_free_item: false,
        };
        let id = line.id;
        self.line_items.push(line);
        Ok(id)
    }

    pub fn line_item(&self, id: LineItemId) -> Option<&ProductLineItem> {
        self.line_items.iter().find(|l| l.id == id)
    }

    pub fn line_item_mut(&mut self, id: LineItemId) -> Option<&mut ProductLineItem> {
        self.line_items.iter_mut().find(|l| l.id == id)
    }

    pub fn remove_line_item(&mut self, id: LineItemId) {
        self.line_items.retain(|l| l.id != id);
    }

    pub fn coupon_line_item(&self, code: &CouponCode) -> Option<&CouponLineItem> {
        self.coupon_line_items.iter().find(|c| &c.code == code)
    }

    pub fn create_coupon_line_item(&mut self, code: CouponCode) {
        if self.coupon_line_item(&code).is_none() {
            self.coupon_line_items.push(CouponLineItem { code });
        }
    }

    /// Remove a coupon line item and every adjustment associated with it,
    /// across all scopes.
    pub fn remove_coupon_line_item(&mut self, code: &CouponCode) {
        self.coupon_line_items.retain(|c| &c.code != code);
        self.adjustments
            .retain(|a| a.linked_coupon.as_ref() != Some(code));
        for line in &mut self.line_items {
            line.adjustments
                .retain(|a| a.linked_coupon.as_ref() != Some(code));
        }
        for shipment in &mut self.shipments {
            for shipping_line in &mut shipment.shipping_lines {
                shipping_line
                    .adjustments
                    .retain(|a| a.linked_coupon.as_ref() != Some(code));
            }
        }
    }

    /// Whether any line currently carries an engine-granted free item.
    pub fn has_engine_free_items(&self) -> bool {
        self.line_items.iter().any(|l| l.engine_free_item)
    }

    pub fn mark_free_item_rejected(&mut self, sku: Sku) {
        if !self.rejected_free_items.contains(&sku) {
            self.rejected_free_items.push(sku);
        }
    }

    /// Reapply the selected shipping method's base cost to each shipment,
    /// leaving shipping adjustments in place. Run after all discount scopes so
    /// shipping totals reflect final adjustments.
    pub fn apply_shipping_cost(&mut self) {
        for shipment in &mut self.shipments {
            let Some(method) = shipment.shipping_method.clone() else {
                continue;
            };
            match shipment.shipping_lines.first_mut() {
                Some(line) => line.price = method.cost,
                None => shipment.shipping_lines.push(ShippingLineItem {
                    id: method.id.clone(),
                    price: method.cost,
                    adjustments: Vec::new(),
                }),
            }
        }
    }

    /// Recompute cart totals from line items and adjustments.
    pub fn recalculate_totals(&mut self) {
        let merchandise: Money = self
            .line_items
            .iter()
            .map(|line| {
                line.gross_price() + line.adjustments.iter().map(|a| a.amount).sum::<Money>()
            })
            .sum();
        let shipping: Money = self.shipments.iter().map(|s| s.shipping_total()).sum();
        let order_adjustments: Money = self.adjustments.iter().map(|a| a.amount).sum();
        self.totals = CartTotals {
            merchandise_total: merchandise,
            shipping_total: shipping,
            grand_total: merchandise + shipping + order_adjustments,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RulesetId;

    fn money(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    fn product(sku: &str, price: &str) -> Product {
        Product {
            sku: Sku::new(sku),
            name: sku.to_string(),
            unit_price: money(price),
            orderable: true,
            variant: true,
            categories: Vec::new(),
            attributes: Default::default(),
        }
    }

    #[test]
    fn test_add_product_merges_same_sku() {
        let mut cart = Cart::new("USD");
        let p = product("SHIRT-M", "25");
        let id1 = cart.add_product(&p, 1).unwrap();
        let id2 = cart.add_product(&p, 2).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(cart.line_items.len(), 1);
        assert_eq!(cart.line_items[0].quantity, 3);
    }

    #[test]
    fn test_add_product_rejects_unorderable() {
        let mut cart = Cart::new("USD");
        let mut p = product("SHIRT-M", "25");
        p.orderable = false;
        assert_eq!(
            cart.add_product(&p, 1),
            Err(CartError::ProductNotOrderable(Sku::new("SHIRT-M")))
        );
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut cart = Cart::new("USD");
        cart.add_product(&product("SHIRT-M", "25"), 1).unwrap();

        let result: Result<(), &str> = cart.transaction(|cart| {
            cart.line_items.clear();
            cart.create_coupon_line_item(CouponCode::new("SAVE10"));
            Err("boom")
        });

        assert!(result.is_err());
        assert_eq!(cart.line_items.len(), 1);
        assert!(cart.coupon_line_items.is_empty());
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let mut cart = Cart::new("USD");
        let result: Result<(), CartError> = cart.transaction(|cart| {
            cart.create_coupon_line_item(CouponCode::new("SAVE10"));
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(cart.coupon_line_items.len(), 1);
    }

    #[test]
    fn test_remove_coupon_line_item_cascades_to_adjustments() {
        let mut cart = Cart::new("USD");
        cart.add_product(&product("SHIRT-M", "25"), 1).unwrap();
        cart.create_coupon_line_item(CouponCode::new("SAVE10"));

        let key = AdjustmentKey::order(RulesetId(1), CampaignId(2), None);
        let mut adj = PriceAdjustment::engine(key, money("5"), "5 off");
        adj.linked_coupon = Some(CouponCode::new("SAVE10"));
        cart.adjustments.push(adj);

        cart.remove_coupon_line_item(&CouponCode::new("SAVE10"));
        assert!(cart.coupon_line_items.is_empty());
        assert!(cart.adjustments.is_empty());
    }

    #[test]
    fn test_recalculate_totals() {
        let mut cart = Cart::new("USD");
        cart.add_product(&product("SHIRT-M", "25"), 2).unwrap();
        cart.shipments[0].shipping_method = Some(ShippingMethod {
            id: "ground".into(),
            cost: money("4.99"),
        });
        cart.apply_shipping_cost();

        let key = AdjustmentKey::order(RulesetId(1), CampaignId(2), None);
        cart.adjustments
            .push(PriceAdjustment::engine(key, money("10"), "10 off"));

        cart.recalculate_totals();
        assert_eq!(cart.totals.merchandise_total, money("50"));
        assert_eq!(cart.totals.shipping_total, money("4.99"));
        assert_eq!(cart.totals.grand_total, money("44.99"));
    }

    #[test]
    fn test_apply_shipping_cost_resets_base_price_only() {
        let mut cart = Cart::new("USD");
        cart.shipments[0].shipping_method = Some(ShippingMethod {
            id: "ground".into(),
            cost: money("4.99"),
        });
        cart.apply_shipping_cost();

        let key = AdjustmentKey::shipping(RulesetId(1), CampaignId(2), None);
        cart.shipments[0].shipping_lines[0]
            .adjustments
            .push(PriceAdjustment::engine(key, money("2"), "2 off shipping"));

        // Changing the method and reapplying keeps the adjustment.
        cart.shipments[0].shipping_method = Some(ShippingMethod {
            id: "express".into(),
            cost: money("9.99"),
        });
        cart.apply_shipping_cost();
        assert_eq!(cart.shipments[0].shipping_lines[0].price, money("9.99"));
        assert_eq!(cart.shipments[0].shipping_lines[0].adjustments.len(), 1);
        assert_eq!(cart.shipments[0].shipping_total(), money("7.99"));
    }
}
