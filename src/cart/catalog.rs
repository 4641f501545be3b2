//! Product catalog seam.
//!
//! The free-item reconciler needs product lookups (orderable check, unit
//! price) when the engine grants an item that is not in the cart yet. The
//! catalog is a trait so tests can run against an in-memory table.

use crate::domain::{Money, Sku};
use std::collections::{BTreeMap, HashMap};

/// Catalog view of a product, as much as reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub sku: Sku,
    pub name: String,
    pub unit_price: Money,
    pub orderable: bool,
    /// Whether this sku is a purchasable variant (free items must be).
    pub variant: bool,
    pub categories: Vec<String>,
    /// Named attributes forwarded to the engine per configuration.
    pub attributes: HashMap<String, String>,
}

pub trait ProductCatalog: Send + Sync + std::fmt::Debug {
    fn lookup(&self, sku: &Sku) -> Option<Product>;
}

/// Catalog backed by an in-memory table. Doubles as the test catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: BTreeMap<Sku, Product>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.sku.clone(), product);
        self
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn lookup(&self, sku: &Sku) -> Option<Product> {
        self.products.get(sku).cloned()
    }
}
