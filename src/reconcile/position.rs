//! Correlation between engine cart-item positions and platform line items.

use crate::domain::{ItemPosition, LineItemId};
use crate::engine::EchoedCartItem;
use std::collections::BTreeMap;
use tracing::warn;

/// Bijection between the engine's cart-item positions and the cart's line
/// item ids, built fresh from the echoed cart-item list on every pass.
#[derive(Debug, Clone, Default)]
pub struct LineItemPositionMap {
    by_position: BTreeMap<ItemPosition, LineItemId>,
    by_line_item: BTreeMap<LineItemId, ItemPosition>,
}

impl LineItemPositionMap {
    pub fn build(items: &[EchoedCartItem]) -> Self {
        let mut map = LineItemPositionMap::default();
        for item in items {
            if map.by_position.contains_key(&item.position)
                || map.by_line_item.contains_key(&item.line_item_id)
            {
                warn!(
                    position = %item.position,
                    line_item = %item.line_item_id,
                    "Duplicate cart item in engine echo; keeping first"
                );
                continue;
            }
            map.by_position.insert(item.position, item.line_item_id);
            map.by_line_item.insert(item.line_item_id, item.position);
        }
        map
    }

    pub fn line_item(&self, position: ItemPosition) -> Option<LineItemId> {
        self.by_position.get(&position).copied()
    }

    pub fn position(&self, line_item: LineItemId) -> Option<ItemPosition> {
        self.by_line_item.get(&line_item).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection_lookups() {
        let a = LineItemId::generate();
        let b = LineItemId::generate();
        let map = LineItemPositionMap::build(&[
            EchoedCartItem {
                position: ItemPosition(0),
                line_item_id: a,
            },
            EchoedCartItem {
                position: ItemPosition(1),
                line_item_id: b,
            },
        ]);

        assert_eq!(map.line_item(ItemPosition(1)), Some(b));
        assert_eq!(map.position(a), Some(ItemPosition(0)));
        assert_eq!(map.line_item(ItemPosition(9)), None);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let a = LineItemId::generate();
        let b = LineItemId::generate();
        let map = LineItemPositionMap::build(&[
            EchoedCartItem {
                position: ItemPosition(0),
                line_item_id: a,
            },
            EchoedCartItem {
                position: ItemPosition(0),
                line_item_id: b,
            },
        ]);
        assert_eq!(map.line_item(ItemPosition(0)), Some(a));
        assert_eq!(map.position(b), None);
    }
}
