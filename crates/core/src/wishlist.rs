//! Session wishlist.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A saved product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    pub slug: String,
}

/// Products a shopper has saved for later. Each product appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    #[must_use]
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|i| &i.product_id == product_id)
    }

    /// Save a product. Returns `false` if it was already saved.
    pub fn add(&mut self, item: WishlistItem) -> bool {
        if self.contains(&item.product_id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Returns `true` if the product was saved.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> WishlistItem {
        WishlistItem {
            product_id: ProductId::new(id),
            title: "Armchair".to_string(),
            price: Decimal::from(250),
            image: None,
            slug: "armchair".to_string(),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut wishlist = Wishlist::default();
        assert!(wishlist.add(item("a")));
        assert!(!wishlist.add(item("a")));
        assert_eq!(wishlist.items().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut wishlist = Wishlist::default();
        wishlist.add(item("a"));
        wishlist.add(item("b"));
        assert!(wishlist.remove(&ProductId::new("a")));
        assert!(!wishlist.contains(&ProductId::new("a")));
        wishlist.clear();
        assert!(wishlist.items().is_empty());
    }
}
