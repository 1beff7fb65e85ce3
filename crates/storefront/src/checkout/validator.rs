//! Re-checks cart lines against the live catalog.

use tracing::instrument;

use furnimart_core::{CartLine, ProductId, ValidatedCart, round_amount};

use crate::catalog::CatalogStore;

pub const EMPTY_CART: &str = "Your cart is empty";
pub const NO_VALID_ITEMS: &str = "No valid items found in cart";
pub const ITEMS_UNAVAILABLE: &str = "Some items in your cart are no longer available";
pub const VALIDATION_FAILED: &str = "Failed to validate cart. Please try again.";

/// Result of validating a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartValidation {
    /// Every line is purchasable; prices are the catalog's.
    Valid(ValidatedCart),
    Empty,
    /// Nothing in the cart can be bought.
    NoValidItems(ValidatedCart),
    /// Some lines were dropped; the survivors are kept for acknowledgment.
    Shrank(ValidatedCart),
    /// The catalog could not be reached.
    Failed(ValidatedCart),
}

impl CartValidation {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// User-facing message for an unsuccessful validation.
    #[must_use]
    pub const fn message(&self) -> Option<&'static str> {
        match self {
            Self::Valid(_) => None,
            Self::Empty => Some(EMPTY_CART),
            Self::NoValidItems(_) => Some(NO_VALID_ITEMS),
            Self::Shrank(_) => Some(ITEMS_UNAVAILABLE),
            Self::Failed(_) => Some(VALIDATION_FAILED),
        }
    }

    #[must_use]
    pub fn validated_cart(&self) -> ValidatedCart {
        match self {
            Self::Empty => ValidatedCart::empty(0),
            Self::Valid(cart) | Self::NoValidItems(cart) | Self::Shrank(cart) | Self::Failed(cart) => {
                cart.clone()
            }
        }
    }
}

/// Validate `lines` against the catalog.
///
/// Lines whose product is missing or cannot cover the requested quantity are
/// dropped. Surviving lines take the catalog's title and price (rounded to
/// whole cents), and its weight and seller when the catalog records them.
#[instrument(skip(catalog, lines), fields(lines = lines.len()))]
pub async fn validate_cart(catalog: &dyn CatalogStore, lines: &[CartLine]) -> CartValidation {
    if lines.is_empty() {
        return CartValidation::Empty;
    }
    let requested = lines.len();

    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id.clone()).collect();
    let products = match catalog.products(&ids).await {
        Ok(products) => products,
        Err(e) => {
            tracing::error!(error = %e, "Cart validation failed");
            return CartValidation::Failed(ValidatedCart::empty(requested));
        }
    };

    let valid: Vec<CartLine> = lines
        .iter()
        .filter_map(|line| {
            let product = products.iter().find(|p| p.id == line.product_id)?;
            if !product.is_purchasable(line.quantity) {
                tracing::debug!(product_id = %line.product_id, "Dropping unavailable line");
                return None;
            }
            Some(CartLine {
                product_id: line.product_id.clone(),
                title: product.title.clone(),
                unit_price: round_amount(product.price),
                quantity: line.quantity,
                weight: product.weight.unwrap_or(line.weight),
                seller_id: product
                    .seller_id
                    .clone()
                    .unwrap_or_else(|| line.seller_id.clone()),
            })
        })
        .collect();

    let validated = ValidatedCart::new(valid, requested);
    if !validated.totals_fit() {
        tracing::error!("Validated cart total overflows");
        return CartValidation::Failed(ValidatedCart::empty(requested));
    }
    if validated.is_empty() {
        CartValidation::NoValidItems(ValidatedCart::empty(requested))
    } else if validated.shrank() {
        CartValidation::Shrank(validated)
    } else {
        CartValidation::Valid(validated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use furnimart_core::SellerId;

    use super::*;
    use crate::catalog::CatalogProduct;
    use crate::checkout::memory::InMemoryCatalog;

    fn line(id: &str, price: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            title: id.to_string(),
            unit_price: Decimal::from(price),
            quantity,
            weight: Decimal::ONE,
            seller_id: SellerId::new("seller-stale"),
        }
    }

    fn product(id: &str, price: i64, inventory: Option<u32>) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            title: format!("{id} (catalog)"),
            price: Decimal::from(price),
            weight: Some(Decimal::from(12)),
            seller_id: Some(SellerId::new("seller-1")),
            inventory,
        }
    }

    #[tokio::test]
    async fn test_empty_cart_fails_fast() {
        let catalog = InMemoryCatalog::new();
        let result = validate_cart(&catalog, &[]).await;
        assert!(!result.success());
        assert_eq!(result.message(), Some(EMPTY_CART));
        assert!(result.validated_cart().is_empty());
    }

    #[tokio::test]
    async fn test_lines_are_repriced_from_catalog() {
        let catalog = InMemoryCatalog::new().with_product(product("sofa", 450, None));
        let result = validate_cart(&catalog, &[line("sofa", 400, 2)]).await;

        assert!(result.success());
        let cart = result.validated_cart();
        let repriced = &cart.lines()[0];
        assert_eq!(repriced.unit_price, Decimal::from(450));
        assert_eq!(repriced.title, "sofa (catalog)");
        assert_eq!(repriced.weight, Decimal::from(12));
        assert_eq!(repriced.seller_id, SellerId::new("seller-1"));
        assert_eq!(cart.subtotal(), Decimal::from(900));
    }

    #[tokio::test]
    async fn test_sub_cent_catalog_price_is_rounded() {
        let mut lamp = product("lamp", 0, None);
        lamp.price = Decimal::new(12_345, 3);
        let catalog = InMemoryCatalog::new().with_product(lamp);
        let result = validate_cart(&catalog, &[line("lamp", 12, 2)]).await;

        let cart = result.validated_cart();
        assert_eq!(cart.lines()[0].unit_price, Decimal::new(1235, 2));
        assert_eq!(cart.subtotal(), Decimal::new(2470, 2));
    }

    #[tokio::test]
    async fn test_shrunk_cart_keeps_survivors() {
        let catalog = InMemoryCatalog::new()
            .with_product(product("sofa", 450, None))
            .with_product(product("lamp", 30, Some(1)));
        let result =
            validate_cart(&catalog, &[line("sofa", 450, 1), line("lamp", 30, 3), line("gone", 5, 1)])
                .await;

        assert!(!result.success());
        assert_eq!(result.message(), Some(ITEMS_UNAVAILABLE));
        let cart = result.validated_cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.requested_lines(), 3);
        assert_eq!(cart.lines()[0].product_id, ProductId::new("sofa"));
    }

    #[tokio::test]
    async fn test_nothing_valid() {
        let catalog = InMemoryCatalog::new();
        let result = validate_cart(&catalog, &[line("gone", 5, 1)]).await;
        assert_eq!(result.message(), Some(NO_VALID_ITEMS));
        assert!(result.validated_cart().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_outage_is_a_failed_validation() {
        let catalog = InMemoryCatalog::new().with_product(product("sofa", 450, None));
        catalog.fail_product_lookups(true);
        let result = validate_cart(&catalog, &[line("sofa", 450, 1)]).await;
        assert_eq!(result.message(), Some(VALIDATION_FAILED));
        assert!(result.validated_cart().is_empty());
    }
}
