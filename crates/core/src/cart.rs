//! Session cart and validated cart snapshots.
//!
//! The [`Cart`] is owned by a single browser session and mutated only
//! through the reducer-style operations below. A [`ValidatedCart`] is the
//! immutable, re-priced snapshot that checkout works from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, SellerId};

/// A cart edit that was refused. The cart is left unchanged.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("unit price for {0} cannot be negative")]
    NegativePrice(ProductId),
    #[error("weight for {0} cannot be negative")]
    NegativeWeight(ProductId),
    #[error("cart total is too large")]
    TotalOverflow,
}

const fn default_quantity() -> u32 {
    1
}

const fn default_weight() -> Decimal {
    Decimal::ONE
}

/// A single product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Catalog product document ID.
    pub product_id: ProductId,
    /// Product title at the time it was added.
    pub title: String,
    /// Price per unit, in the store currency.
    pub unit_price: Decimal,
    /// Number of units; missing values default to 1.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Shipping weight per unit; missing values default to 1.
    #[serde(default = "default_weight")]
    pub weight: Decimal,
    /// Seller that fulfils this product.
    pub seller_id: SellerId,
}

impl CartLine {
    /// Reject lines with a negative price or weight.
    ///
    /// # Errors
    ///
    /// Returns the first negative field found.
    pub fn validate(&self) -> Result<(), CartError> {
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(CartError::NegativePrice(self.product_id.clone()));
        }
        if self.weight.is_sign_negative() && !self.weight.is_zero() {
            return Err(CartError::NegativeWeight(self.product_id.clone()));
        }
        Ok(())
    }

    /// Price of the whole line (unit price × quantity), `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Shipping weight of the whole line (unit weight × quantity), `None` on
    /// overflow.
    #[must_use]
    pub fn shipping_weight(&self) -> Option<Decimal> {
        self.weight.checked_mul(Decimal::from(self.quantity))
    }
}

fn checked_sum(lines: &[CartLine], part: fn(&CartLine) -> Option<Decimal>) -> Option<Decimal> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |total, line| total.checked_add(part(line)?))
}

/// Whether the subtotal and the parcel weight of `lines` are representable.
fn ensure_totals(lines: &[CartLine]) -> Result<(), CartError> {
    checked_sum(lines, CartLine::line_total)
        .and(checked_sum(lines, CartLine::shipping_weight))
        .map(|_| ())
        .ok_or(CartError::TotalOverflow)
}

/// The session cart.
///
/// Every line has a non-negative price and weight, and the subtotal and
/// total weight never overflow. Edits that would break this are refused
/// and leave the cart as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create a cart from existing lines, merging duplicates.
    ///
    /// # Errors
    ///
    /// See [`Cart::set`].
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, CartError> {
        let mut cart = Self::default();
        cart.set(lines)?;
        Ok(cart)
    }

    /// The current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of distinct product lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a product. An existing line for the same product has its
    /// quantity increased instead of a second line being created.
    ///
    /// # Errors
    ///
    /// Refuses negative prices or weights and totals that overflow.
    pub fn add(&mut self, mut line: CartLine) -> Result<(), CartError> {
        line.validate()?;
        if line.quantity == 0 {
            line.quantity = 1;
        }
        let mut lines = self.lines.clone();
        if let Some(existing) = lines.iter_mut().find(|l| l.product_id == line.product_id) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            lines.push(line);
        }
        ensure_totals(&lines)?;
        self.lines = lines;
        Ok(())
    }

    /// Remove a product line. Returns `true` if a line was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product_id != product_id);
        self.lines.len() != before
    }

    /// Set the quantity of a product line.
    ///
    /// Negative quantities clamp to zero, and a line whose quantity reaches
    /// zero is removed. Returns the resulting quantity, or `None` if the
    /// product is not in the cart.
    ///
    /// # Errors
    ///
    /// Refuses a quantity whose totals overflow.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Option<u32>, CartError> {
        let clamped = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        let Some(index) = self.lines.iter().position(|l| &l.product_id == product_id) else {
            return Ok(None);
        };
        if clamped == 0 {
            self.lines.remove(index);
            return Ok(Some(0));
        }
        let mut lines = self.lines.clone();
        if let Some(line) = lines.get_mut(index) {
            line.quantity = clamped;
        }
        ensure_totals(&lines)?;
        self.lines = lines;
        Ok(Some(clamped))
    }

    /// Replace every line. Zero-quantity lines are dropped and duplicate
    /// products are merged.
    ///
    /// # Errors
    ///
    /// Refuses the whole replacement if any line is invalid or the totals
    /// overflow.
    pub fn set(&mut self, lines: Vec<CartLine>) -> Result<(), CartError> {
        let mut replacement = Self::default();
        for line in lines.into_iter().filter(|l| l.quantity > 0) {
            replacement.add(line)?;
        }
        *self = replacement;
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of every line total.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        checked_sum(&self.lines, CartLine::line_total).unwrap_or(Decimal::MAX)
    }
}

/// Cart lines re-priced and re-checked against the live catalog.
///
/// Every line corresponds to a product that was purchasable at validation
/// time. `requested_lines` records how many lines were submitted so callers
/// can tell whether items were dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCart {
    lines: Vec<CartLine>,
    requested_lines: usize,
}

impl ValidatedCart {
    /// Build a snapshot from the surviving lines and the submitted line count.
    #[must_use]
    pub const fn new(lines: Vec<CartLine>, requested_lines: usize) -> Self {
        Self {
            lines,
            requested_lines,
        }
    }

    /// An empty snapshot for a failed validation.
    #[must_use]
    pub const fn empty(requested_lines: usize) -> Self {
        Self::new(Vec::new(), requested_lines)
    }

    /// The validated lines.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the snapshot and return its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Number of validated lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line survived validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines that were submitted for validation.
    #[must_use]
    pub const fn requested_lines(&self) -> usize {
        self.requested_lines
    }

    /// Whether validation dropped at least one line.
    #[must_use]
    pub fn shrank(&self) -> bool {
        self.lines.len() < self.requested_lines
    }

    /// Sum of validated price × quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.checked_subtotal().unwrap_or(Decimal::MAX)
    }

    /// Sum of validated price × quantity, `None` on overflow.
    #[must_use]
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        checked_sum(&self.lines, CartLine::line_total)
    }

    /// Whether the subtotal and parcel weight are representable.
    #[must_use]
    pub fn totals_fit(&self) -> bool {
        ensure_totals(&self.lines).is_ok()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Aggregate parcel weight (Σ unit weight × quantity).
    #[must_use]
    pub fn total_weight(&self) -> Decimal {
        checked_sum(&self.lines, CartLine::shipping_weight).unwrap_or(Decimal::MAX)
    }

    /// Distinct seller IDs in first-seen order.
    #[must_use]
    pub fn seller_ids(&self) -> Vec<SellerId> {
        let mut sellers: Vec<SellerId> = Vec::new();
        for line in &self.lines {
            if !sellers.contains(&line.seller_id) {
                sellers.push(line.seller_id.clone());
            }
        }
        sellers
    }
}
