//! Cart lines submitted at checkout.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{Money, ProductId, Size};

/// One line of a checkout cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product being bought.
    pub product_id: ProductId,

    /// The variation (size) of the product.
    pub size: Size,

    /// Number of units, always greater than zero in a validated cart.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Money,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(
        product_id: impl Into<ProductId>,
        size: impl Into<Size>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns `quantity * unit_price`.
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.unit_price.checked_multiply(self.quantity)
    }

    /// Returns a copy of this line charged at `unit_price` instead.
    pub fn repriced(&self, unit_price: Money) -> Self {
        Self {
            unit_price,
            ..self.clone()
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                product_id: self.product_id.to_string(),
                size: self.size.to_string(),
                quantity: self.quantity,
            });
        }
        if self.unit_price.is_negative() {
            return Err(DomainError::NegativePrice {
                product_id: self.product_id.to_string(),
                cents: self.unit_price.cents(),
            });
        }
        Ok(())
    }
}

/// A validated, non-empty sequence of cart lines.
///
/// Line order is preserved exactly as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Validates and wraps the given lines.
    ///
    /// Rejects an empty cart, a zero quantity, or a negative unit price.
    pub fn new(lines: Vec<CartLine>) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        for line in &lines {
            line.validate()?;
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of `quantity * unit_price` over every line.
    pub fn total(&self) -> Result<Money, DomainError> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: &str, size: &str, quantity: u32, cents: i64) -> CartLine {
        CartLine::new(product, size, quantity, Money::from_cents(cents))
    }

    #[test]
    fn test_total_is_exact_sum_of_lines() {
        let cart = Cart::new(vec![
            line("P1", "M", 2, 1000),
            line("P2", "L", 3, 333),
            line("P3", "S", 1, 1),
        ])
        .unwrap();
        assert_eq!(cart.total().unwrap().cents(), 2000 + 999 + 1);
        assert_eq!(cart.unit_count(), 6);
    }

    #[test]
    fn test_decimal_prices_sum_without_drift() {
        // 0.10 + 0.20 style amounts must not accumulate float error.
        let lines = (0..10)
            .map(|i| {
                CartLine::new(
                    format!("P{i}"),
                    "M",
                    1,
                    Money::from_major_units(0.1).unwrap(),
                )
            })
            .collect();
        let cart = Cart::new(lines).unwrap();
        assert_eq!(cart.total().unwrap().to_string(), "1.00");
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert_eq!(Cart::new(vec![]), Err(DomainError::EmptyCart));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = Cart::new(vec![line("P1", "M", 0, 1000)]);
        assert!(matches!(result, Err(DomainError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = Cart::new(vec![line("P1", "M", 1, -1)]);
        assert!(matches!(result, Err(DomainError::NegativePrice { .. })));
    }

    #[test]
    fn test_zero_price_allowed() {
        let cart = Cart::new(vec![line("P1", "M", 4, 0)]).unwrap();
        assert!(cart.total().unwrap().is_zero());
    }

    #[test]
    fn test_total_overflow_reported() {
        let cart = Cart::new(vec![line("P1", "M", u32::MAX, i64::MAX / 2)]).unwrap();
        assert_eq!(cart.total(), Err(DomainError::AmountOverflow));
    }

    #[test]
    fn test_repriced_keeps_identity() {
        let original = line("P1", "M", 2, 999);
        let repriced = original.repriced(Money::from_cents(1000));
        assert_eq!(repriced.product_id, original.product_id);
        assert_eq!(repriced.size, original.size);
        assert_eq!(repriced.quantity, 2);
        assert_eq!(repriced.line_total().unwrap().cents(), 2000);
    }
}
